use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use ctwatch_core::commands::{self, parse_buy_duration};
use ctwatch_core::{
    AccountView, BotCommand, Dashboard, DashboardConfig, FirebaseStore, RealtimeStore,
    StoreConfig, Summary,
};
use tokio::time::{interval_at, timeout, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod exporter;
mod session;
mod viewer;
#[cfg(test)]
mod exporter_tests;
#[cfg(test)]
mod session_tests;

use session::SessionStore;

#[derive(Debug, Parser)]
#[command(name = "ctwatch")]
#[command(about = "Live dashboard and remote control for CT farming bots")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the realtime database.
    #[arg(long, env = "CTWATCH_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Database secret or ID token, sent as `auth=`.
    #[arg(long, env = "CTWATCH_AUTH", global = true, hide_env_values = true)]
    auth: Option<String>,

    /// Account to use instead of the one saved by `login`.
    #[arg(long, global = true)]
    account: Option<String>,

    #[arg(long, default_value_t = 120, global = true)]
    online_threshold_secs: u64,

    #[arg(long, default_value_t = 22_000.0, global = true)]
    ct_value: f64,

    #[arg(long, default_value_t = 95.0, global = true)]
    minute_cost: f64,

    #[arg(long, default_value_t = 50, global = true)]
    log_limit: usize,

    #[arg(long, default_value_t = 15_000, global = true)]
    request_timeout_ms: u64,

    /// Session file; defaults to the user config directory.
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the accounts present in the database.
    Accounts,
    /// Remember an account for later commands.
    Login { account: String },
    /// Forget the remembered account.
    Logout,
    /// One-shot status and statistics.
    Status {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// Print a summary on every change until Ctrl-C.
    Watch {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// Full-screen live dashboard.
    View,
    /// Send a command to the bot.
    Command {
        #[arg(value_enum)]
        command: CommandArg,
        /// Skip the confirmation prompt for stop.
        #[arg(long)]
        yes: bool,
    },
    /// Overwrite the remote buy duration (1-60 minutes).
    SetBuyDuration { minutes: String },
    /// Export CT history as CSV.
    ExportCsv {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Save the retained screenshots as JPEG files.
    SaveScreenshots {
        #[arg(long)]
        dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Ndjson,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CommandArg {
    Start,
    Stop,
    Screenshot,
}

impl From<CommandArg> for BotCommand {
    fn from(arg: CommandArg) -> Self {
        match arg {
            CommandArg::Start => BotCommand::Start,
            CommandArg::Stop => BotCommand::Stop,
            CommandArg::Screenshot => BotCommand::Screenshot,
        }
    }
}

impl Cli {
    fn dashboard_config(&self) -> DashboardConfig {
        DashboardConfig {
            online_threshold: Duration::from_secs(self.online_threshold_secs),
            log_limit: self.log_limit,
            ct_value: self.ct_value,
            minute_cost: self.minute_cost,
            ..DashboardConfig::default()
        }
    }

    fn store(&self) -> Result<Arc<FirebaseStore>> {
        let Some(url) = self.database_url.as_deref() else {
            bail!("no database URL; pass --database-url or set CTWATCH_DATABASE_URL");
        };
        let mut config = StoreConfig::new(url);
        config.auth = self.auth.clone();
        config.request_timeout = Duration::from_millis(self.request_timeout_ms);
        Ok(Arc::new(FirebaseStore::new(config)?))
    }

    fn session(&self) -> Result<SessionStore> {
        match &self.session_file {
            Some(path) => Ok(SessionStore::at(path)),
            None => SessionStore::default_location(),
        }
    }

    fn resolve_account(&self) -> Result<String> {
        if let Some(account) = &self.account {
            return Ok(commands::validate_account(account)?.to_string());
        }
        match self.session()?.account()? {
            Some(account) => Ok(account),
            None => bail!("no account selected; run `ctwatch login <account>` or pass --account"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = cli.dashboard_config();

    match &cli.command {
        Command::Accounts => {
            let store = cli.store()?;
            for account in store.get_shallow(commands::ACCOUNTS_ROOT).await? {
                println!("{account}");
            }
        }
        Command::Login { account } => {
            let account = commands::validate_account(account)?;
            let session = cli.session()?;
            session.save_account(account)?;
            info!(%account, path = %session.path().display(), "session saved");
            println!("Logged in as {account}");
        }
        Command::Logout => {
            cli.session()?.clear()?;
            println!("Logged out");
        }
        Command::Status { format } => {
            let account = cli.resolve_account()?;
            let view = fetch_view(cli.store()?.as_ref(), &account, &config).await?;
            let summary = Summary::compute(&view, &config, Local::now().naive_local());
            print_summary(&summary, *format)?;
        }
        Command::Watch { format } => {
            let account = cli.resolve_account()?;
            let mut dashboard = Dashboard::new(cli.store()?, config);
            dashboard.select_account(&account)?;
            stream_loop(&dashboard, *format).await?;
            dashboard.logout();
        }
        Command::View => {
            let account = cli.resolve_account()?;
            let mut dashboard = Dashboard::new(cli.store()?, config);
            dashboard.select_account(&account)?;
            wait_for_first_snapshot(&dashboard).await;
            viewer::run_viewer(&mut dashboard).await?;
            dashboard.logout();
        }
        Command::Command { command, yes } => {
            let account = cli.resolve_account()?;
            let command = BotCommand::from(*command);
            if command.requires_confirmation() && !*yes && !confirm(&format!("Stop the bot on {account}?"))? {
                println!("Cancelled");
                return Ok(());
            }
            let store = cli.store()?;
            let key = commands::send_command(store.as_ref(), &account, command, chrono::Utc::now()).await?;
            println!("{} sent to {account} ({key})", command.as_str());
        }
        Command::SetBuyDuration { minutes } => {
            let account = cli.resolve_account()?;
            let minutes = parse_buy_duration(minutes)?;
            let store = cli.store()?;
            commands::set_buy_duration(store.as_ref(), &account, minutes).await?;
            println!("Buy duration for {account} set to {minutes} min");
        }
        Command::ExportCsv { output } => {
            let account = cli.resolve_account()?;
            let view = fetch_view(cli.store()?.as_ref(), &account, &config).await?;
            exporter::write_ct_history_csv(&view.ct_history, output.as_deref())?;
        }
        Command::SaveScreenshots { dir } => {
            let account = cli.resolve_account()?;
            let view = fetch_view(cli.store()?.as_ref(), &account, &config).await?;
            let written = exporter::save_screenshots(&view.screenshots, dir)?;
            println!("Saved {} of {} screenshots to {}", written.len(), view.screenshots.len(), dir.display());
        }
    }

    Ok(())
}

async fn fetch_view<S: RealtimeStore + ?Sized>(
    store: &S,
    account: &str,
    config: &DashboardConfig,
) -> Result<AccountView> {
    let tree = store
        .get(&commands::account_path(account))
        .await
        .with_context(|| format!("reading account {account}"))?;
    if tree.is_null() {
        bail!("account {account} has no data");
    }
    Ok(AccountView::from_tree(account, &tree, config))
}

async fn wait_for_first_snapshot<S: RealtimeStore + ?Sized>(dashboard: &Dashboard<S>) {
    let mut changes = dashboard.changes();
    let limit = dashboard.config().first_snapshot_timeout;
    let waited = timeout(limit, async {
        while dashboard.view().status.is_none() {
            if changes.changed().await.is_err() {
                break;
            }
        }
    })
    .await;
    if waited.is_err() {
        warn!(timeout_ms = %limit.as_millis(), "no status snapshot yet");
    }
}

async fn stream_loop<S: RealtimeStore + ?Sized>(
    dashboard: &Dashboard<S>,
    format: OutputFormat,
) -> Result<()> {
    wait_for_first_snapshot(dashboard).await;

    let mut changes = dashboard.changes();
    changes.borrow_and_update();
    let every = Duration::from_secs(30);
    let mut ticker = interval_at(Instant::now() + every, every);

    emit(dashboard, format)?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("received ctrl-c, stopping");
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                changes.borrow_and_update();
                emit(dashboard, format)?;
            }
            _ = ticker.tick() => {
                // Online status depends on the clock as well as the data.
                emit(dashboard, format)?;
            }
        }
    }

    Ok(())
}

fn emit<S: RealtimeStore + ?Sized>(dashboard: &Dashboard<S>, format: OutputFormat) -> Result<()> {
    let view = dashboard.view();
    let summary = Summary::compute(&view, dashboard.config(), Local::now().naive_local());
    info!(updates = view.updates, status = summary.status, online = summary.online, "update");
    print_summary(&summary, format)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn print_summary(summary: &Summary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Ndjson => {
            println!("{}", serde_json::to_string(summary)?);
        }
        OutputFormat::Human => {
            println!("=== {} ===", summary.account.as_deref().unwrap_or("-"));
            println!(
                "Status:     {} (online={}) step: {}",
                summary.status,
                summary.online,
                if summary.current_step.is_empty() { "-" } else { summary.current_step.as_str() }
            );
            println!(
                "Loop:       #{} plus={} total_ct={} efficiency={}%",
                summary.current_loop,
                summary.current_plus_mode,
                summary.total_ct_processed,
                summary.efficiency
            );
            println!("Uptime:     {}", summary.uptime);
            println!(
                "Today:      {} CT  week: {} ({:+}% vs {})  month: {}",
                summary.today.total_ct,
                summary.this_week.total_ct,
                summary.week_change_pct,
                summary.last_week.total_ct,
                summary.this_month.total_ct
            );
            println!("Streak:     {} days", summary.streak_days);
            println!(
                "Projection: month {} / year {}",
                summary.projection.end_of_month, summary.projection.end_of_year
            );
            println!(
                "Upgrades:   last={:.1} avg={:.1} min={:.1} max={:.1} n={}",
                summary.upgrades.last,
                summary.upgrades.avg,
                summary.upgrades.min,
                summary.upgrades.max,
                summary.upgrades.count
            );
            println!(
                "Buy:        {} min (suggested {})",
                summary.buy_duration_minutes, summary.suggested_buy_duration
            );
            println!("Profit:     {:+.0} BP", summary.profit_bp);

            if !summary.peak_hours.is_empty() {
                let peak = summary
                    .peak_hours
                    .iter()
                    .map(|h| format!("{}h={}", h.hour, h.count))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("Peak hours: {peak}");
            }
            println!(
                "Logs:       info={} warning={} error={}  screenshots={}",
                summary.log_levels.info,
                summary.log_levels.warning,
                summary.log_levels.error,
                summary.screenshots
            );
            if summary.active_days > 0 {
                println!("Active:     {} days", summary.active_days);
            }
            if !summary.screenshot_times.is_empty() {
                println!("Shots:      {}", summary.screenshot_times.join(", "));
            }
            if !summary.recent_config_changes.is_empty() {
                println!("Config changes:");
                for change in &summary.recent_config_changes {
                    println!(
                        "  [{}] {}: {} -> {}",
                        change.time,
                        change.key,
                        config_value(&change.old),
                        config_value(&change.new)
                    );
                }
            }
            if summary.achievement_count > 0 {
                println!("Achievements ({}):", summary.achievement_count);
                for achievement in &summary.recent_achievements {
                    println!(
                        "  {} {}{}",
                        achievement.time.as_deref().unwrap_or("-"),
                        achievement.title,
                        if achievement.description.is_empty() {
                            String::new()
                        } else {
                            format!(" ({})", achievement.description)
                        }
                    );
                }
            }
        }
    }

    Ok(())
}

pub(crate) fn config_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "-".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
