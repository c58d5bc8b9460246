use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::commands::{self, account_path, BotCommand, CommandError};
use crate::config::DashboardConfig;
use crate::records::{
    parse_daily_stats, parse_entries, parse_hourly_stats, parse_timestamp, Achievement,
    ConfigHistoryEntry, CtHistoryEntry, DailyStats, HourlyStats, LogEntry, ScreenshotEntry,
    StatusRecord, TotalStats, UpgradeHistoryEntry,
};
use crate::store::{value_at, RealtimeStore, Subscription, UpdateFn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Status,
    Logs,
    Screenshots,
    DailyStats,
    HourlyStats,
    CtHistory,
    UpgradeHistory,
    Achievements,
    ConfigHistory,
    TotalStats,
}

impl Collection {
    pub const ALL: [Collection; 10] = [
        Collection::Status,
        Collection::Logs,
        Collection::Screenshots,
        Collection::DailyStats,
        Collection::HourlyStats,
        Collection::CtHistory,
        Collection::UpgradeHistory,
        Collection::Achievements,
        Collection::ConfigHistory,
        Collection::TotalStats,
    ];

    pub fn key(&self) -> Option<&'static str> {
        match self {
            Collection::Status => None,
            Collection::Logs => Some("logs"),
            Collection::Screenshots => Some("screenshots"),
            Collection::DailyStats => Some("daily_stats"),
            Collection::HourlyStats => Some("hourly_stats"),
            Collection::CtHistory => Some("ct_history"),
            Collection::UpgradeHistory => Some("upgrade_history"),
            Collection::Achievements => Some("achievements"),
            Collection::ConfigHistory => Some("config_history"),
            Collection::TotalStats => Some("total_stats"),
        }
    }

    pub fn path(&self, account: &str) -> String {
        match self.key() {
            Some(key) => format!("{}/{key}", account_path(account)),
            None => account_path(account),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountView {
    pub account: Option<String>,
    pub status: Option<StatusRecord>,
    pub logs: Vec<LogEntry>,
    pub screenshots: Vec<ScreenshotEntry>,
    pub daily_stats: DailyStats,
    pub hourly_stats: HourlyStats,
    pub ct_history: Vec<CtHistoryEntry>,
    pub upgrade_history: Vec<UpgradeHistoryEntry>,
    pub achievements: Vec<Achievement>,
    pub config_history: Vec<ConfigHistoryEntry>,
    pub total_stats: TotalStats,
    pub updates: u64,
}

// Unparseable times sort before every parseable one, ties by raw text.
fn by_time(a: &str, b: &str) -> CmpOrdering {
    (parse_timestamp(a), a).cmp(&(parse_timestamp(b), b))
}

impl AccountView {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            ..Self::default()
        }
    }

    pub fn from_tree(account: &str, tree: &Value, config: &DashboardConfig) -> Self {
        let mut view = Self::new(account);
        for collection in Collection::ALL {
            let value = match collection.key() {
                Some(key) => value_at(tree, key).unwrap_or(&Value::Null),
                None => tree,
            };
            view.apply(collection, value, config);
        }
        view
    }

    pub fn status_or_default(&self) -> StatusRecord {
        self.status.clone().unwrap_or_default()
    }

    pub fn apply(&mut self, collection: Collection, value: &Value, config: &DashboardConfig) {
        match collection {
            Collection::Status => {
                self.status = value.is_object().then(|| StatusRecord::from_value(value));
            }
            Collection::Logs => {
                let mut logs: Vec<LogEntry> = parse_entries(value);
                logs.sort_by(|a, b| by_time(&b.time, &a.time));
                logs.truncate(config.log_limit);
                self.logs = logs;
            }
            Collection::Screenshots => {
                let mut shots: Vec<ScreenshotEntry> = parse_entries(value);
                shots.sort_by(|a, b| by_time(&b.time, &a.time));
                shots.truncate(config.screenshot_limit);
                self.screenshots = shots;
            }
            Collection::DailyStats => self.daily_stats = parse_daily_stats(value),
            Collection::HourlyStats => self.hourly_stats = parse_hourly_stats(value),
            Collection::CtHistory => {
                let mut entries: Vec<CtHistoryEntry> = parse_entries(value);
                entries.sort_by(|a, b| by_time(&a.time, &b.time));
                self.ct_history = entries;
            }
            Collection::UpgradeHistory => {
                let mut entries: Vec<UpgradeHistoryEntry> = parse_entries(value);
                entries.sort_by(|a, b| by_time(&a.time, &b.time));
                self.upgrade_history = entries;
            }
            Collection::Achievements => {
                let mut entries: Vec<Achievement> = parse_entries(value);
                entries.sort_by(|a, b| {
                    by_time(
                        a.time.as_deref().unwrap_or_default(),
                        b.time.as_deref().unwrap_or_default(),
                    )
                });
                self.achievements = entries;
            }
            Collection::ConfigHistory => {
                let mut entries: Vec<ConfigHistoryEntry> = parse_entries(value);
                entries.sort_by(|a, b| by_time(&b.time, &a.time));
                self.config_history = entries;
            }
            Collection::TotalStats => self.total_stats = TotalStats::from_value(value),
        }
        self.updates += 1;
    }
}

struct Shared {
    view: RwLock<AccountView>,
    generation: AtomicU64,
    revision: watch::Sender<u64>,
}

impl Shared {
    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

pub struct Dashboard<S: RealtimeStore + ?Sized> {
    store: Arc<S>,
    config: DashboardConfig,
    active: Option<String>,
    subscriptions: Vec<Subscription>,
    shared: Arc<Shared>,
}

impl<S: RealtimeStore + ?Sized> Dashboard<S> {
    pub fn new(store: Arc<S>, config: DashboardConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            store,
            config,
            active: None,
            subscriptions: Vec::new(),
            shared: Arc::new(Shared {
                view: RwLock::new(AccountView::default()),
                generation: AtomicU64::new(0),
                revision,
            }),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn active_account(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .iter()
            .filter(|s| !s.is_cancelled())
            .count()
    }

    pub fn view(&self) -> AccountView {
        self.shared.view.read().clone()
    }

    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    pub fn select_account(&mut self, account: &str) -> Result<(), CommandError> {
        let account = commands::validate_account(account)?.to_string();
        let generation = self.release(Some(account.clone()));

        for collection in Collection::ALL {
            let path = collection.path(&account);
            let on_update = self.handler(&account, collection, generation);
            self.subscriptions.push(self.store.subscribe(&path, on_update));
        }

        info!(%account, subscriptions = self.subscriptions.len(), "account selected");
        self.active = Some(account);
        Ok(())
    }

    pub fn logout(&mut self) {
        let previous = self.active.take();
        self.release(None);
        if let Some(account) = previous {
            info!(%account, "logged out");
        }
    }

    pub async fn send_command(&self, command: BotCommand) -> Result<String, CommandError> {
        let account = self.active.as_deref().ok_or(CommandError::NoAccount)?;
        commands::send_command(self.store.as_ref(), account, command, Utc::now()).await
    }

    pub async fn set_buy_duration(&self, minutes: u32) -> Result<(), CommandError> {
        let account = self.active.as_deref().ok_or(CommandError::NoAccount)?;
        commands::set_buy_duration(self.store.as_ref(), account, minutes).await
    }

    fn release(&mut self, next: Option<String>) -> u64 {
        // Cancel first, without holding the view lock: handlers take it
        // while their delivery gate is held.
        for mut sub in self.subscriptions.drain(..) {
            sub.cancel();
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.view.write() = match next {
            Some(account) => AccountView::new(account),
            None => AccountView::default(),
        };
        self.shared.bump();
        generation
    }

    fn handler(
        &self,
        account: &str,
        collection: Collection,
        generation: u64,
    ) -> UpdateFn {
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let account = account.to_string();

        Arc::new(move |value: Value| {
            if shared.generation.load(Ordering::SeqCst) != generation {
                debug!(%account, ?collection, "dropping update from a previous account");
                return;
            }
            {
                let mut view = shared.view.write();
                if view.account.as_deref() != Some(account.as_str()) {
                    return;
                }
                view.apply(collection, &value, &config);
            }
            debug!(%account, ?collection, "collection updated");
            shared.bump();
        })
    }
}
