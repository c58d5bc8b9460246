use std::io;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ctwatch_core::aggregate::StatusTone;
use ctwatch_core::commands::parse_buy_duration;
use ctwatch_core::records::LogLevel;
use ctwatch_core::{AccountView, BotCommand, Dashboard, RealtimeStore, Summary};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{BarChart, Block, Borders, Paragraph, Wrap};
use ratatui::Terminal;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputMode {
    Normal,
    ConfirmStop,
    BuyDuration(String),
}

struct ViewerState {
    mode: InputMode,
    month_chart: bool,
    notice: Option<(String, Color)>,
}

impl ViewerState {
    fn new() -> Self {
        Self {
            mode: InputMode::Normal,
            month_chart: false,
            notice: None,
        }
    }

    fn notify(&mut self, text: impl Into<String>, color: Color) {
        self.notice = Some((text.into(), color));
    }
}

enum Action {
    None,
    Quit,
    Send(BotCommand),
    SetBuyDuration(u32),
}

fn handle_key(state: &mut ViewerState, code: KeyCode, suggested: u32) -> Action {
    match state.mode.clone() {
        InputMode::ConfirmStop => {
            state.mode = InputMode::Normal;
            if matches!(code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                return Action::Send(BotCommand::Stop);
            }
            state.notify("Stop cancelled", Color::Gray);
            Action::None
        }
        InputMode::BuyDuration(mut buffer) => {
            match code {
                KeyCode::Esc => {
                    state.mode = InputMode::Normal;
                    return Action::None;
                }
                KeyCode::Enter => {
                    state.mode = InputMode::Normal;
                    return match parse_buy_duration(&buffer) {
                        Ok(minutes) => Action::SetBuyDuration(minutes),
                        Err(err) => {
                            state.notify(err.to_string(), Color::Red);
                            Action::None
                        }
                    };
                }
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) if c.is_ascii_digit() && buffer.len() < 3 => buffer.push(c),
                _ => {}
            }
            state.mode = InputMode::BuyDuration(buffer);
            Action::None
        }
        InputMode::Normal => match code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('s') => Action::Send(BotCommand::Screenshot),
            KeyCode::Char('r') => Action::Send(BotCommand::Start),
            KeyCode::Char('x') => {
                state.mode = InputMode::ConfirmStop;
                Action::None
            }
            KeyCode::Char('b') => {
                state.mode = InputMode::BuyDuration(String::new());
                Action::None
            }
            KeyCode::Char('a') => Action::SetBuyDuration(suggested),
            KeyCode::Char('m') => {
                state.month_chart = !state.month_chart;
                Action::None
            }
            _ => Action::None,
        },
    }
}

pub async fn run_viewer<S: RealtimeStore + ?Sized>(dashboard: &mut Dashboard<S>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut state = ViewerState::new();

    let run_result = async {
        loop {
            let view = dashboard.view();
            let summary = Summary::compute(&view, dashboard.config(), Local::now().naive_local());

            terminal.draw(|frame| draw_ui(frame.size(), frame, &view, &summary, &state))?;

            if !event::poll(Duration::from_millis(250))? {
                continue;
            }
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match handle_key(&mut state, key.code, summary.suggested_buy_duration) {
                Action::None => {}
                Action::Quit => break,
                Action::Send(command) => match dashboard.send_command(command).await {
                    Ok(_) => state.notify(format!("{} command sent", command.as_str()), Color::Green),
                    Err(err) => {
                        warn!(%err, "command failed");
                        state.notify(err.to_string(), Color::Red);
                    }
                },
                Action::SetBuyDuration(minutes) => match dashboard.set_buy_duration(minutes).await {
                    Ok(()) => state.notify(format!("Buy duration set to {minutes} min"), Color::Green),
                    Err(err) => {
                        warn!(%err, "config write failed");
                        state.notify(err.to_string(), Color::Red);
                    }
                },
            }
        }

        Ok::<(), anyhow::Error>(())
    }
    .await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    run_result
}

fn tone_color(tone: StatusTone) -> Color {
    match tone {
        StatusTone::Good => Color::Green,
        StatusTone::Neutral => Color::Yellow,
        StatusTone::Bad => Color::Red,
    }
}

fn draw_ui(
    area: Rect,
    frame: &mut ratatui::Frame<'_>,
    view: &AccountView,
    summary: &Summary,
    state: &ViewerState,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(10),
            Constraint::Percentage(35),
            Constraint::Length(1),
        ])
        .split(area);

    frame.render_widget(render_header(summary), rows[0]);
    render_cards(frame, rows[1], summary);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[2]);
    render_daily_chart(frame, middle[0], summary, state.month_chart);
    frame.render_widget(render_stats(summary), middle[1]);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[3]);
    frame.render_widget(render_logs(view), bottom[0]);
    frame.render_widget(render_activity(summary), bottom[1]);
    frame.render_widget(render_footer(state), rows[4]);
}

fn render_header(summary: &Summary) -> Paragraph<'static> {
    let color = tone_color(summary.tone);
    let account = summary.account.clone().unwrap_or_else(|| "-".to_string());
    let line = Line::from(vec![
        Span::styled("CT Watch  ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(format!("account={account}  ")),
        Span::styled("● ", Style::default().fg(color)),
        Span::styled(summary.status, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::raw(format!("  step: {}", if summary.current_step.is_empty() {
            "waiting..."
        } else {
            summary.current_step.as_str()
        })),
    ]);

    Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Status"))
}

fn render_cards(frame: &mut ratatui::Frame<'_>, area: Rect, summary: &Summary) {
    let cards = [
        ("Loop", format!("#{}", summary.current_loop)),
        ("Total CT", summary.total_ct_processed.to_string()),
        ("Uptime", summary.uptime.clone()),
        ("Efficiency", format!("{}%", summary.efficiency)),
        ("Streak", format!("{} days", summary.streak_days)),
        ("Plus mode", format!("+{}", summary.current_plus_mode)),
    ];

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Ratio(1, cards.len() as u32); cards.len()])
        .split(area);

    for ((title, value), col) in cards.into_iter().zip(cols.iter().copied()) {
        let card = Paragraph::new(Line::from(Span::styled(
            value,
            Style::default().add_modifier(Modifier::BOLD),
        )))
        .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(card, col);
    }
}

fn render_daily_chart(frame: &mut ratatui::Frame<'_>, area: Rect, summary: &Summary, month: bool) {
    let (days, title, bar_width) = if month {
        (&summary.last_30_days, "CT per day (30 days, m: toggle)", 2)
    } else {
        (&summary.last_7_days, "CT per day (7 days, m: toggle)", 5)
    };

    let labels: Vec<String> = days
        .iter()
        .map(|d| {
            if month {
                d.date.format("%d").to_string()
            } else {
                d.date.format("%m-%d").to_string()
            }
        })
        .collect();
    let data: Vec<(&str, u64)> = labels
        .iter()
        .zip(days.iter())
        .map(|(label, d)| (label.as_str(), d.total_ct))
        .collect();

    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(data.as_slice())
        .bar_width(bar_width)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));

    frame.render_widget(chart, area);
}

fn render_stats(summary: &Summary) -> Paragraph<'static> {
    let label = |text: &str| Span::styled(format!("{text:<14}"), Style::default().fg(Color::Gray));
    let profit_color = if summary.profit_bp < 0.0 { Color::Red } else { Color::Green };
    let peak = summary
        .peak_hours
        .iter()
        .map(|h| format!("{}h ({})", h.hour, h.count))
        .collect::<Vec<_>>()
        .join(", ");
    let avg_ct = summary
        .avg_time_per_ct
        .map(|v| format!("{v:.1} min/CT"))
        .unwrap_or_else(|| "-".to_string());

    let lines = vec![
        Line::from(vec![
            label("Today"),
            Span::raw(format!("{} CT", summary.today.total_ct)),
        ]),
        Line::from(vec![
            label("This week"),
            Span::raw(format!(
                "{} CT ({:+}% vs last week: {})",
                summary.this_week.total_ct, summary.week_change_pct, summary.last_week.total_ct
            )),
        ]),
        Line::from(vec![
            label("This month"),
            Span::raw(format!(
                "{} CT, avg {:.1} min",
                summary.this_month.total_ct, summary.this_month.avg_time
            )),
        ]),
        Line::from(vec![
            label("Projection"),
            Span::raw(format!(
                "month {} / year {}",
                summary.projection.end_of_month, summary.projection.end_of_year
            )),
        ]),
        Line::from(vec![label("Avg per CT"), Span::raw(avg_ct)]),
        Line::from(vec![
            label("Upgrades"),
            Span::raw(format!(
                "last {:.1} avg {:.1} min {:.1} max {:.1} (n={})",
                summary.upgrades.last,
                summary.upgrades.avg,
                summary.upgrades.min,
                summary.upgrades.max,
                summary.upgrades.count
            )),
        ]),
        Line::from(vec![
            label("Profit"),
            Span::styled(
                format!("{:+.0} BP", summary.profit_bp),
                Style::default().fg(profit_color).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            label("Buy duration"),
            Span::raw(format!(
                "{} min (suggested {})",
                summary.buy_duration_minutes, summary.suggested_buy_duration
            )),
        ]),
        Line::from(vec![label("Peak hours"), Span::raw(if peak.is_empty() { "-".to_string() } else { peak })]),
        Line::from(vec![
            label("Active days"),
            Span::raw(summary.active_days.to_string()),
        ]),
    ];

    Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Statistics"))
}

fn render_logs(view: &AccountView) -> Paragraph<'static> {
    let lines: Vec<Line<'static>> = if view.logs.is_empty() {
        vec![Line::from(Span::styled("No logs yet...", Style::default().fg(Color::DarkGray)))]
    } else {
        view.logs
            .iter()
            .map(|log| {
                let color = match log.level {
                    LogLevel::Error => Color::Red,
                    LogLevel::Warning => Color::Yellow,
                    LogLevel::Info => Color::Reset,
                };
                Line::from(vec![
                    Span::styled(format!("[{}] ", log.time), Style::default().fg(Color::DarkGray)),
                    Span::styled(log.message.clone(), Style::default().fg(color)),
                ])
            })
            .collect()
    };

    Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Logs ({})", view.logs.len())),
    )
}

fn render_activity(summary: &Summary) -> Paragraph<'static> {
    let heading = |text: String| {
        Line::from(Span::styled(text, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)))
    };
    let dim = Style::default().fg(Color::DarkGray);

    let mut lines = vec![heading(format!("Config changes ({})", summary.recent_config_changes.len()))];
    for change in &summary.recent_config_changes {
        lines.push(Line::from(vec![
            Span::styled(format!("[{}] ", change.time), dim),
            Span::raw(format!(
                "{}: {} -> {}",
                change.key,
                crate::config_value(&change.old),
                crate::config_value(&change.new)
            )),
        ]));
    }

    lines.push(heading(format!("Achievements ({})", summary.achievement_count)));
    for achievement in &summary.recent_achievements {
        lines.push(Line::from(vec![
            Span::styled("★ ", Style::default().fg(Color::Yellow)),
            Span::raw(achievement.title.clone()),
            Span::styled(
                format!("  {}", achievement.time.as_deref().unwrap_or("")),
                dim,
            ),
        ]));
    }

    lines.push(heading(format!("Screenshots ({})", summary.screenshots)));
    for time in &summary.screenshot_times {
        lines.push(Line::from(Span::styled(time.clone(), dim)));
    }

    Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Activity"))
}

fn render_footer(state: &ViewerState) -> Paragraph<'static> {
    let line = match &state.mode {
        InputMode::ConfirmStop => Line::from(Span::styled(
            "Stop the bot? y to confirm, any other key to cancel",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        InputMode::BuyDuration(buffer) => Line::from(vec![
            Span::styled("Buy duration (1-60): ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{buffer}_  Enter to apply, Esc to cancel")),
        ]),
        InputMode::Normal => {
            let mut spans = vec![Span::styled(
                "q quit  s screenshot  r start  x stop  b buy duration  a apply suggested  m month  ",
                Style::default().fg(Color::DarkGray),
            )];
            if let Some((text, color)) = &state.notice {
                spans.push(Span::styled(text.clone(), Style::default().fg(*color)));
            }
            Line::from(spans)
        }
    };
    Paragraph::new(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_requires_explicit_confirmation() {
        let mut state = ViewerState::new();

        assert!(matches!(handle_key(&mut state, KeyCode::Char('x'), 20), Action::None));
        assert_eq!(state.mode, InputMode::ConfirmStop);
        assert!(matches!(handle_key(&mut state, KeyCode::Char('n'), 20), Action::None));
        assert_eq!(state.mode, InputMode::Normal);

        handle_key(&mut state, KeyCode::Char('x'), 20);
        assert!(matches!(
            handle_key(&mut state, KeyCode::Char('y'), 20),
            Action::Send(BotCommand::Stop)
        ));
    }

    #[test]
    fn buy_duration_input_is_validated_before_sending() {
        let mut state = ViewerState::new();

        handle_key(&mut state, KeyCode::Char('b'), 20);
        for c in ['7', '5'] {
            handle_key(&mut state, KeyCode::Char(c), 20);
        }
        assert!(matches!(handle_key(&mut state, KeyCode::Enter, 20), Action::None));
        assert!(state.notice.is_some(), "out-of-range value is reported");

        handle_key(&mut state, KeyCode::Char('b'), 20);
        for c in ['4', 'x', '5'] {
            handle_key(&mut state, KeyCode::Char(c), 20);
        }
        assert!(matches!(
            handle_key(&mut state, KeyCode::Enter, 20),
            Action::SetBuyDuration(45)
        ));
    }
}
