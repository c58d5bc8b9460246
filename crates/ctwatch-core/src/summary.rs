use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;

use crate::aggregate::{
    self, DayTotal, HourCount, LevelCounts, Projection, StatusTone, UpgradeStats, WindowSum,
    DAYS_IN_YEAR, STREAK_LOOKBACK_DAYS,
};
use crate::config::DashboardConfig;
use crate::dashboard::AccountView;
use crate::records::{Achievement, ConfigHistoryEntry};

pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub account: Option<String>,
    pub online: bool,
    pub status: &'static str,
    pub tone: StatusTone,
    pub current_step: String,
    pub current_loop: u64,
    pub current_plus_mode: i64,
    pub total_ct_processed: u64,
    pub avg_time_per_ct: Option<f64>,
    pub uptime: String,
    pub buy_duration_minutes: u32,
    pub suggested_buy_duration: u32,
    pub efficiency: u64,
    pub today: WindowSum,
    pub this_week: WindowSum,
    pub last_week: WindowSum,
    pub week_change_pct: i64,
    pub this_month: WindowSum,
    pub streak_days: u32,
    pub last_7_days: Vec<DayTotal>,
    pub last_30_days: Vec<DayTotal>,
    pub peak_hours: Vec<HourCount>,
    pub projection: Projection,
    pub upgrades: UpgradeStats,
    pub total_upgrade_minutes: f64,
    pub profit_bp: f64,
    pub log_levels: LevelCounts,
    pub screenshots: usize,
    pub screenshot_times: Vec<String>,
    pub active_days: u64,
    pub recent_config_changes: Vec<ConfigHistoryEntry>,
    pub achievement_count: usize,
    pub recent_achievements: Vec<Achievement>,
}

impl Summary {
    pub fn compute(view: &AccountView, config: &DashboardConfig, now: NaiveDateTime) -> Self {
        let status = view.status_or_default();
        let today = now.date();
        let stats = &view.daily_stats;

        let online = aggregate::online_status(status.heartbeat(), now, config.online_threshold);
        let this_week = aggregate::window_sum(stats, today, 0, 7);
        let last_week = aggregate::window_sum(stats, today, 7, 7);

        let lifetime_ct = view.total_stats.total_ct.max(status.total_ct_processed);
        let total_loops = view.total_stats.total_loops.max(status.current_loop);
        let month_total = aggregate::month_to_date_total(stats, today);
        let month_days = aggregate::days_in_month(today);
        let projection = aggregate::linear_projection(
            month_total,
            today.day(),
            month_days.saturating_sub(today.day()),
            lifetime_ct,
            DAYS_IN_YEAR,
        );

        let upgrades = aggregate::upgrade_duration_stats(&view.upgrade_history, &status);
        let history_minutes = aggregate::total_upgrade_minutes(&view.upgrade_history);
        let total_upgrade_minutes = if history_minutes > 0.0 {
            history_minutes
        } else {
            view.total_stats.total_upgrade_minutes
        };

        let buy_duration = status
            .remote_config
            .buy_duration_minutes
            .unwrap_or(config.default_buy_duration);

        Self {
            account: view.account.clone(),
            online,
            status: aggregate::display_status(status.status, online),
            tone: aggregate::status_tone(status.status, online),
            current_step: status.current_step.clone(),
            current_loop: status.current_loop,
            current_plus_mode: status.current_plus_mode,
            total_ct_processed: status.total_ct_processed,
            avg_time_per_ct: (status.avg_time_per_ct > 0.0).then_some(status.avg_time_per_ct),
            uptime: aggregate::uptime(status.started_at(), now),
            buy_duration_minutes: buy_duration,
            suggested_buy_duration: aggregate::suggested_buy_duration(upgrades.last, buy_duration),
            efficiency: aggregate::efficiency(total_loops, lifetime_ct),
            today: aggregate::window_sum(stats, today, 0, 1),
            this_week,
            last_week,
            week_change_pct: aggregate::percent_change(this_week.total_ct, last_week.total_ct),
            this_month: aggregate::window_sum(stats, today, 0, 30),
            streak_days: aggregate::streak(stats, today, STREAK_LOOKBACK_DAYS),
            last_7_days: aggregate::daily_totals(stats, today, 7),
            last_30_days: aggregate::daily_totals(stats, today, 30),
            peak_hours: aggregate::peak_hours(&view.hourly_stats, 3),
            projection,
            upgrades,
            total_upgrade_minutes,
            profit_bp: aggregate::profit_estimate(
                lifetime_ct,
                total_upgrade_minutes,
                config.ct_value,
                config.minute_cost,
            ),
            log_levels: aggregate::log_level_counts(&view.logs),
            screenshots: view.screenshots.len(),
            screenshot_times: view.screenshots.iter().map(|s| s.time.clone()).collect(),
            active_days: view.total_stats.total_days,
            recent_config_changes: view
                .config_history
                .iter()
                .take(RECENT_LIMIT)
                .cloned()
                .collect(),
            achievement_count: view.achievements.len(),
            recent_achievements: view
                .achievements
                .iter()
                .rev()
                .take(RECENT_LIMIT)
                .cloned()
                .collect(),
        }
    }
}
