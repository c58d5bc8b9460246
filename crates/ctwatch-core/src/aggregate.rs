use std::time::Duration;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::records::{
    parse_timestamp, BotStatus, DailyStats, HourlyStats, LogEntry, LogLevel, StatusRecord,
    UpgradeHistoryEntry,
};

pub const DAYS_IN_YEAR: u32 = 365;
pub const STREAK_LOOKBACK_DAYS: u32 = 365;
pub const PROJECTION_MONTH_DAYS: f64 = 30.0;
pub const BUY_DURATION_MIN: u32 = 1;
pub const BUY_DURATION_MAX: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub total_ct: u64,
    pub avg_time: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WindowSum {
    pub total_ct: u64,
    pub avg_time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourCount {
    pub hour: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Projection {
    pub end_of_month: i64,
    pub end_of_year: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UpgradeStats {
    pub last: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    pub info: usize,
    pub warning: usize,
    pub error: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTone {
    Good,
    Neutral,
    Bad,
}

fn day_before(reference: NaiveDate, days_back: u32) -> Option<NaiveDate> {
    reference.checked_sub_days(Days::new(u64::from(days_back)))
}

pub fn daily_totals(stats: &DailyStats, reference: NaiveDate, window_days: u32) -> Vec<DayTotal> {
    (0..window_days)
        .rev()
        .filter_map(|back| day_before(reference, back))
        .map(|date| {
            let stat = stats.get(&date).copied().unwrap_or_default();
            DayTotal {
                date,
                total_ct: stat.total_ct,
                avg_time: stat.avg_time,
            }
        })
        .collect()
}

pub fn window_sum(
    stats: &DailyStats,
    reference: NaiveDate,
    offset_days: u32,
    window_days: u32,
) -> WindowSum {
    let mut total_ct = 0_u64;
    let mut avg_sum = 0.0;
    let mut avg_days = 0_u32;

    for back in offset_days..offset_days.saturating_add(window_days) {
        let Some(date) = day_before(reference, back) else {
            break;
        };
        let Some(stat) = stats.get(&date) else {
            continue;
        };
        total_ct = total_ct.saturating_add(stat.total_ct);
        if stat.avg_time > 0.0 {
            avg_sum += stat.avg_time;
            avg_days += 1;
        }
    }

    WindowSum {
        total_ct,
        avg_time: if avg_days == 0 {
            0.0
        } else {
            avg_sum / f64::from(avg_days)
        },
    }
}

pub fn streak(stats: &DailyStats, reference: NaiveDate, max_lookback_days: u32) -> u32 {
    let mut days = 0;
    for back in 0..max_lookback_days {
        let active = day_before(reference, back)
            .and_then(|date| stats.get(&date))
            .map(|stat| stat.total_ct > 0)
            .unwrap_or(false);
        if !active {
            break;
        }
        days += 1;
    }
    days
}

pub fn efficiency(total_loops: u64, total_ct: u64) -> u64 {
    if total_loops == 0 {
        return 0;
    }
    (total_ct as f64 / total_loops as f64 * 100.0).round() as u64
}

pub fn peak_hours(hourly: &HourlyStats, top_n: usize) -> Vec<HourCount> {
    let mut ranked: Vec<HourCount> = hourly
        .iter()
        .map(|(hour, count)| HourCount {
            hour: hour.clone(),
            count: *count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.hour.cmp(&b.hour)));
    ranked.truncate(top_n);
    ranked
}

/// The daily rate is the month-to-date total over a flat 30 days, however
/// far into the month the total was collected.
pub fn linear_projection(
    month_to_date_total: u64,
    _days_elapsed_in_month: u32,
    days_remaining_in_month: u32,
    lifetime_total: u64,
    days_in_year: u32,
) -> Projection {
    let rate = month_to_date_total as f64 / PROJECTION_MONTH_DAYS;
    Projection {
        end_of_month: (month_to_date_total as f64 + rate * f64::from(days_remaining_in_month))
            .round() as i64,
        end_of_year: (lifetime_total as f64 + rate * f64::from(days_in_year)).round() as i64,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn upgrade_duration_stats(
    entries: &[UpgradeHistoryEntry],
    status: &StatusRecord,
) -> UpgradeStats {
    let qualifying: Vec<(usize, &UpgradeHistoryEntry)> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.duration_minutes > 0.0)
        .collect();

    if qualifying.is_empty() {
        return UpgradeStats {
            last: round1(status.last_upgrade_duration),
            avg: round1(status.avg_upgrade_duration),
            min: 0.0,
            max: 0.0,
            count: 0,
        };
    }

    let durations: Vec<f64> = qualifying.iter().map(|(_, e)| e.duration_minutes).collect();
    let last = qualifying
        .iter()
        .max_by_key(|(idx, e)| (parse_timestamp(&e.time), *idx))
        .map(|(_, e)| e.duration_minutes)
        .unwrap_or_default();
    let sum: f64 = durations.iter().sum();

    UpgradeStats {
        last: round1(last),
        avg: round1(sum / durations.len() as f64),
        min: round1(durations.iter().copied().fold(f64::INFINITY, f64::min)),
        max: round1(durations.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        count: durations.len(),
    }
}

pub fn total_upgrade_minutes(entries: &[UpgradeHistoryEntry]) -> f64 {
    entries
        .iter()
        .map(|e| e.duration_minutes)
        .filter(|m| *m > 0.0)
        .sum()
}

pub fn profit_estimate(
    total_ct_all_time: u64,
    total_upgrade_minutes: f64,
    ct_value: f64,
    minute_cost: f64,
) -> f64 {
    total_ct_all_time as f64 * ct_value - total_upgrade_minutes * minute_cost
}

pub fn online_status(
    last_heartbeat: Option<NaiveDateTime>,
    now: NaiveDateTime,
    threshold: Duration,
) -> bool {
    let Some(beat) = last_heartbeat else {
        return false;
    };
    let age_ms = now.signed_duration_since(beat).num_milliseconds();
    i128::from(age_ms) < threshold.as_millis() as i128
}

pub fn uptime(start: Option<NaiveDateTime>, now: NaiveDateTime) -> String {
    let Some(start) = start else {
        return "---".to_string();
    };
    let minutes = now.signed_duration_since(start).num_minutes().max(0);
    format!("{}h {}m", minutes / 60, minutes % 60)
}

pub fn display_status(status: Option<BotStatus>, online: bool) -> &'static str {
    if !online {
        return "OFFLINE";
    }
    status.map(|s| s.as_str()).unwrap_or("UNKNOWN")
}

pub fn status_tone(status: Option<BotStatus>, online: bool) -> StatusTone {
    if !online {
        return StatusTone::Bad;
    }
    match status {
        Some(BotStatus::Running | BotStatus::Upgrading | BotStatus::Buying | BotStatus::Sniping) => {
            StatusTone::Good
        }
        Some(BotStatus::Error) => StatusTone::Bad,
        _ => StatusTone::Neutral,
    }
}

pub fn percent_change(current: u64, previous: u64) -> i64 {
    if previous == 0 {
        return if current > 0 { 100 } else { 0 };
    }
    ((current as f64 - previous as f64) / previous as f64 * 100.0).round() as i64
}

pub fn suggested_buy_duration(last_upgrade_minutes: f64, current: u32) -> u32 {
    if !last_upgrade_minutes.is_finite() || last_upgrade_minutes <= 0.0 {
        return current;
    }
    (last_upgrade_minutes.ceil() as u32).clamp(BUY_DURATION_MIN, BUY_DURATION_MAX)
}

pub fn log_level_counts(logs: &[LogEntry]) -> LevelCounts {
    logs.iter().fold(LevelCounts::default(), |mut acc, log| {
        match log.level {
            LogLevel::Info => acc.info += 1,
            LogLevel::Warning => acc.warning += 1,
            LogLevel::Error => acc.error += 1,
        }
        acc
    })
}

pub fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_next| first_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(30)
}

pub fn month_to_date_total(stats: &DailyStats, reference: NaiveDate) -> u64 {
    stats
        .range(reference.with_day(1).unwrap_or(reference)..=reference)
        .map(|(_, stat)| stat.total_ct)
        .sum()
}
