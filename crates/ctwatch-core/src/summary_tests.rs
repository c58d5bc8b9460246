use chrono::NaiveDateTime;
use serde_json::{json, Value};

use crate::aggregate::StatusTone;
use crate::config::DashboardConfig;
use crate::dashboard::AccountView;
use crate::summary::{Summary, RECENT_LIMIT};

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("valid timestamp")
}

fn account_tree() -> Value {
    let config_history: serde_json::Map<String, Value> = (0..6)
        .map(|i| {
            (
                format!("-c{i}"),
                json!({
                    "time": format!("2024-03-05T10:0{i}:00"),
                    "key": "buy_duration_minutes",
                    "old": 20 + i,
                    "new": 21 + i
                }),
            )
        })
        .collect();

    json!({
        "status": "RUNNING",
        "current_loop": 40,
        "total_ct_processed": 30,
        "current_step": "Buying",
        "start_time": "2024-03-05T09:30:00",
        "last_heartbeat": "2024-03-05T11:59:00",
        "avg_time_per_ct": 0,
        "last_upgrade_duration": 12.2,
        "total_stats": {
            "total_ct": 100,
            "total_loops": 10,
            "total_upgrade_minutes": 50,
            "total_days": 12
        },
        "daily_stats": {
            "2024-02-29": { "total_ct": 9 },
            "2024-03-01": { "total_ct": 2 },
            "2024-03-04": { "total_ct": 5, "avg_time": 0 },
            "2024-03-05": { "total_ct": 3, "avg_time": 4.0 }
        },
        "screenshots": {
            "-s1": { "time": "2024-03-05T10:00:00", "data": "" },
            "-s2": { "time": "2024-03-05T11:00:00", "data": "" }
        },
        "config_history": config_history,
        "achievements": {
            "-a1": { "name": "First CT", "unlocked_at": "2024-02-01T08:00:00" },
            "-a2": { "title": "Week streak", "time": "2024-03-01T08:00:00" }
        }
    })
}

fn summarize(tree: &Value, now: &str) -> Summary {
    let config = DashboardConfig::default();
    let view = AccountView::from_tree("PC_MAIN", tree, &config);
    Summary::compute(&view, &config, at(now))
}

#[test]
fn summary_combines_status_and_lifetime_totals() {
    // Arrange
    let tree = account_tree();

    // Act
    let summary = summarize(&tree, "2024-03-05 12:00:00");

    // Assert
    assert!(summary.online);
    assert_eq!(summary.status, "RUNNING");
    assert_eq!(summary.tone, StatusTone::Good);
    assert_eq!(summary.uptime, "2h 30m");
    assert_eq!(summary.avg_time_per_ct, None);
    // Larger of total_stats and the live status record on each side.
    assert_eq!(summary.efficiency, 250);
    assert_eq!(summary.active_days, 12);
    // No upgrade history, so the stored upgrade minutes drive the cost side.
    assert_eq!(summary.total_upgrade_minutes, 50.0);
    assert_eq!(summary.profit_bp, 2_195_250.0);
}

#[test]
fn summary_windows_follow_the_calendar() {
    let summary = summarize(&account_tree(), "2024-03-05 12:00:00");

    assert_eq!(summary.today.total_ct, 3);
    assert_eq!(summary.this_week.total_ct, 19);
    assert_eq!(summary.this_week.avg_time, 4.0);
    assert_eq!(summary.streak_days, 2);
    // Month to date is 10 CT: 10 + 26 * 10/30 and 100 + 365 * 10/30.
    assert_eq!(summary.projection.end_of_month, 19);
    assert_eq!(summary.projection.end_of_year, 222);
    assert_eq!(summary.last_7_days.len(), 7);
    assert_eq!(summary.last_30_days.len(), 30);
}

#[test]
fn buy_duration_defaults_and_suggestion_follows_last_upgrade() {
    let summary = summarize(&account_tree(), "2024-03-05 12:00:00");

    assert_eq!(summary.buy_duration_minutes, 20);
    assert_eq!(summary.upgrades.last, 12.2);
    assert_eq!(summary.suggested_buy_duration, 13);
}

#[test]
fn remote_config_and_history_override_fallbacks() {
    // Arrange
    let mut tree = account_tree();
    tree["remote_config"] = json!({ "buy_duration_minutes": "25" });
    tree["avg_time_per_ct"] = json!(3.5);
    tree["upgrade_history"] = json!({
        "-u1": { "time": "2024-03-05T08:00:00", "duration_minutes": 7.5 },
        "-u2": { "time": "2024-03-05T09:00:00", "duration_minutes": 2.5 }
    });

    // Act
    let summary = summarize(&tree, "2024-03-05 12:00:00");

    // Assert
    assert_eq!(summary.buy_duration_minutes, 25);
    assert_eq!(summary.avg_time_per_ct, Some(3.5));
    assert_eq!(summary.total_upgrade_minutes, 10.0);
    assert_eq!(summary.upgrades.last, 2.5);
    assert_eq!(summary.suggested_buy_duration, 3);
    assert_eq!(summary.profit_bp, 100.0 * 22_000.0 - 10.0 * 95.0);
}

#[test]
fn stale_heartbeat_reads_offline() {
    let summary = summarize(&account_tree(), "2024-03-05 12:10:00");

    assert!(!summary.online);
    assert_eq!(summary.status, "OFFLINE");
    assert_eq!(summary.tone, StatusTone::Bad);
}

#[test]
fn summary_lists_recent_activity_newest_first() {
    let summary = summarize(&account_tree(), "2024-03-05 12:00:00");

    assert_eq!(
        summary.screenshot_times,
        vec!["2024-03-05T11:00:00", "2024-03-05T10:00:00"]
    );
    assert_eq!(summary.recent_config_changes.len(), RECENT_LIMIT);
    assert_eq!(summary.recent_config_changes[0].time, "2024-03-05T10:05:00");
    assert_eq!(summary.recent_config_changes[0].new, json!(26));
    assert_eq!(summary.achievement_count, 2);
    let titles: Vec<&str> = summary
        .recent_achievements
        .iter()
        .map(|a| a.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Week streak", "First CT"]);
}
