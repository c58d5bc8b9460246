use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;

use crate::records::*;

#[test]
fn status_record_decodes_leniently() {
    // Arrange
    let raw = json!({
        "status": "upgrading",
        "current_loop": "42",
        "total_ct_processed": 17,
        "current_step": "Đang nâng cấp",
        "last_heartbeat": "2024-05-01T11:59:30",
        "avg_time_per_ct": "3.5",
        "current_plus_mode": 5.0,
        "remote_config": { "buy_duration_minutes": "25", "sell_threshold": 3 },
        "logs": { "-a": { "message": "nested collections are ignored" } }
    });

    // Act
    let status = StatusRecord::from_value(&raw);

    // Assert
    assert_eq!(status.status, Some(BotStatus::Upgrading));
    assert_eq!(status.current_loop, 42);
    assert_eq!(status.total_ct_processed, 17);
    assert_eq!(status.avg_time_per_ct, 3.5);
    assert_eq!(status.current_plus_mode, 5);
    assert_eq!(status.remote_config.buy_duration_minutes, Some(25));
    assert_eq!(status.remote_config.extra.get("sell_threshold"), Some(&json!(3)));
    assert_eq!(
        status.heartbeat(),
        NaiveDateTime::parse_from_str("2024-05-01 11:59:30", "%Y-%m-%d %H:%M:%S").ok()
    );
}

#[test]
fn status_record_defaults_absent_and_unknown_fields() {
    let status = StatusRecord::from_value(&json!({
        "status": "NAPPING",
        "current_loop": null,
        "remote_config": "broken"
    }));

    assert_eq!(status.status, Some(BotStatus::Unknown));
    assert_eq!(status.current_loop, 0);
    assert_eq!(status.remote_config, RemoteConfig::default());
    assert_eq!(StatusRecord::from_value(&json!(null)), StatusRecord::default());
    assert_eq!(StatusRecord::from_value(&json!({})).status, None);
}

#[test]
fn keyed_entries_carry_their_store_key() {
    // Arrange
    let raw = json!({
        "-Nb1": { "time": "2024-05-01T10:00:00", "level": "warning", "message": "slow" },
        "-Nb2": { "time": "2024-05-01T10:01:00", "level": "TRACE", "message": 12 },
        "-Nb3": "not an entry"
    });

    // Act
    let logs: Vec<LogEntry> = parse_entries(&raw);

    // Assert
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].id, "-Nb1");
    assert_eq!(logs[0].level, LogLevel::Warning);
    assert_eq!(logs[1].level, LogLevel::Info);
    assert_eq!(logs[1].message, "12");
}

#[test]
fn array_collections_use_index_keys() {
    let raw = json!([null, { "time": "t", "data": "aGk=" }]);

    let shots: Vec<ScreenshotEntry> = parse_entries(&raw);

    assert_eq!(shots.len(), 1);
    assert_eq!(shots[0].id, "1");
    assert_eq!(shots[0].data, "aGk=");
}

#[test]
fn daily_stats_skip_malformed_dates() {
    let raw = json!({
        "2024-05-01": { "total_ct": 9, "avg_time": 4.25 },
        "2024-05-02": { "total_ct": "x" },
        "yesterday": { "total_ct": 3 }
    });

    let stats = parse_daily_stats(&raw);

    assert_eq!(stats.len(), 2);
    let first = NaiveDate::from_ymd_opt(2024, 5, 1).expect("date");
    assert_eq!(stats[&first].total_ct, 9);
    assert_eq!(stats[&first].avg_time, 4.25);
    let second = NaiveDate::from_ymd_opt(2024, 5, 2).expect("date");
    assert_eq!(stats[&second].total_ct, 0);
}

#[test]
fn hourly_stats_normalize_hour_labels() {
    let raw = json!({ "9": 2, "09": 3, "14": "5", "24": 100, "noon": 1 });

    let hourly = parse_hourly_stats(&raw);

    assert_eq!(hourly.len(), 2);
    assert_eq!(hourly.get("09"), Some(&5));
    assert_eq!(hourly.get("14"), Some(&5));
}

#[test]
fn ct_history_minutes_fall_back_to_seconds() {
    let entries: Vec<CtHistoryEntry> = parse_entries(&json!({
        "a": { "time": "2024-05-01T10:00:00", "loop_number": 3, "mode": 5, "duration_seconds": 450 },
        "b": { "time": "2024-05-01T11:00:00", "duration_minutes": 6.5, "duration_seconds": 999 }
    }));

    assert_eq!(entries[0].mode, "5");
    assert_eq!(entries[0].minutes(), 7.5);
    assert_eq!(entries[1].minutes(), 6.5);
}

#[test]
fn timestamps_accept_the_shapes_the_bot_writes() {
    let expected =
        NaiveDateTime::parse_from_str("2024-05-01 10:11:12", "%Y-%m-%d %H:%M:%S").expect("ts");

    assert_eq!(parse_timestamp("2024-05-01T10:11:12"), Some(expected));
    assert_eq!(parse_timestamp("2024-05-01 10:11:12"), Some(expected));
    assert_eq!(
        parse_timestamp("2024-05-01T10:11:12.345678").map(|t| t.format("%H:%M:%S").to_string()),
        Some("10:11:12".to_string())
    );
    assert!(parse_timestamp("2024-05-01T10:11:12Z").is_some());
    assert_eq!(parse_timestamp(""), None);
    assert_eq!(parse_timestamp("soon"), None);
}

#[test]
fn log_level_round_trips_and_unknown_levels_read_as_info() {
    assert_eq!(serde_json::from_value::<LogLevel>(json!("ERROR")).expect("error"), LogLevel::Error);
    assert_eq!(serde_json::from_value::<LogLevel>(json!("WARNING")).expect("warning"), LogLevel::Warning);
    assert_eq!(serde_json::from_value::<LogLevel>(json!("DEBUG")).expect("debug"), LogLevel::Info);
    assert_eq!(serde_json::to_value(LogLevel::Info).expect("serialize"), json!("INFO"));
    assert_eq!(LogLevel::default(), LogLevel::Info);
}
