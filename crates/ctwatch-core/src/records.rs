use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BotStatus {
    Running,
    Upgrading,
    Buying,
    Sniping,
    Error,
    #[serde(other)]
    Unknown,
}

impl BotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotStatus::Running => "RUNNING",
            BotStatus::Upgrading => "UPGRADING",
            BotStatus::Buying => "BUYING",
            BotStatus::Sniping => "SNIPING",
            BotStatus::Error => "ERROR",
            BotStatus::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    pub buy_duration_minutes: Option<u32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Option<BotStatus>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub current_loop: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_ct_processed: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub current_step: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub start_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub last_heartbeat: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub avg_time_per_ct: f64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub current_plus_mode: i64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub last_upgrade_duration: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub avg_upgrade_duration: f64,
    #[serde(default, deserialize_with = "lenient_remote_config")]
    pub remote_config: RemoteConfig,
}

impl StatusRecord {
    pub fn from_value(value: &Value) -> Self {
        decode_or_default(value, "status")
    }

    pub fn heartbeat(&self) -> Option<NaiveDateTime> {
        self.last_heartbeat.as_deref().and_then(parse_timestamp)
    }

    pub fn started_at(&self) -> Option<NaiveDateTime> {
        self.start_time.as_deref().and_then(parse_timestamp)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Warning,
    Error,
    #[default]
    #[serde(other)]
    Info,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time: String,
    #[serde(default, deserialize_with = "lenient_level")]
    pub level: LogLevel,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub data: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_ct: u64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub avg_time: f64,
}

pub type DailyStats = BTreeMap<NaiveDate, DailyStat>;

pub type HourlyStats = BTreeMap<String, u64>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CtHistoryEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub loop_number: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mode: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub duration_seconds: f64,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub duration_minutes: Option<f64>,
}

impl CtHistoryEntry {
    pub fn minutes(&self) -> f64 {
        self.duration_minutes
            .unwrap_or(self.duration_seconds / 60.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpgradeHistoryEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub loop_number: u64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub duration_minutes: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub buy_duration: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigHistoryEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub key: String,
    #[serde(default)]
    pub old: Value,
    #[serde(default)]
    pub new: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "name", deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, alias = "unlocked_at", deserialize_with = "lenient_opt_string")]
    pub time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalStats {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_ct: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_loops: u64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_upgrade_minutes: f64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_days: u64,
}

impl TotalStats {
    pub fn from_value(value: &Value) -> Self {
        decode_or_default(value, "total_stats")
    }
}

pub trait Keyed {
    fn set_id(&mut self, id: String);
}

macro_rules! keyed {
    ($($ty:ty),*) => {
        $(impl Keyed for $ty {
            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        })*
    };
}

keyed!(
    LogEntry,
    ScreenshotEntry,
    CtHistoryEntry,
    UpgradeHistoryEntry,
    ConfigHistoryEntry,
    Achievement
);

pub fn parse_entries<T>(value: &Value) -> Vec<T>
where
    T: Keyed + for<'de> Deserialize<'de>,
{
    let pairs: Vec<(String, &Value)> = match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(idx, v)| (idx.to_string(), v))
            .collect(),
        _ => return Vec::new(),
    };

    pairs
        .into_iter()
        .filter(|(_, v)| v.is_object())
        .filter_map(|(key, v)| match T::deserialize(v) {
            Ok(mut record) => {
                record.set_id(key);
                Some(record)
            }
            Err(err) => {
                debug!(%key, %err, "skipping malformed entry");
                None
            }
        })
        .collect()
}

pub fn parse_daily_stats(value: &Value) -> DailyStats {
    let Value::Object(map) = value else {
        return DailyStats::new();
    };

    map.iter()
        .filter_map(|(key, v)| {
            let date = NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()?;
            let stat = DailyStat::deserialize(v).unwrap_or_default();
            Some((date, stat))
        })
        .collect()
}

pub fn parse_hourly_stats(value: &Value) -> HourlyStats {
    let pairs: Vec<(String, &Value)> = match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(idx, v)| (idx.to_string(), v))
            .collect(),
        _ => return HourlyStats::new(),
    };

    let mut out = HourlyStats::new();
    for (key, v) in pairs {
        let Ok(hour) = key.trim().parse::<u32>() else {
            continue;
        };
        if hour > 23 {
            continue;
        }
        let count = value_as_u64(v).unwrap_or(0);
        *out.entry(format!("{hour:02}")).or_insert(0) += count;
    }
    out
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Local).naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn decode_or_default<T>(value: &Value, what: &str) -> T
where
    T: Default + for<'de> Deserialize<'de>,
{
    if !value.is_object() {
        return T::default();
    }
    T::deserialize(value).unwrap_or_else(|err| {
        debug!(%err, record = what, "falling back to default record");
        T::default()
    })
}

fn value_as_u64(v: &Value) -> Option<u64> {
    value_as_f64(v).filter(|n| *n >= 0.0).map(|n| n.round() as u64)
}

fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(value_as_u64(&v).unwrap_or(0))
}

fn lenient_opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(value_as_u64(&v).and_then(|n| u32::try_from(n).ok()))
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(value_as_f64(&v).map(|n| n.round() as i64).unwrap_or(0))
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(value_as_f64(&v).unwrap_or(0.0))
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(value_as_f64(&v))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(d)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_status<'de, D: Deserializer<'de>>(d: D) -> Result<Option<BotStatus>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::String(s) if !s.trim().is_empty() => {
            Some(BotStatus::deserialize(Value::String(s.trim().to_ascii_uppercase()))
                .unwrap_or(BotStatus::Unknown))
        }
        _ => None,
    })
}

fn lenient_level<'de, D: Deserializer<'de>>(d: D) -> Result<LogLevel, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::String(s) => {
            LogLevel::deserialize(Value::String(s.trim().to_ascii_uppercase())).unwrap_or_default()
        }
        _ => LogLevel::Info,
    })
}

fn lenient_remote_config<'de, D: Deserializer<'de>>(d: D) -> Result<RemoteConfig, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(decode_or_default(&v, "remote_config"))
}
