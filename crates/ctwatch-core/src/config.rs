use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub auth: Option<String>,
    pub request_timeout: Duration,
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            auth: None,
            request_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub online_threshold: Duration,
    pub log_limit: usize,
    pub screenshot_limit: usize,
    pub first_snapshot_timeout: Duration,
    pub ct_value: f64,
    pub minute_cost: f64,
    pub default_buy_duration: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            online_threshold: Duration::from_secs(120),
            log_limit: 50,
            screenshot_limit: 10,
            first_snapshot_timeout: Duration::from_secs(10),
            ct_value: 22_000.0,
            minute_cost: 95.0,
            default_buy_duration: 20,
        }
    }
}
