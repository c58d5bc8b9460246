use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::aggregate::{BUY_DURATION_MAX, BUY_DURATION_MIN};
use crate::store::{validate_path, RealtimeStore, StoreError};

pub const ACCOUNTS_ROOT: &str = "accounts";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no account selected")]
    NoAccount,
    #[error("invalid account id {0:?}")]
    InvalidAccount(String),
    #[error("buy duration must be between 1 and 60 minutes, got {0}")]
    BuyDurationOutOfRange(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BotCommand {
    Start,
    Stop,
    Screenshot,
}

impl BotCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotCommand::Start => "START",
            BotCommand::Stop => "STOP",
            BotCommand::Screenshot => "SCREENSHOT",
        }
    }

    pub fn requires_confirmation(&self) -> bool {
        matches!(self, BotCommand::Stop)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: BotCommand,
    pub time: String,
}

impl CommandRecord {
    pub fn new(command: BotCommand, at: DateTime<Utc>) -> Self {
        Self {
            command,
            time: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

pub fn validate_account(account: &str) -> Result<&str, CommandError> {
    let trimmed = account.trim();
    if trimmed.is_empty() || trimmed.contains('/') || validate_path(trimmed).is_err() {
        return Err(CommandError::InvalidAccount(account.to_string()));
    }
    Ok(trimmed)
}

pub fn account_path(account: &str) -> String {
    format!("{ACCOUNTS_ROOT}/{account}")
}

pub fn commands_path(account: &str) -> String {
    format!("{}/commands", account_path(account))
}

pub fn buy_duration_path(account: &str) -> String {
    format!("{}/remote_config/buy_duration_minutes", account_path(account))
}

pub fn parse_buy_duration(input: &str) -> Result<u32, CommandError> {
    let out_of_range = || CommandError::BuyDurationOutOfRange(input.trim().to_string());
    let minutes: i64 = input.trim().parse().map_err(|_| out_of_range())?;
    if minutes < i64::from(BUY_DURATION_MIN) || minutes > i64::from(BUY_DURATION_MAX) {
        return Err(out_of_range());
    }
    u32::try_from(minutes).map_err(|_| out_of_range())
}

pub async fn send_command<S: RealtimeStore + ?Sized>(
    store: &S,
    account: &str,
    command: BotCommand,
    at: DateTime<Utc>,
) -> Result<String, CommandError> {
    let account = validate_account(account)?;
    let record = CommandRecord::new(command, at);
    let key = store
        .push(&commands_path(account), serde_json::to_value(&record).map_err(StoreError::from)?)
        .await?;
    info!(%account, command = command.as_str(), %key, "command queued");
    Ok(key)
}

pub async fn set_buy_duration<S: RealtimeStore + ?Sized>(
    store: &S,
    account: &str,
    minutes: u32,
) -> Result<(), CommandError> {
    let account = validate_account(account)?;
    if !(BUY_DURATION_MIN..=BUY_DURATION_MAX).contains(&minutes) {
        return Err(CommandError::BuyDurationOutOfRange(minutes.to_string()));
    }
    store.set(&buy_duration_path(account), json!(minutes)).await?;
    info!(%account, minutes, "buy duration updated");
    Ok(())
}
