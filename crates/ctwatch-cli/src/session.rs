use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

pub const SESSION_ACCOUNT_KEY: &str = "ctwatch.account";

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir().ok_or_else(|| anyhow!("no user config directory"))?;
        Ok(Self::at(dir.join("ctwatch").join("session.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn account(&self) -> Result<Option<String>> {
        Ok(self
            .load()?
            .get(SESSION_ACCOUNT_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty()))
    }

    pub fn save_account(&self, account: &str) -> Result<()> {
        let mut map = self.load()?;
        map.insert(SESSION_ACCOUNT_KEY.to_string(), Value::String(account.to_string()));
        self.store(&map)
    }

    pub fn clear(&self) -> Result<()> {
        let mut map = self.load()?;
        if map.remove(SESSION_ACCOUNT_KEY).is_none() {
            return Ok(());
        }
        self.store(&map)
    }

    fn load(&self) -> Result<BTreeMap<String, Value>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", self.path.display()))
            }
        };
        // A corrupt session file only costs the remembered account.
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    }

    fn store(&self, map: &BTreeMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(map)?)
            .with_context(|| format!("writing {}", self.path.display()))
    }
}
