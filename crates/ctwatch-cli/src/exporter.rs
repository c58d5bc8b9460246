use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ctwatch_core::export::ct_history_csv;
use ctwatch_core::records::{CtHistoryEntry, ScreenshotEntry};
use tracing::{info, warn};

pub fn write_ct_history_csv(entries: &[CtHistoryEntry], output: Option<&Path>) -> Result<()> {
    let csv = ct_history_csv(entries);
    match output {
        Some(path) => {
            fs::write(path, csv).with_context(|| format!("writing {}", path.display()))?;
            info!(rows = entries.len(), path = %path.display(), "ct history exported");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(csv.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

pub(crate) fn screenshot_file_name(shot: &ScreenshotEntry) -> String {
    let stamp: String = shot
        .time
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let id: String = shot
        .id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    format!("screenshot-{}-{}.jpg", stamp.trim_matches('-'), id.trim_matches('-'))
}

pub(crate) fn decode_screenshot(data: &str) -> Result<Vec<u8>> {
    let payload = match data.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => data,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .context("screenshot payload is not valid base64")
}

pub fn save_screenshots(shots: &[ScreenshotEntry], dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut written = Vec::new();
    for shot in shots {
        let bytes = match decode_screenshot(&shot.data) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => continue,
            Err(err) => {
                warn!(id = %shot.id, %err, "skipping screenshot");
                continue;
            }
        };
        let path = dir.join(screenshot_file_name(shot));
        fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }

    Ok(written)
}
