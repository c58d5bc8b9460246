use std::fmt::Write as _;

use crate::records::{parse_timestamp, CtHistoryEntry};

pub const CT_HISTORY_HEADER: &str = "date,time,loop,mode,duration_minutes";

fn field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

pub fn ct_history_csv(entries: &[CtHistoryEntry]) -> String {
    let mut out = String::with_capacity(64 * (entries.len() + 1));
    out.push_str(CT_HISTORY_HEADER);
    out.push('\n');

    for entry in entries {
        let (date, time) = match parse_timestamp(&entry.time) {
            Some(ts) => (
                ts.format("%Y-%m-%d").to_string(),
                ts.format("%H:%M:%S").to_string(),
            ),
            None => (entry.time.clone(), String::new()),
        };
        let _ = writeln!(
            out,
            "{},{},{},{},{:.1}",
            field(&date),
            field(&time),
            entry.loop_number,
            field(&entry.mode),
            entry.minutes()
        );
    }

    out
}
