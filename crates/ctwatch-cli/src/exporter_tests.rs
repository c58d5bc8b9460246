use crate::exporter::{decode_screenshot, save_screenshots, screenshot_file_name, write_ct_history_csv};
use ctwatch_core::records::{CtHistoryEntry, ScreenshotEntry};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

fn make_temp_dir(name: &str) -> PathBuf {
    let mut path = env::temp_dir();
    let uniq = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("unix epoch")
        .as_nanos();
    path.push(format!("ctwatch-tests-{name}-{uniq}"));
    fs::create_dir_all(&path).expect("create temp dir");
    path
}

fn shot(id: &str, time: &str, data: &str) -> ScreenshotEntry {
    ScreenshotEntry {
        id: id.to_string(),
        time: time.to_string(),
        data: data.to_string(),
    }
}

#[test]
fn csv_export_writes_file() {
    // Arrange
    let dir = make_temp_dir("csv");
    let out = dir.join("ct.csv");
    let entries = vec![CtHistoryEntry {
        id: "-a".to_string(),
        time: "2024-05-01T09:15:00".to_string(),
        loop_number: 7,
        mode: "+5".to_string(),
        duration_seconds: 90.0,
        duration_minutes: None,
    }];

    // Act
    write_ct_history_csv(&entries, Some(&out)).expect("export");

    // Assert
    let written = fs::read_to_string(&out).expect("read csv");
    assert_eq!(
        written,
        "date,time,loop,mode,duration_minutes\n2024-05-01,09:15:00,7,+5,1.5\n"
    );

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn screenshots_are_decoded_and_bad_payloads_skipped() {
    // Arrange
    let dir = make_temp_dir("shots");
    let shots = vec![
        shot("-N1", "2024-05-01T10:00:00", "/9j/4AAQ"),
        shot("-N2", "2024-05-01T10:05:00", "data:image/jpeg;base64,aGVs\nbG8="),
        shot("-N3", "2024-05-01T10:06:00", "%%% not base64"),
        shot("-N4", "2024-05-01T10:07:00", ""),
    ];

    // Act
    let written = save_screenshots(&shots, &dir).expect("save");

    // Assert
    assert_eq!(written.len(), 2);
    assert_eq!(
        fs::read(&written[0]).expect("first"),
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]
    );
    assert_eq!(fs::read(&written[1]).expect("second"), b"hello".to_vec());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn screenshot_names_are_filesystem_safe() {
    let name = screenshot_file_name(&shot("-Nx/../y", "2024-05-01T10:00:00.5", ""));

    assert_eq!(name, "screenshot-2024-05-01T10-00-00-5-Nxy.jpg");
    assert!(decode_screenshot("data:image/jpeg;base64,aGk=").is_ok());
}
