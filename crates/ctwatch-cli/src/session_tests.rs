use crate::session::{SessionStore, SESSION_ACCOUNT_KEY};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

fn temp_session_file(name: &str) -> PathBuf {
    let uniq = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("unix epoch")
        .as_nanos();
    env::temp_dir()
        .join(format!("ctwatch-session-{name}-{uniq}"))
        .join("session.json")
}

#[test]
fn account_survives_reopen_and_clears_on_logout() {
    // Arrange
    let path = temp_session_file("roundtrip");
    let store = SessionStore::at(&path);
    assert_eq!(store.account().expect("empty"), None);

    // Act
    store.save_account("PC_MAIN").expect("save");
    let reopened = SessionStore::at(&path);

    // Assert
    assert_eq!(reopened.account().expect("load"), Some("PC_MAIN".to_string()));
    let raw = fs::read_to_string(&path).expect("read");
    assert!(raw.contains(SESSION_ACCOUNT_KEY));

    reopened.clear().expect("clear");
    assert_eq!(SessionStore::at(&path).account().expect("cleared"), None);

    if let Some(dir) = path.parent() {
        let _ = fs::remove_dir_all(dir);
    }
}

#[test]
fn unrelated_keys_and_corrupt_files_are_tolerated() {
    let path = temp_session_file("corrupt");
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");

    fs::write(&path, "{ not json").expect("write corrupt");
    assert_eq!(SessionStore::at(&path).account().expect("corrupt"), None);

    fs::write(&path, r#"{"theme":"dark"}"#).expect("write other");
    let store = SessionStore::at(&path);
    store.save_account("PC_ALT").expect("save");
    store.clear().expect("clear");
    let raw = fs::read_to_string(&path).expect("read");
    assert!(raw.contains("theme"), "other keys survive logout");

    if let Some(dir) = path.parent() {
        let _ = fs::remove_dir_all(dir);
    }
}
