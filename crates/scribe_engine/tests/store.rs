use std::fs;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scribe_engine::{ensure_state_dir, AtomicFileWriter, Store};
use serde_json::json;
use tempfile::TempDir;

fn manual_clock(start: i64) -> (Arc<AtomicI64>, scribe_engine::Clock) {
    let now = Arc::new(AtomicI64::new(start));
    let handle = now.clone();
    let clock: scribe_engine::Clock = Arc::new(move || handle.load(Ordering::SeqCst));
    (now, clock)
}

#[test]
fn values_survive_reopening() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.json");

    let mut store = Store::open(&path, "scribe_").unwrap();
    store
        .set("currentTask", &json!({"job_id": "job-1"}), None)
        .unwrap();

    let mut reopened = Store::open(&path, "scribe_").unwrap();
    let value: serde_json::Value = reopened.get("currentTask").unwrap();
    assert_eq!(value, json!({"job_id": "job-1"}));
    assert_eq!(reopened.keys(), vec!["currentTask".to_string()]);
}

#[test]
fn expired_entries_return_the_default_and_are_deleted() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.json");
    let (now, clock) = manual_clock(1_000);

    let mut store = Store::open(&path, "scribe_").unwrap().with_clock(clock);
    store
        .set("draft", &vec!["A".to_string()], Some(Duration::from_millis(500)))
        .unwrap();

    now.store(1_400, Ordering::SeqCst);
    assert_eq!(store.get::<Vec<String>>("draft"), Some(vec!["A".to_string()]));

    now.store(1_501, Ordering::SeqCst);
    assert_eq!(store.get_or("draft", Vec::<String>::new()), Vec::<String>::new());
    assert!(!store.has("draft"));

    let reopened = Store::open(&path, "scribe_").unwrap();
    assert!(!reopened.has("draft"));
}

#[test]
fn has_ignores_expiry_until_read() {
    let temp = TempDir::new().unwrap();
    let (now, clock) = manual_clock(0);
    let mut store = Store::open(&temp.path().join("state.json"), "scribe_")
        .unwrap()
        .with_clock(clock);
    store
        .set("draft", &"A", Some(Duration::from_millis(10)))
        .unwrap();

    now.store(50, Ordering::SeqCst);
    assert!(store.has("draft"));
    assert_eq!(store.get::<String>("draft"), None);
    assert!(!store.has("draft"));
}

#[test]
fn clear_only_removes_prefixed_keys() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.json");
    fs::write(&path, r#"{"other_app": 42}"#).unwrap();

    let mut store = Store::open(&path, "scribe_").unwrap();
    store.set("a", &1, None).unwrap();
    store.set("b", &2, None).unwrap();
    assert_eq!(store.clear().unwrap(), 2);
    assert!(store.keys().is_empty());

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw, json!({"other_app": 42}));
}

#[test]
fn remove_reports_whether_the_key_existed() {
    let temp = TempDir::new().unwrap();
    let mut store = Store::open(&temp.path().join("state.json"), "p_").unwrap();
    store.set("k", &"v", None).unwrap();

    assert!(store.remove("k").unwrap());
    assert!(!store.remove("k").unwrap());
    assert_eq!(store.get::<String>("k"), None);
}

#[test]
fn wrong_shape_reads_as_missing() {
    let temp = TempDir::new().unwrap();
    let mut store = Store::open(&temp.path().join("state.json"), "p_").unwrap();
    store.set("k", &"text", None).unwrap();

    assert_eq!(store.get::<u32>("k"), None);
    assert_eq!(store.get_or("k", 7u32), 7);
}

#[test]
fn corrupt_file_opens_empty() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.json");
    fs::write(&path, "{not json").unwrap();

    let mut store = Store::open(&path, "p_").unwrap();
    assert!(store.keys().is_empty());
    store.set("k", &1, None).unwrap();
    assert_eq!(store.get::<i32>("k"), Some(1));
}

#[test]
fn creates_missing_state_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("nested").join("state");
    ensure_state_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("state.json", "{}").unwrap();
    let second = writer.write("state.json", r#"{"a":1}"#).unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), r#"{"a":1}"#);
}

#[test]
fn writing_into_a_file_path_fails_cleanly() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    assert!(writer.write("state.json", "{}").is_err());
    assert!(!file_path.with_file_name("state.json").exists());
}
