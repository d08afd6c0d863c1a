use std::ffi::OsString;
use std::fs;
use std::path::Path;

use chrono::{Duration, Utc};
use tempfile::tempdir;
use todo_core::filter::{FilterMode, filter_tasks};
use todo_core::stats::Stats;
use todo_core::storage::FileStorage;
use todo_core::store::TaskStore;

fn run_cli(data_dir: &Path, args: &[&str]) -> String {
    let mut argv: Vec<OsString> = vec![
        "todo".into(),
        "--todorc".into(),
        "/dev/null".into(),
        "--data".into(),
        data_dir.as_os_str().to_owned(),
        "--rc".into(),
        "color=off".into(),
    ];
    argv.extend(args.iter().map(OsString::from));

    let mut out = Vec::new();
    todo_core::run_with_output(argv, &mut out).expect("cli run");
    String::from_utf8(out).expect("utf8 output")
}

#[test]
fn file_store_roundtrip_and_filtering() {
    let temp = tempdir().expect("tempdir");
    let now = Utc::now();

    let storage = FileStorage::open(temp.path()).expect("open storage");
    let mut store = TaskStore::open(storage, "tasks").expect("open store");
    let late = store
        .add("Renew passport", Some(now - Duration::days(1)), now)
        .expect("add")
        .expect("id");
    store.add("Buy milk", None, now).expect("add");

    let storage = FileStorage::open(temp.path()).expect("reopen storage");
    let reopened = TaskStore::open(storage, "tasks").expect("reopen store");
    assert_eq!(reopened.tasks(), store.tasks());

    let overdue = filter_tasks(reopened.tasks(), FilterMode::Overdue, now, &chrono_tz::UTC);
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, late);

    let stats = Stats::compute(reopened.tasks(), now);
    assert_eq!((stats.total, stats.completed, stats.overdue), (2, 0, 1));
}

#[test]
fn corrupt_file_is_treated_as_empty_and_overwritten() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("tasks.json"), "{{ definitely not json").expect("seed file");

    let storage = FileStorage::open(temp.path()).expect("open storage");
    let mut store = TaskStore::open(storage, "tasks").expect("open store");
    assert!(store.is_empty());

    store.add("Fresh start", None, Utc::now()).expect("add");
    let raw = fs::read_to_string(temp.path().join("tasks.json")).expect("read back");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(value.as_array().map(Vec::len), Some(1));
}

#[test]
fn cli_add_list_toggle_delete() {
    let temp = tempdir().expect("tempdir");
    let data = temp.path();

    let out = run_cli(data, &["list"]);
    assert!(out.starts_with("No tasks yet. Add a task to get started!"));

    let out = run_cli(data, &["add", "Buy", "milk"]);
    assert!(out.contains("Buy milk"));
    assert!(out.contains("Total: 1  Completed: 0  Overdue: 0"));

    let out = run_cli(data, &["add", "Ship", "release", "in:2"]);
    assert!(out.contains("Today at") || out.contains("Tomorrow at"));
    assert!(out.contains("Total: 2"));

    let raw = fs::read_to_string(data.join("tasks.json")).expect("stored tasks");
    let stored: serde_json::Value = serde_json::from_str(&raw).expect("json");
    let items = stored.as_array().expect("array");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["text"], "Buy milk");
    assert!(items[0]["dueDate"].is_null());
    assert_eq!(items[0]["completed"], false);
    assert!(items[1]["dueDate"].is_string());
    assert!(items[1]["createdAt"].is_string());

    let milk = items[0]["id"].as_u64().expect("numeric id").to_string();
    let out = run_cli(data, &["done", &milk]);
    assert!(out.contains("[x]"));
    assert!(out.contains("Completed: 1"));

    let out = run_cli(data, &["upcoming"]);
    assert!(out.contains("Ship release"));
    assert!(!out.contains("Buy milk"));

    let out = run_cli(data, &["overdue"]);
    assert!(out.starts_with("No overdue tasks."));

    let out = run_cli(data, &["delete", &milk]);
    assert!(!out.contains("Buy milk"));
    assert!(out.contains("Total: 1  Completed: 0"));
}

#[test]
fn cli_uses_configured_storage_key() {
    let temp = tempdir().expect("tempdir");
    let data = temp.path();

    run_cli(data, &["rc.storage.key=work", "add", "Standup"]);
    assert!(data.join("work.json").exists());
    assert!(!data.join("tasks.json").exists());

    let out = run_cli(data, &["list"]);
    assert!(out.starts_with("No tasks yet."));
}

#[test]
fn cli_keeps_ordinary_words_and_rejects_wild_offsets() {
    let temp = tempdir().expect("tempdir");
    let data = temp.path();

    run_cli(data, &["add", "Update", "schedule", "for", "Q3"]);
    let raw = fs::read_to_string(data.join("tasks.json")).expect("stored tasks");
    let stored: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(stored[0]["text"], "Update schedule for Q3");
    assert!(stored[0]["dueDate"].is_null());

    let dir = data.to_string_lossy().into_owned();
    let argv: Vec<OsString> = [
        "todo",
        "--todorc",
        "/dev/null",
        "--data",
        dir.as_str(),
        "add",
        "x",
        "due:+9999999999999h",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    assert!(todo_core::run_with_output(argv, Vec::new()).is_err());

    let raw = fs::read_to_string(data.join("tasks.json")).expect("stored tasks");
    let stored: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(stored.as_array().map(Vec::len), Some(1));
}
