//! Task store persistence: reload, legacy files and the documented scenarios.

use chrono::NaiveDate;
use std::fs;
use study_helper::models::{NewTask, Priority};
use study_helper::store::TaskStore;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn tasks_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("tasks.json");

    {
        let mut store = TaskStore::open(&path);
        store
            .add(NewTask::new("Essay draft").due(date(2024, 6, 1)).priority(Priority::High))
            .unwrap();
        store.add(NewTask::new("Flashcards").description("Chapter 4 terms")).unwrap();
        assert!(store.complete(2));
        assert!(!store.has_unsaved_changes());
    }

    let store = TaskStore::open(&path);
    let tasks = store.list(None);
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].title, "Essay draft");
    assert_eq!(tasks[0].due_date, Some(date(2024, 6, 1)));
    assert_eq!(tasks[0].priority, Priority::High);
    assert!(tasks[1].completed);
    assert!(tasks[1].completed_at.is_some());
    assert_eq!(tasks[1].description.as_deref(), Some("Chapter 4 terms"));
}

#[test]
fn ids_are_never_reused_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");

    let mut store = TaskStore::open(&path);
    for title in ["a", "b", "c"] {
        store.add(NewTask::new(title)).unwrap();
    }
    assert!(store.delete(3));
    drop(store);

    let mut store = TaskStore::open(&path);
    let task = store.add(NewTask::new("d")).unwrap();
    assert_eq!(task.id, 4);
}

#[test]
fn legacy_array_files_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");
    fs::write(
        &path,
        r#"[
            {"id": 1, "title": "Read ch.3", "description": "", "due_date": "2024-06-02",
             "priority": "HIGH", "completed": false, "created_at": "2024-05-30T10:00:00"},
            {"id": 2, "title": "Essay draft", "description": null, "due_date": "",
             "priority": "someday", "completed": true, "created_at": "2024-05-30T10:05:00",
             "completed_at": "2024-05-31T09:00:00"},
            {"id": 2, "title": "Lab report", "due_date": null, "priority": "low",
             "completed": false, "created_at": "2024-05-30T11:00:00"}
        ]"#,
    )
    .unwrap();

    let mut store = TaskStore::open(&path);
    let tasks = store.list(None);
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0].priority, Priority::High);
    assert_eq!(tasks[0].description, None);
    assert_eq!(tasks[1].due_date, None);
    assert_eq!(tasks[1].priority, Priority::Medium);

    // The repeated id gets a fresh one
    assert_eq!(tasks[2].id, 3);
    assert_eq!(store.add(NewTask::new("Quiz")).unwrap().id, 4);

    // Saved back in the current format
    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved["next_id"], 5);
    assert_eq!(saved["tasks"].as_array().unwrap().len(), 4);
}

#[test]
fn corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");
    fs::write(&path, "{ not json").unwrap();

    let mut store = TaskStore::open(&path);
    assert!(store.is_empty());
    store.add(NewTask::new("Start over")).unwrap();
    assert_eq!(TaskStore::open(&path).len(), 1);

    // The unreadable contents are kept beside the new file
    let backups: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("tasks.json.corrupt-"))
        .collect();
    assert_eq!(backups.len(), 1);
    assert_eq!(fs::read_to_string(dir.path().join(&backups[0])).unwrap(), "{ not json");
}

#[test]
fn unreadable_due_date_keeps_other_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");
    fs::write(
        &path,
        r#"[
            {"id": 1, "title": "Keep me", "due_date": "2024-06-01", "created_at": "2024-05-30T10:00:00"},
            {"id": 2, "title": "Someday", "due_date": "next friday", "created_at": "2024-05-30T10:01:00"}
        ]"#,
    )
    .unwrap();

    let mut store = TaskStore::open(&path);
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(2).unwrap().due_date, None);
    assert_eq!(store.add(NewTask::new("new")).unwrap().id, 3);

    let reopened = TaskStore::open(&path);
    let titles: Vec<String> = reopened.list(None).into_iter().map(|t| t.title).collect();
    assert_eq!(titles, vec!["Keep me", "Someday", "new"]);
    assert_eq!(reopened.get(1).unwrap().due_date, Some(date(2024, 6, 1)));
}

#[test]
fn save_leaves_no_temporary_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");
    let mut store = TaskStore::open(&path);
    store.add(NewTask::new("Quiz")).unwrap();

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["tasks.json"]);
}

#[test]
fn upcoming_scenario_orders_by_date() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TaskStore::open(dir.path().join("tasks.json"));
    store
        .add(NewTask::new("Read ch.3").due(date(2024, 6, 2)).priority(Priority::High))
        .unwrap();
    store
        .add(NewTask::new("Essay draft").due(date(2024, 6, 1)).priority(Priority::Low))
        .unwrap();

    let titles: Vec<String> = store
        .upcoming_from(date(2024, 5, 31), 3)
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(titles, vec!["Essay draft", "Read ch.3"]);
}

#[test]
fn upcoming_window_skips_far_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TaskStore::open(dir.path().join("tasks.json"));
    let today = date(2024, 6, 1);
    for (title, days) in [("ten", 10), ("five", 5), ("two", 2)] {
        store
            .add(NewTask::new(title).due(today + chrono::Duration::days(days)))
            .unwrap();
    }

    let titles: Vec<String> = store.upcoming_from(today, 7).into_iter().map(|t| t.title).collect();
    assert_eq!(titles, vec!["two", "five"]);
}

#[test]
fn for_date_keeps_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TaskStore::open(dir.path().join("tasks.json"));
    let day = date(2024, 6, 1);
    store.add(NewTask::new("first").due(day)).unwrap();
    store.add(NewTask::new("other day").due(date(2024, 6, 2))).unwrap();
    store.add(NewTask::new("second").due(day).priority(Priority::Urgent)).unwrap();

    let titles: Vec<String> = store.for_date(day).into_iter().map(|t| t.title).collect();
    assert_eq!(titles, vec!["first", "second"]);
}
