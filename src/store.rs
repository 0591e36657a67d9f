use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{NewTask, ScheduleSlot, Task, TaskStats, TaskUpdate};
use crate::utils;

/// Number of pending tasks `suggest_schedule` looks at
pub const MAX_SUGGESTED_TASKS: usize = 5;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Failed to write task file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode tasks: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    next_id: u64,
    tasks: &'a [Task],
}

#[derive(Deserialize)]
struct StoreFile {
    next_id: u64,
    tasks: Vec<Task>,
}

/// Either the current `{next_id, tasks}` document or a bare task array
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTasks {
    Current(StoreFile),
    Legacy(Vec<Task>),
}

/// JSON-file backed task collection. Every mutation is written through to disk.
pub struct TaskStore {
    path: PathBuf,
    tasks: Vec<Task>,
    next_id: u64,
    unsaved: bool,
}

impl TaskStore {
    /// Open the store at `path`. A missing file is an empty store; an unreadable
    /// or corrupt one is logged and also treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (tasks, next_id) = match Self::read_file(&path) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => (Vec::new(), 1),
            Err(e) => {
                tracing::error!(path = %path.display(), "error loading tasks, starting empty: {e}");
                Self::set_aside(&path);
                (Vec::new(), 1)
            }
        };
        tracing::info!(count = tasks.len(), path = %path.display(), "task store opened");

        Self {
            path,
            tasks,
            next_id,
            unsaved: false,
        }
    }

    fn read_file(path: &Path) -> Result<Option<(Vec<Task>, u64)>, String> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path).map_err(|e| e.to_string())?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        let stored: StoredTasks = serde_json::from_str(&contents).map_err(|e| e.to_string())?;
        let (tasks, stored_next) = match stored {
            StoredTasks::Current(file) => (file.tasks, file.next_id),
            StoredTasks::Legacy(tasks) => (tasks, 1),
        };
        Ok(Some(Self::dedupe_ids(tasks, stored_next)))
    }

    /// Move an unreadable file out of the way so the next save cannot overwrite it
    fn set_aside(path: &Path) {
        if !path.is_file() {
            return;
        }
        let stamp = utils::now().format("%Y%m%d%H%M%S");
        let backup = sibling_path(path, &format!("corrupt-{stamp}"));
        match fs::rename(path, &backup) {
            Ok(()) => tracing::warn!(backup = %backup.display(), "unreadable task file kept as backup"),
            Err(e) => tracing::error!(path = %path.display(), "could not back up unreadable task file: {e}"),
        }
    }

    /// Older files could hold repeated ids; give repeats fresh ones
    fn dedupe_ids(mut tasks: Vec<Task>, stored_next: u64) -> (Vec<Task>, u64) {
        let max_id = tasks.iter().map(|t| t.id).max().unwrap_or(0);
        let mut next_id = stored_next.max(max_id + 1);
        let mut seen = HashSet::new();
        for task in &mut tasks {
            if !seen.insert(task.id) {
                tracing::warn!(old_id = task.id, new_id = next_id, "duplicate task id reassigned");
                task.id = next_id;
                seen.insert(next_id);
                next_id += 1;
            }
        }
        (tasks, next_id)
    }

    /// Write the collection to disk
    pub fn save(&mut self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let document = StoreFileRef {
            next_id: self.next_id,
            tasks: &self.tasks,
        };
        let json = serde_json::to_string_pretty(&document)?;
        // Write then rename so a crash never leaves a half-written file
        let tmp = sibling_path(&self.path, "tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        self.unsaved = false;
        Ok(())
    }

    // Save failures leave memory authoritative; they are logged and flagged.
    fn persist(&mut self) {
        match self.save() {
            Ok(()) => tracing::debug!(count = self.tasks.len(), "tasks saved"),
            Err(e) => {
                self.unsaved = true;
                tracing::error!(path = %self.path.display(), "error saving tasks: {e}");
            }
        }
    }

    /// True when the last write to disk failed
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn add(&mut self, new_task: NewTask) -> Result<Task, StoreError> {
        let title = validate_title(&new_task.title)?;

        let task = Task {
            id: self.next_id,
            title,
            description: new_task.description.filter(|d| !d.trim().is_empty()),
            due_date: new_task.due_date,
            priority: new_task.priority.unwrap_or_default(),
            completed: false,
            created_at: utils::now(),
            completed_at: None,
        };
        self.next_id += 1;
        self.tasks.push(task.clone());
        self.persist();

        tracing::info!(id = task.id, title = %task.title, "added task");
        Ok(task)
    }

    /// All tasks, or only those matching `completed`, in insertion order
    pub fn list(&self, completed: Option<bool>) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| completed.is_none_or(|c| t.completed == c))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: u64) -> Option<Task> {
        self.tasks.iter().find(|t| t.id == id).cloned()
    }

    /// Mark a task complete. Completing an already-completed task keeps its
    /// original `completed_at`. Returns false for an unknown id.
    pub fn complete(&mut self, id: u64) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        if task.completed {
            return true;
        }
        task.completed = true;
        task.completed_at = Some(utils::now());
        let title = task.title.clone();
        self.persist();
        tracing::info!(id, %title, "completed task");
        true
    }

    /// Mark a task pending again, clearing `completed_at`
    pub fn reopen(&mut self, id: u64) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        if !task.completed {
            return true;
        }
        task.completed = false;
        task.completed_at = None;
        self.persist();
        tracing::info!(id, "reopened task");
        true
    }

    /// Apply field edits. Returns Ok(false) for an unknown id.
    pub fn update(&mut self, id: u64, update: TaskUpdate) -> Result<bool, StoreError> {
        let title = update.title.as_deref().map(validate_title).transpose()?;

        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(false);
        };
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = update.description {
            task.description = description.filter(|d| !d.trim().is_empty());
        }
        if let Some(due_date) = update.due_date {
            task.due_date = due_date;
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        self.persist();
        tracing::info!(id, "updated task");
        Ok(true)
    }

    pub fn delete(&mut self, id: u64) -> bool {
        let Some(index) = self.tasks.iter().position(|t| t.id == id) else {
            return false;
        };
        let removed = self.tasks.remove(index);
        self.persist();
        tracing::info!(id, title = %removed.title, "deleted task");
        true
    }

    /// Tasks due on `date`, in store order
    pub fn for_date(&self, date: NaiveDate) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| t.due_date == Some(date))
            .cloned()
            .collect()
    }

    /// Pending tasks due on `today`
    pub fn today_tasks(&self, today: NaiveDate) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| !t.completed && t.due_date == Some(today))
            .cloned()
            .collect()
    }

    pub fn upcoming(&self, days: u32) -> Vec<Task> {
        self.upcoming_from(utils::today(), days)
    }

    /// Pending tasks due in `(today, today + days]`, by due date then urgency.
    /// The sort is stable so equal keys keep store order.
    pub fn upcoming_from(&self, today: NaiveDate, days: u32) -> Vec<Task> {
        let end = today + Duration::days(i64::from(days));
        let mut upcoming: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| !t.completed)
            .filter(|t| t.due_date.is_some_and(|due| due > today && due <= end))
            .cloned()
            .collect();
        upcoming.sort_by_key(|t| (t.due_date, Reverse(t.priority.urgency())));
        upcoming
    }

    /// Monday through Sunday of the week containing `today`, each with its tasks
    pub fn weekly_schedule(&self, today: NaiveDate) -> BTreeMap<NaiveDate, Vec<Task>> {
        let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        (0..7)
            .map(|offset| {
                let day = monday + Duration::days(offset);
                (day, self.for_date(day))
            })
            .collect()
    }

    pub fn suggest_schedule(&self, slot_minutes: u32, gap_minutes: u32) -> Vec<ScheduleSlot> {
        self.suggest_schedule_at(utils::now(), slot_minutes, gap_minutes)
    }

    /// Back-to-back study slots for the first few pending tasks, starting at `now`.
    /// Priority and due dates are not considered.
    pub fn suggest_schedule_at(
        &self,
        now: NaiveDateTime,
        slot_minutes: u32,
        gap_minutes: u32,
    ) -> Vec<ScheduleSlot> {
        let step = Duration::minutes(i64::from(slot_minutes) + i64::from(gap_minutes));
        let mut start = now;
        self.tasks
            .iter()
            .filter(|t| !t.completed)
            .take(MAX_SUGGESTED_TASKS)
            .map(|task| {
                let slot = ScheduleSlot {
                    task: task.clone(),
                    suggested_start: start,
                    duration_minutes: slot_minutes,
                };
                start += step;
                slot
            })
            .collect()
    }

    pub fn stats(&self, today: NaiveDate) -> TaskStats {
        let completed = self.tasks.iter().filter(|t| t.completed).count();
        TaskStats {
            total: self.tasks.len(),
            completed,
            pending: self.tasks.len() - completed,
            overdue: self.tasks.iter().filter(|t| t.is_overdue(today)).count(),
            due_today: self.today_tasks(today).len(),
        }
    }
}

fn validate_title(title: &str) -> Result<String, StoreError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(StoreError::Validation("task title must not be empty".to_string()));
    }
    Ok(title.to_string())
}

/// `tasks.json` -> `tasks.json.<suffix>`, in the same directory
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{suffix}"));
    path.with_file_name(name)
}

/// Parse user-supplied due date text
pub fn validate_due_date(text: &str) -> Result<NaiveDate, StoreError> {
    utils::parse_date(text).map_err(|e| {
        StoreError::Validation(format!("invalid due date '{}' (expected YYYY-MM-DD): {}", text.trim(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn temp_store() -> (tempfile::TempDir, TaskStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::open(dir.path().join("tasks.json"));
        (dir, store)
    }

    #[test]
    fn blank_title_is_a_validation_error() {
        let (_dir, mut store) = temp_store();
        let err = store.add(NewTask::new("   ")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn add_assigns_fresh_ids_after_delete() {
        let (_dir, mut store) = temp_store();
        let a = store.add(NewTask::new("a")).unwrap();
        let b = store.add(NewTask::new("b")).unwrap();
        assert!(store.delete(b.id));
        let c = store.add(NewTask::new("c")).unwrap();
        assert_ne!(c.id, a.id);
        assert_ne!(c.id, b.id);
    }

    #[test]
    fn add_defaults() {
        let (_dir, mut store) = temp_store();
        let task = store.add(NewTask::new("  Read ch.3  ")).unwrap();
        assert_eq!(task.title, "Read ch.3");
        assert_eq!(task.priority, Priority::Medium);
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn complete_is_idempotent_and_keeps_timestamp() {
        let (_dir, mut store) = temp_store();
        let task = store.add(NewTask::new("a")).unwrap();
        assert!(store.complete(task.id));
        let first = store.get(task.id).unwrap().completed_at;
        assert!(first.is_some());
        assert!(store.complete(task.id));
        assert_eq!(store.get(task.id).unwrap().completed_at, first);
        assert!(!store.complete(999));
    }

    #[test]
    fn reopen_clears_completion() {
        let (_dir, mut store) = temp_store();
        let task = store.add(NewTask::new("a")).unwrap();
        store.complete(task.id);
        assert!(store.reopen(task.id));
        let task = store.get(task.id).unwrap();
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn update_edits_fields_and_validates_title() {
        let (_dir, mut store) = temp_store();
        let task = store.add(NewTask::new("a").due(date(2024, 6, 1))).unwrap();

        let edited = store
            .update(task.id, TaskUpdate {
                title: Some("b".to_string()),
                due_date: Some(None),
                priority: Some(Priority::Urgent),
                ..Default::default()
            })
            .unwrap();
        assert!(edited);
        let task = store.get(task.id).unwrap();
        assert_eq!(task.title, "b");
        assert_eq!(task.due_date, None);
        assert_eq!(task.priority, Priority::Urgent);

        let err = store
            .update(task.id, TaskUpdate { title: Some(" ".to_string()), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(!store.update(42, TaskUpdate::default()).unwrap());
    }

    #[test]
    fn upcoming_orders_by_date_then_urgency() {
        let (_dir, mut store) = temp_store();
        let today = date(2024, 5, 31);
        store.add(NewTask::new("low tomorrow").due(date(2024, 6, 1)).priority(Priority::Low)).unwrap();
        store.add(NewTask::new("today").due(today)).unwrap();
        store.add(NewTask::new("urgent tomorrow").due(date(2024, 6, 1)).priority(Priority::Urgent)).unwrap();
        store.add(NewTask::new("medium tomorrow").due(date(2024, 6, 1))).unwrap();
        store.add(NewTask::new("second medium tomorrow").due(date(2024, 6, 1))).unwrap();
        let done = store.add(NewTask::new("done").due(date(2024, 6, 2))).unwrap();
        store.complete(done.id);
        store.add(NewTask::new("too far").due(date(2024, 6, 4))).unwrap();

        let titles: Vec<String> = store
            .upcoming_from(today, 3)
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(
            titles,
            vec!["urgent tomorrow", "medium tomorrow", "second medium tomorrow", "low tomorrow"]
        );
    }

    #[test]
    fn upcoming_includes_last_day_of_window() {
        let (_dir, mut store) = temp_store();
        let today = date(2024, 5, 31);
        store.add(NewTask::new("edge").due(date(2024, 6, 7))).unwrap();
        assert_eq!(store.upcoming_from(today, 7).len(), 1);
        assert!(store.upcoming_from(today, 6).is_empty());
    }

    #[test]
    fn weekly_schedule_starts_on_monday() {
        let (_dir, mut store) = temp_store();
        // 2024-06-05 is a Wednesday
        store.add(NewTask::new("mon").due(date(2024, 6, 3))).unwrap();
        store.add(NewTask::new("next mon").due(date(2024, 6, 10))).unwrap();
        let week = store.weekly_schedule(date(2024, 6, 5));
        assert_eq!(week.len(), 7);
        assert_eq!(week.keys().next(), Some(&date(2024, 6, 3)));
        assert_eq!(week.keys().last(), Some(&date(2024, 6, 9)));
        assert_eq!(week[&date(2024, 6, 3)].len(), 1);
    }

    #[test]
    fn stats_counts_overdue_and_today() {
        let (_dir, mut store) = temp_store();
        let today = date(2024, 6, 5);
        store.add(NewTask::new("late").due(date(2024, 6, 1))).unwrap();
        store.add(NewTask::new("now").due(today)).unwrap();
        let done = store.add(NewTask::new("late but done").due(date(2024, 6, 1))).unwrap();
        store.complete(done.id);

        let stats = store.stats(today);
        assert_eq!(stats, TaskStats { total: 3, completed: 1, pending: 2, overdue: 1, due_today: 1 });
    }

    #[test]
    fn delete_removes_exactly_one_task() {
        let (_dir, mut store) = temp_store();
        for title in ["a", "b", "c"] {
            store.add(NewTask::new(title)).unwrap();
        }
        assert!(store.delete(2));
        assert_eq!(store.len(), 2);
        assert!(store.get(2).is_none());

        let before = store.list(None);
        assert!(!store.delete(2));
        assert!(!store.delete(99));
        assert_eq!(store.list(None), before);
    }

    #[test]
    fn suggested_slots_follow_store_order() {
        let (_dir, mut store) = temp_store();
        for i in 1..=7 {
            store
                .add(NewTask::new(format!("task {i}")).priority(Priority::Low))
                .unwrap();
        }
        store.add(NewTask::new("urgent last").priority(Priority::Urgent)).unwrap();
        assert!(store.complete(2));

        let now = date(2024, 6, 1).and_hms_opt(9, 0, 0).unwrap();
        let slots = store.suggest_schedule_at(now, 30, 15);

        assert_eq!(slots.len(), MAX_SUGGESTED_TASKS);
        let titles: Vec<&str> = slots.iter().map(|s| s.task.title.as_str()).collect();
        assert_eq!(titles, vec!["task 1", "task 3", "task 4", "task 5", "task 6"]);
        for (i, slot) in slots.iter().enumerate() {
            assert_eq!(slot.suggested_start, now + Duration::minutes(45 * i as i64));
            assert_eq!(slot.duration_minutes, 30);
        }
    }

    #[test]
    fn suggested_slots_use_custom_lengths() {
        let (_dir, mut store) = temp_store();
        store.add(NewTask::new("a")).unwrap();
        store.add(NewTask::new("b")).unwrap();
        let now = date(2024, 6, 1).and_hms_opt(20, 0, 0).unwrap();

        let slots = store.suggest_schedule_at(now, 50, 10);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].suggested_start, now + Duration::hours(1));
        assert_eq!(slots[1].duration_minutes, 50);

        assert!(temp_store().1.suggest_schedule_at(now, 30, 15).is_empty());
    }

    #[test]
    fn save_failure_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every write fail
        let path = dir.path().join("tasks.json");
        fs::create_dir(&path).unwrap();
        let mut store = TaskStore::open(&path);

        let task = store.add(NewTask::new("kept in memory")).unwrap();
        assert!(store.has_unsaved_changes());
        assert_eq!(store.get(task.id).unwrap().title, "kept in memory");
    }
}
