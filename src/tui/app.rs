use crate::chat::ChatAssistant;
use crate::focus::FocusMode;
use crate::models::{NewTask, Priority, Task, TaskUpdate};
use crate::store::{self, TaskStore};
use crate::tui::error::TuiError;
use crate::tui::widgets::item_view::task_markdown;
use crate::{Config, utils};
use ratatui::widgets::ListState;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Tasks,
    Upcoming,
    Schedule,
    Focus,
    Chat,
}

impl Tab {
    pub const ALL: [Tab; 5] = [Tab::Tasks, Tab::Upcoming, Tab::Schedule, Tab::Focus, Tab::Chat];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Tasks => "Tasks",
            Tab::Upcoming => "Upcoming",
            Tab::Schedule => "Schedule",
            Tab::Focus => "Focus",
            Tab::Chat => "Chat",
        }
    }

    pub fn index(self) -> usize {
        Tab::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Help,
    Form,
    ChatInput,
    SiteInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Title,
    Description,
    Due,
    Priority,
}

impl TaskField {
    const ORDER: [TaskField; 4] = [TaskField::Title, TaskField::Description, TaskField::Due, TaskField::Priority];

    fn step(self, forward: bool) -> Self {
        let i = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        let len = Self::ORDER.len();
        let next = if forward { (i + 1) % len } else { (i + len - 1) % len };
        Self::ORDER[next]
    }
}

/// Add/edit form; `editing` holds the id of the task being changed
#[derive(Debug, Clone)]
pub struct TaskForm {
    pub editing: Option<u64>,
    pub title: String,
    pub description: String,
    pub due: String,
    pub priority: Priority,
    pub current_field: TaskField,
}

impl TaskForm {
    pub fn new() -> Self {
        Self {
            editing: None,
            title: String::new(),
            description: String::new(),
            due: String::new(),
            priority: Priority::default(),
            current_field: TaskField::Title,
        }
    }

    pub fn from_task(task: &Task) -> Self {
        Self {
            editing: Some(task.id),
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            due: task.due_date.map(|d| d.to_string()).unwrap_or_default(),
            priority: task.priority,
            current_field: TaskField::Title,
        }
    }

    pub fn next_field(&mut self) {
        self.current_field = self.current_field.step(true);
    }

    pub fn prev_field(&mut self) {
        self.current_field = self.current_field.step(false);
    }

    /// Text buffer of the focused field; None on the priority selector
    pub fn input_mut(&mut self) -> Option<&mut String> {
        match self.current_field {
            TaskField::Title => Some(&mut self.title),
            TaskField::Description => Some(&mut self.description),
            TaskField::Due => Some(&mut self.due),
            TaskField::Priority => None,
        }
    }

    fn parsed_due(&self) -> Result<Option<chrono::NaiveDate>, String> {
        if self.due.trim().is_empty() {
            return Ok(None);
        }
        store::validate_due_date(&self.due).map(Some).map_err(|e| e.to_string())
    }

    pub fn to_new_task(&self) -> Result<NewTask, String> {
        let mut new_task = NewTask::new(self.title.clone()).priority(self.priority);
        new_task.due_date = self.parsed_due()?;
        if !self.description.trim().is_empty() {
            new_task = new_task.description(self.description.trim());
        }
        Ok(new_task)
    }

    pub fn to_update(&self) -> Result<TaskUpdate, String> {
        Ok(TaskUpdate {
            title: Some(self.title.clone()),
            description: Some(Some(self.description.clone()).filter(|d| !d.trim().is_empty())),
            due_date: Some(self.parsed_due()?),
            priority: Some(self.priority),
        })
    }
}

impl Default for TaskForm {
    fn default() -> Self {
        Self::new()
    }
}

enum ChatJob {
    Ask { message: String, context: Value },
    Clear,
}

/// Runs the chat assistant on its own thread so slow replies never block drawing
pub struct ChatWorker {
    jobs: Sender<ChatJob>,
    replies: Receiver<String>,
}

impl ChatWorker {
    pub fn spawn(mut assistant: ChatAssistant) -> Self {
        let (job_tx, job_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        thread::spawn(move || {
            for job in job_rx {
                match job {
                    ChatJob::Ask { message, context } => {
                        let text = match assistant.get_detailed_response(&message, context) {
                            Ok(reply) => reply.to_markdown(),
                            Err(e) => e.user_message().to_string(),
                        };
                        if reply_tx.send(text).is_err() {
                            break;
                        }
                    }
                    ChatJob::Clear => assistant.clear_history(),
                }
            }
            tracing::debug!("chat worker stopped");
        });
        Self { jobs: job_tx, replies: reply_rx }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatEntry {
    pub speaker: Speaker,
    pub text: String,
}

pub struct ChatState {
    pub transcript: Vec<ChatEntry>,
    pub input: String,
    pub waiting: bool,
    pub backend_name: &'static str,
    pub scroll: usize,
    worker: ChatWorker,
}

impl ChatState {
    /// Transcript as one markdown document
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for entry in &self.transcript {
            match entry.speaker {
                Speaker::User => out.push_str(&format!("**You:** {}\n\n", entry.text)),
                Speaker::Assistant => out.push_str(&format!("{}\n\n---\n\n", entry.text.trim())),
            }
        }
        if self.waiting {
            out.push_str("*Thinking...*\n");
        }
        out
    }

    pub fn last_reply(&self) -> Option<&str> {
        self.transcript
            .iter()
            .rev()
            .find(|e| e.speaker == Speaker::Assistant)
            .map(|e| e.text.as_str())
    }
}

pub struct UiState {
    pub current_tab: Tab,
    pub mode: Mode,
    pub list_state: ListState,
    pub detail_scroll: usize,
}

pub struct ModalState {
    pub delete_confirmation: Option<Task>,
    /// 0 = Delete, 1 = Cancel
    pub delete_modal_selection: usize,
}

#[derive(Default)]
pub struct StatusState {
    pub message: Option<String>,
    pub message_time: Option<Instant>,
}

pub struct App {
    pub config: Config,
    pub config_path: PathBuf,
    pub store: TaskStore,
    pub focus: FocusMode,
    pub ui: UiState,
    pub form: Option<TaskForm>,
    pub modals: ModalState,
    pub status: StatusState,
    pub chat: ChatState,
    pub site_input: String,
}

impl App {
    pub fn new(
        config: Config,
        config_path: PathBuf,
        store: TaskStore,
        focus: FocusMode,
        assistant: ChatAssistant,
    ) -> Result<Self, TuiError> {
        // Reject bad bindings before the terminal switches to raw mode
        let bindings = &config.key_bindings;
        for binding in [
            &bindings.quit,
            &bindings.new,
            &bindings.edit,
            &bindings.delete,
            &bindings.list_up,
            &bindings.list_down,
            &bindings.tab_left,
            &bindings.tab_right,
            &bindings.help,
            &bindings.toggle_task_status,
            &bindings.focus_toggle,
            &bindings.yank,
        ] {
            utils::parse_key_binding(binding).map_err(TuiError::KeyBindingError)?;
        }

        let backend_name = assistant.backend_name();
        let mut list_state = ListState::default();
        if !store.is_empty() {
            list_state.select(Some(0));
        }

        Ok(Self {
            config,
            config_path,
            store,
            focus,
            ui: UiState {
                current_tab: Tab::Tasks,
                mode: Mode::Normal,
                list_state,
                detail_scroll: 0,
            },
            form: None,
            modals: ModalState {
                delete_confirmation: None,
                delete_modal_selection: 0,
            },
            status: StatusState::default(),
            chat: ChatState {
                transcript: Vec::new(),
                input: String::new(),
                waiting: false,
                backend_name,
                scroll: 0,
                worker: ChatWorker::spawn(assistant),
            },
            site_input: String::new(),
        })
    }

    pub fn set_status_message(&mut self, message: String) {
        self.status.message = Some(message);
        self.status.message_time = Some(Instant::now());
    }

    pub fn clear_status_message(&mut self) {
        self.status.message = None;
        self.status.message_time = None;
    }

    pub fn check_status_message_timeout(&mut self) {
        const STATUS_MESSAGE_TIMEOUT_SECS: u64 = 3;
        if let Some(time) = self.status.message_time {
            if time.elapsed().as_secs() >= STATUS_MESSAGE_TIMEOUT_SECS {
                self.clear_status_message();
            }
        }
    }

    /// Per-frame housekeeping: status timeout, focus expiry, chat replies
    pub fn tick(&mut self) {
        self.check_status_message_timeout();
        if self.focus.tick(utils::now()) {
            self.set_status_message("Focus session complete. Take a break!".to_string());
        }
        self.poll_chat();
    }

    pub fn switch_tab(&mut self, tab: Tab) {
        self.ui.current_tab = tab;
        self.ui.detail_scroll = 0;
        let len = self.list_len();
        self.ui.list_state.select(if len == 0 { None } else { Some(0) });
    }

    pub fn next_tab(&mut self) {
        let i = self.ui.current_tab.index();
        if i + 1 < Tab::ALL.len() {
            self.switch_tab(Tab::ALL[i + 1]);
        }
    }

    pub fn prev_tab(&mut self) {
        let i = self.ui.current_tab.index();
        if i > 0 {
            self.switch_tab(Tab::ALL[i - 1]);
        }
    }

    /// Tasks listed on the current tab
    pub fn visible_tasks(&self) -> Vec<Task> {
        let today = utils::today();
        match self.ui.current_tab {
            Tab::Tasks => self.store.list(None),
            Tab::Upcoming => {
                let mut tasks = self.store.today_tasks(today);
                tasks.extend(self.store.upcoming_from(today, self.config.schedule.upcoming_days));
                tasks
            }
            _ => Vec::new(),
        }
    }

    fn list_len(&self) -> usize {
        match self.ui.current_tab {
            Tab::Tasks | Tab::Upcoming => self.visible_tasks().len(),
            Tab::Focus => self.focus.sites().len(),
            Tab::Schedule | Tab::Chat => 0,
        }
    }

    pub fn move_selection(&mut self, down: bool) {
        let len = self.list_len();
        if len == 0 {
            self.ui.list_state.select(None);
            return;
        }
        let current = self.ui.list_state.selected().unwrap_or(0).min(len - 1);
        let next = if down { (current + 1).min(len - 1) } else { current.saturating_sub(1) };
        self.ui.list_state.select(Some(next));
        self.ui.detail_scroll = 0;
    }

    /// Keep the selection inside the list after it shrinks
    pub fn adjust_selected_index(&mut self) {
        let len = self.list_len();
        match self.ui.list_state.selected() {
            _ if len == 0 => self.ui.list_state.select(None),
            Some(i) if i >= len => self.ui.list_state.select(Some(len - 1)),
            None => self.ui.list_state.select(Some(0)),
            _ => {}
        }
    }

    pub fn selected_task(&self) -> Option<Task> {
        let index = self.ui.list_state.selected()?;
        self.visible_tasks().into_iter().nth(index)
    }

    pub fn selected_site(&self) -> Option<String> {
        let index = self.ui.list_state.selected()?;
        self.focus.sites().get(index).cloned()
    }

    fn warn_if_unsaved(&mut self) {
        if self.store.has_unsaved_changes() {
            self.set_status_message("Warning: changes could not be saved to disk".to_string());
        }
    }

    pub fn toggle_selected_task(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let message = if task.completed {
            self.store.reopen(task.id);
            format!("Reopened: {}", task.title)
        } else {
            self.store.complete(task.id);
            format!("Completed: {}", task.title)
        };
        self.set_status_message(message);
        self.adjust_selected_index();
        self.warn_if_unsaved();
    }

    pub fn start_create(&mut self) {
        self.form = Some(TaskForm::new());
        self.ui.mode = Mode::Form;
    }

    pub fn start_edit(&mut self) {
        if let Some(task) = self.selected_task() {
            self.form = Some(TaskForm::from_task(&task));
            self.ui.mode = Mode::Form;
        }
    }

    pub fn cancel_form(&mut self) {
        self.form = None;
        self.ui.mode = Mode::Normal;
    }

    /// Save the form; on a validation error the form stays open
    pub fn submit_form(&mut self) {
        let Some(form) = self.form.as_ref() else {
            return;
        };

        let result = match form.editing {
            None => form
                .to_new_task()
                .and_then(|new_task| self.store.add(new_task).map_err(|e| e.to_string()))
                .map(|task| format!("Task created: {}", task.title)),
            Some(id) => form.to_update().and_then(|update| match self.store.update(id, update) {
                Ok(true) => Ok("Task updated".to_string()),
                Ok(false) => Err(format!("Task {} no longer exists", id)),
                Err(e) => Err(e.to_string()),
            }),
        };

        match result {
            Ok(message) => {
                self.cancel_form();
                self.adjust_selected_index();
                self.set_status_message(message);
                self.warn_if_unsaved();
            }
            Err(e) => self.set_status_message(e),
        }
    }

    pub fn request_delete(&mut self) {
        if let Some(task) = self.selected_task() {
            self.modals.delete_confirmation = Some(task);
            self.modals.delete_modal_selection = 0;
        }
    }

    pub fn confirm_delete(&mut self) {
        let Some(task) = self.modals.delete_confirmation.take() else {
            return;
        };
        if self.modals.delete_modal_selection != 0 {
            return;
        }
        if self.store.delete(task.id) {
            self.adjust_selected_index();
            self.set_status_message("Task deleted".to_string());
            self.warn_if_unsaved();
        } else {
            self.set_status_message(format!("Task {} not found", task.id));
        }
    }

    pub fn toggle_focus(&mut self) {
        let now = utils::now();
        if !self.focus.is_available() {
            self.set_status_message("Focus mode is disabled in the config".to_string());
        } else if self.focus.end(now) {
            self.set_status_message("Focus session ended".to_string());
        } else if self.focus.start(self.config.focus.default_minutes, now) {
            self.set_status_message(format!("Focus session started: {} minutes", self.config.focus.default_minutes));
        } else {
            self.set_status_message("Could not start a focus session".to_string());
        }
    }

    fn save_blocked_sites(&mut self) {
        self.config.focus.blocked_sites = self.focus.sites().to_vec();
        if let Err(e) = Config::save_blocked_sites(&self.config_path, self.focus.sites()) {
            tracing::error!("failed to save blocked sites: {e}");
            self.set_status_message(format!("Failed to save config: {}", e));
        }
    }

    pub fn submit_site(&mut self) {
        let input = std::mem::take(&mut self.site_input);
        self.ui.mode = Mode::Normal;
        if self.focus.add_site(&input) {
            self.set_status_message(format!("Blocked {}", input.trim()));
            self.save_blocked_sites();
            self.adjust_selected_index();
        } else if !input.trim().is_empty() {
            self.set_status_message(format!("'{}' is invalid or already blocked", input.trim()));
        }
    }

    pub fn remove_selected_site(&mut self) {
        let Some(site) = self.selected_site() else {
            return;
        };
        if self.focus.remove_site(&site) {
            self.set_status_message(format!("Unblocked {}", site));
            self.save_blocked_sites();
            self.adjust_selected_index();
        }
    }

    fn chat_context(&self) -> Value {
        let today = utils::today();
        let stats = self.store.stats(today);
        json!({
            "source": "tui",
            "date": today.to_string(),
            "pending_tasks": stats.pending,
            "overdue_tasks": stats.overdue,
            "focus_active": self.focus.is_active(utils::now()),
        })
    }

    pub fn send_chat(&mut self) {
        let message = self.chat.input.trim().to_string();
        if message.is_empty() || self.chat.waiting {
            return;
        }
        self.chat.input.clear();
        let job = ChatJob::Ask { message: message.clone(), context: self.chat_context() };
        if self.chat.worker.jobs.send(job).is_err() {
            self.set_status_message("Chat assistant is not running".to_string());
            return;
        }
        self.chat.transcript.push(ChatEntry { speaker: Speaker::User, text: message });
        self.chat.waiting = true;
        self.chat.scroll = usize::MAX;
    }

    pub fn poll_chat(&mut self) {
        match self.chat.worker.replies.try_recv() {
            Ok(text) => {
                self.chat.transcript.push(ChatEntry { speaker: Speaker::Assistant, text });
                self.chat.waiting = false;
                self.chat.scroll = usize::MAX;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                if self.chat.waiting {
                    self.chat.waiting = false;
                    self.set_status_message("Chat assistant stopped".to_string());
                }
            }
        }
    }

    pub fn clear_chat(&mut self) {
        if self.chat.worker.jobs.send(ChatJob::Clear).is_ok() {
            self.chat.transcript.clear();
            self.chat.scroll = 0;
            self.set_status_message("Conversation cleared".to_string());
        }
    }

    /// Copy the latest assistant reply, or the selected task, to the clipboard
    pub fn yank(&mut self) {
        let text = match self.ui.current_tab {
            Tab::Chat => self.chat.last_reply().map(str::to_string),
            _ => self.selected_task().map(|t| task_markdown(&t, utils::today())),
        };
        let Some(text) = text else {
            return;
        };
        match arboard::Clipboard::new() {
            Ok(mut clipboard) => match clipboard.set_text(text) {
                Ok(()) => self.set_status_message("Copied to clipboard".to_string()),
                Err(e) => self.set_status_message(format!("Failed to copy to clipboard: {}", e)),
            },
            Err(_) => self.set_status_message("Failed to access clipboard".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::OfflineBackend;
    use crate::focus::LogOnlyBlocker;
    use std::time::Duration;

    fn app() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::open(dir.path().join("tasks.json"));
        let focus = FocusMode::new(true, &[], Box::new(LogOnlyBlocker));
        let assistant = ChatAssistant::new(Box::new(OfflineBackend), 10);
        let app = App::new(Config::default(), dir.path().join("config.toml"), store, focus, assistant).unwrap();
        (dir, app)
    }

    #[test]
    fn form_creates_and_edits_tasks() {
        let (_dir, mut app) = app();
        app.start_create();
        let form = app.form.as_mut().unwrap();
        form.title.push_str("Read chapter 3");
        form.due.push_str("2030-01-15");
        form.priority = Priority::High;
        app.submit_form();
        assert_eq!(app.ui.mode, Mode::Normal);
        assert_eq!(app.store.len(), 1);

        app.ui.list_state.select(Some(0));
        app.start_edit();
        app.form.as_mut().unwrap().due.clear();
        app.submit_form();
        let task = app.store.get(1).unwrap();
        assert_eq!(task.due_date, None);
        assert_eq!(task.priority, Priority::High);
    }

    #[test]
    fn invalid_form_stays_open() {
        let (_dir, mut app) = app();
        app.start_create();
        let form = app.form.as_mut().unwrap();
        form.title.push_str("Essay");
        form.due.push_str("tomorrow");
        app.submit_form();
        assert_eq!(app.ui.mode, Mode::Form);
        assert!(app.status.message.as_deref().unwrap().contains("invalid due date"));
        assert!(app.store.is_empty());
    }

    #[test]
    fn delete_requires_confirmation() {
        let (_dir, mut app) = app();
        app.store.add(NewTask::new("Essay")).unwrap();
        app.ui.list_state.select(Some(0));

        app.request_delete();
        app.modals.delete_modal_selection = 1;
        app.confirm_delete();
        assert_eq!(app.store.len(), 1);

        app.request_delete();
        app.confirm_delete();
        assert!(app.store.is_empty());
        assert_eq!(app.ui.list_state.selected(), None);
    }

    #[test]
    fn tabs_stop_at_the_ends() {
        let (_dir, mut app) = app();
        app.prev_tab();
        assert_eq!(app.ui.current_tab, Tab::Tasks);
        for _ in 0..10 {
            app.next_tab();
        }
        assert_eq!(app.ui.current_tab, Tab::Chat);
    }

    #[test]
    fn sites_are_saved_to_config() {
        let (_dir, mut app) = app();
        app.switch_tab(Tab::Focus);
        app.site_input = "https://www.example.com/page".to_string();
        app.submit_site();
        assert_eq!(app.focus.sites(), ["example.com"]);
        let saved = Config::load_from_path(&app.config_path).unwrap();
        assert!(saved.focus.blocked_sites.contains(&"example.com".to_string()));
    }

    #[test]
    fn chat_reply_arrives_from_worker() {
        let (_dir, mut app) = app();
        app.chat.input = "any study tips?".to_string();
        app.send_chat();
        assert!(app.chat.waiting);

        for _ in 0..200 {
            app.poll_chat();
            if !app.chat.waiting {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!app.chat.waiting);
        assert!(app.chat.last_reply().unwrap().contains("Pomodoro"));
    }
}
