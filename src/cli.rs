use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::chat::{ChatAssistant, ChatError};
use crate::config::{Config, ConfigError};
use crate::focus::{self, FocusMode};
use crate::models::{NewTask, Priority, Task, TaskUpdate};
use crate::store::{self, StoreError, TaskStore};
use crate::utils;
use crate::voice::{self, VoiceAssistant, VoiceOutcome, VoiceSession};

#[derive(Parser)]
#[command(name = "study")]
#[command(about = "Study Helper - tasks, schedule, focus sessions and a study assistant in the terminal")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/data)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch interactive TUI (default if no subcommand)
    Tui,
    /// Add a study task
    Add {
        /// Task title
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// low, medium, high or urgent
        #[arg(short, long)]
        priority: Option<String>,
    },
    /// List tasks
    List {
        /// Only completed tasks
        #[arg(long, conflicts_with = "pending")]
        done: bool,
        /// Only pending tasks
        #[arg(long)]
        pending: bool,
    },
    /// Mark a task as done
    Done { id: u64 },
    /// Mark a completed task as pending again
    Reopen { id: u64 },
    /// Change fields of a task
    Edit(EditArgs),
    /// Delete a task
    Delete { id: u64 },
    /// Pending tasks due today
    Today,
    /// Tasks due on a date (YYYY-MM-DD)
    On { date: String },
    /// Pending tasks due in the next few days
    Upcoming {
        #[arg(long)]
        days: Option<u32>,
    },
    /// Tasks due this week, Monday to Sunday
    Week,
    /// Suggested study slots for pending tasks, starting now
    Schedule {
        /// Slot length in minutes
        #[arg(long)]
        slot: Option<u32>,
        /// Break between slots in minutes
        #[arg(long)]
        gap: Option<u32>,
    },
    /// Task statistics
    Stats,
    /// Ask the study assistant; without a message starts an interactive chat
    Chat { message: Vec<String> },
    /// Focus sessions and the distracting-site list
    Focus {
        #[command(subcommand)]
        action: FocusAction,
    },
    /// Voice command loop (typed input stands in for speech)
    Voice,
}

#[derive(Args)]
pub struct EditArgs {
    pub id: u64,
    #[arg(long)]
    pub title: Option<String>,
    /// New description; an empty string clears it
    #[arg(short, long)]
    pub description: Option<String>,
    /// New due date (YYYY-MM-DD); "none" clears it
    #[arg(long)]
    pub due: Option<String>,
    #[arg(short, long)]
    pub priority: Option<String>,
}

#[derive(Subcommand)]
pub enum FocusAction {
    /// Run a focus session in the foreground
    Start {
        #[arg(short, long)]
        minutes: Option<u32>,
    },
    /// Show the blocked-site list
    Sites,
    /// Add a site to the list
    Block { domain: String },
    /// Remove a site from the list
    Unblock { domain: String },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Chat error: {0}")]
    ChatError(#[from] ChatError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Invalid priority '{0}' (expected low, medium, high or urgent)")]
    PriorityError(String),
    #[error("Task {0} not found")]
    NotFound(u64),
    #[error("Focus mode is disabled in the config")]
    FocusDisabled,
    #[error("{0}")]
    InvalidInput(String),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

fn parse_due(due: &str) -> Result<NaiveDate, CliError> {
    utils::parse_date(due).map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", due, e)))
}

fn parse_priority(priority: &str) -> Result<Priority, CliError> {
    priority.parse().map_err(|_| CliError::PriorityError(priority.to_string()))
}

fn ensure_saved(store: &TaskStore) {
    if store.has_unsaved_changes() {
        eprintln!("Warning: changes could not be written to {}", store.path().display());
    }
}

fn format_task(task: &Task, today: NaiveDate) -> String {
    let mark = if task.completed { "x" } else { " " };
    let due = match task.due_date {
        Some(date) if task.is_overdue(today) => format!("  due {} (overdue)", date),
        Some(date) => format!("  due {}", date),
        None => String::new(),
    };
    format!("[{}] {:>3}  {}  ({}){}", mark, task.id, task.title, task.priority, due)
}

fn print_tasks(tasks: &[Task], empty: &str) {
    if tasks.is_empty() {
        println!("{}", empty);
        return;
    }
    let today = utils::today();
    for task in tasks {
        println!("{}", format_task(task, today));
    }
}

/// Handle the add command
pub fn handle_add(
    title: String,
    description: Option<String>,
    due: Option<String>,
    priority: Option<String>,
    store: &mut TaskStore,
) -> Result<(), CliError> {
    let mut new_task = NewTask::new(title);
    new_task.description = description;
    new_task.due_date = due.as_deref().map(parse_due).transpose()?;
    new_task.priority = priority.as_deref().map(parse_priority).transpose()?;

    let task = store.add(new_task)?;
    println!("Task created successfully (ID: {})", task.id);
    ensure_saved(store);
    Ok(())
}

pub fn handle_list(done: bool, pending: bool, store: &TaskStore) -> Result<(), CliError> {
    let filter = match (done, pending) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    print_tasks(&store.list(filter), "No tasks.");
    Ok(())
}

pub fn handle_done(id: u64, store: &mut TaskStore) -> Result<(), CliError> {
    if !store.complete(id) {
        return Err(CliError::NotFound(id));
    }
    println!("Task {} marked as done", id);
    ensure_saved(store);
    Ok(())
}

pub fn handle_reopen(id: u64, store: &mut TaskStore) -> Result<(), CliError> {
    if !store.reopen(id) {
        return Err(CliError::NotFound(id));
    }
    println!("Task {} reopened", id);
    ensure_saved(store);
    Ok(())
}

pub fn handle_edit(args: EditArgs, store: &mut TaskStore) -> Result<(), CliError> {
    let update = TaskUpdate {
        title: args.title,
        description: args
            .description
            .map(|d| Some(d).filter(|d| !d.trim().is_empty())),
        due_date: match args.due.as_deref() {
            None => None,
            Some(d) if d.trim().is_empty() || d.trim().eq_ignore_ascii_case("none") => Some(None),
            Some(d) => Some(Some(parse_due(d)?)),
        },
        priority: args.priority.as_deref().map(parse_priority).transpose()?,
    };
    if update.is_empty() {
        return Err(CliError::InvalidInput("Nothing to change; pass --title, --description, --due or --priority".to_string()));
    }
    if !store.update(args.id, update)? {
        return Err(CliError::NotFound(args.id));
    }
    println!("Task {} updated", args.id);
    ensure_saved(store);
    Ok(())
}

pub fn handle_delete(id: u64, store: &mut TaskStore) -> Result<(), CliError> {
    if !store.delete(id) {
        return Err(CliError::NotFound(id));
    }
    println!("Task {} deleted", id);
    ensure_saved(store);
    Ok(())
}

pub fn handle_today(store: &TaskStore) -> Result<(), CliError> {
    print_tasks(&store.today_tasks(utils::today()), "Nothing due today.");
    Ok(())
}

pub fn handle_on(date: &str, store: &TaskStore) -> Result<(), CliError> {
    let date = store::validate_due_date(date)?;
    print_tasks(&store.for_date(date), &format!("Nothing due on {}.", date));
    Ok(())
}

pub fn handle_upcoming(days: u32, store: &TaskStore) -> Result<(), CliError> {
    print_tasks(&store.upcoming(days), &format!("Nothing due in the next {} days.", days));
    Ok(())
}

pub fn handle_week(store: &TaskStore) -> Result<(), CliError> {
    let today = utils::today();
    for (date, tasks) in store.weekly_schedule(today) {
        let marker = if date == today { " (today)" } else { "" };
        println!("{}{}", date.format("%A %Y-%m-%d"), marker);
        if tasks.is_empty() {
            println!("    -");
        }
        for task in &tasks {
            println!("    {}", format_task(task, today));
        }
    }
    Ok(())
}

pub fn handle_schedule(slot: u32, gap: u32, store: &TaskStore) -> Result<(), CliError> {
    if slot == 0 {
        return Err(CliError::InvalidInput("Slot length must be at least one minute".to_string()));
    }
    let slots = store.suggest_schedule(slot, gap);
    if slots.is_empty() {
        println!("No pending tasks to schedule.");
    }
    for s in slots {
        let end = s.suggested_start + chrono::Duration::minutes(i64::from(s.duration_minutes));
        println!(
            "{} - {}  {} ({})",
            s.suggested_start.format("%H:%M"),
            end.format("%H:%M"),
            s.task.title,
            s.task.priority
        );
    }
    Ok(())
}

pub fn handle_stats(store: &TaskStore) -> Result<(), CliError> {
    let stats = store.stats(utils::today());
    println!("Total:     {}", stats.total);
    println!("Completed: {}", stats.completed);
    println!("Pending:   {}", stats.pending);
    println!("Overdue:   {}", stats.overdue);
    println!("Due today: {}", stats.due_today);
    Ok(())
}

fn chat_context(store: &TaskStore) -> serde_json::Value {
    let today = utils::today();
    let stats = store.stats(today);
    let upcoming: Vec<String> = store.upcoming_from(today, 7).into_iter().map(|t| t.title).collect();
    json!({
        "source": "cli",
        "date": today.to_string(),
        "pending_tasks": stats.pending,
        "overdue_tasks": stats.overdue,
        "upcoming_tasks": upcoming,
    })
}

fn print_reply(assistant: &mut ChatAssistant, message: &str, store: &TaskStore) {
    let markdown = match assistant.get_detailed_response(message, chat_context(store)) {
        Ok(reply) => reply.to_markdown(),
        Err(e) => e.user_message().to_string(),
    };
    termimad::print_text(&markdown);
}

/// One question, or an interactive session until "exit" or end of input
pub fn handle_chat(message: Vec<String>, assistant: &mut ChatAssistant, store: &TaskStore) -> Result<(), CliError> {
    let message = message.join(" ");
    if !message.trim().is_empty() {
        print_reply(assistant, &message, store);
        return Ok(());
    }

    println!("Study assistant ({}). Type \"exit\" to leave, \"clear\" to forget the conversation.", assistant.backend_name());
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match line.trim() {
            "" => continue,
            "exit" | "quit" => break,
            "clear" => {
                assistant.clear_history();
                println!("Conversation cleared.");
            }
            text => print_reply(assistant, text, store),
        }
    }
    Ok(())
}

pub fn handle_focus(action: FocusAction, config: &mut Config, config_path: &Path, focus: &mut FocusMode) -> Result<(), CliError> {
    match action {
        FocusAction::Start { minutes } => {
            let minutes = minutes.unwrap_or(config.focus.default_minutes);
            run_focus_session(focus, minutes)
        }
        FocusAction::Sites => {
            if focus.sites().is_empty() {
                println!("No blocked sites.");
            }
            for site in focus.sites() {
                println!("{}", site);
            }
            Ok(())
        }
        FocusAction::Block { domain } => {
            if !focus.add_site(&domain) {
                return Err(CliError::InvalidInput(format!("'{}' is blank, invalid or already blocked", domain)));
            }
            config.focus.blocked_sites = focus.sites().to_vec();
            Config::save_blocked_sites(config_path, focus.sites())?;
            println!("Blocked {}", domain.trim());
            Ok(())
        }
        FocusAction::Unblock { domain } => {
            if !focus.remove_site(&domain) {
                return Err(CliError::InvalidInput(format!("'{}' is not on the block list", domain)));
            }
            config.focus.blocked_sites = focus.sites().to_vec();
            Config::save_blocked_sites(config_path, focus.sites())?;
            println!("Unblocked {}", domain.trim());
            Ok(())
        }
    }
}

fn run_focus_session(focus: &mut FocusMode, minutes: u32) -> Result<(), CliError> {
    if !focus.is_available() {
        return Err(CliError::FocusDisabled);
    }
    if minutes == 0 {
        return Err(CliError::InvalidInput("A focus session needs at least one minute".to_string()));
    }
    if !focus.start(minutes, utils::now()) {
        return Err(CliError::InvalidInput("A focus session is already running".to_string()));
    }
    println!("Focus session started: {} minutes, {} sites on the block list. Ctrl+C to stop.", minutes, focus.sites().len());

    let mut stdout = io::stdout();
    loop {
        let now = utils::now();
        if focus.tick(now) {
            break;
        }
        if let Some(remaining) = focus.status(now).remaining {
            write!(stdout, "\rRemaining {}  ", focus::format_remaining(remaining))?;
            stdout.flush()?;
        }
        std::thread::sleep(Duration::from_secs(1));
    }
    println!("\rFocus session complete. Take a break!");
    Ok(())
}

/// Listen, answer, repeat. Commands must start with the wake phrase.
pub fn handle_voice(
    voice_assistant: &mut VoiceAssistant,
    config: &Config,
    store: &mut TaskStore,
    focus: &mut FocusMode,
    chat: &mut ChatAssistant,
) -> Result<(), CliError> {
    run_voice_loop(voice_assistant, config, store, focus, chat, utils::now)
}

fn run_voice_loop(
    voice_assistant: &mut VoiceAssistant,
    config: &Config,
    store: &mut TaskStore,
    focus: &mut FocusMode,
    chat: &mut ChatAssistant,
    clock: impl Fn() -> NaiveDateTime,
) -> Result<(), CliError> {
    if !voice_assistant.is_available() {
        return Err(CliError::InvalidInput("Voice features are disabled in the config".to_string()));
    }
    let timeout = Duration::from_secs(config.voice.listen_timeout_secs.max(1));
    let wake_word = voice_assistant.wake_word().to_string();
    println!("Say \"{}\" followed by a command, or \"{} stop listening\".", wake_word, wake_word);
    voice_assistant.speak("Hi! I'm ready to help you study.");

    let mut session = VoiceSession {
        store,
        focus,
        chat,
        focus_minutes: config.focus.default_minutes,
        upcoming_days: config.schedule.upcoming_days,
        slot_minutes: config.schedule.slot_minutes,
        gap_minutes: config.schedule.gap_minutes,
    };

    while voice_assistant.is_available() {
        if session.focus.tick(clock()) {
            voice_assistant.speak("Your focus session is over. Time for a break.");
        }
        let Some(heard) = voice_assistant.listen(timeout) else {
            continue;
        };
        // Listening can block for the whole timeout
        let now = clock();
        let Some(command) = voice::strip_wake_word(&heard, &wake_word) else {
            tracing::debug!(%heard, "ignored input without wake phrase");
            continue;
        };
        if command.is_empty() {
            voice_assistant.speak("Yes? What can I do for you?");
            continue;
        }
        match session.handle(command, now) {
            VoiceOutcome::Reply(reply) => voice_assistant.speak(&reply),
            VoiceOutcome::Stop(farewell) => {
                voice_assistant.speak(&farewell);
                break;
            }
        }
    }
    ensure_saved(session.store);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::OfflineBackend;
    use crate::focus::LogOnlyBlocker;
    use crate::voice::SpeechEngine;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Plays back fixed transcripts and records what was spoken
    struct ScriptedSpeech {
        lines: VecDeque<String>,
        heard: Arc<AtomicUsize>,
        spoken: Arc<Mutex<Vec<String>>>,
    }

    impl SpeechEngine for ScriptedSpeech {
        fn listen(&mut self, _timeout: Duration) -> Option<String> {
            let line = self.lines.pop_front()?;
            self.heard.fetch_add(1, Ordering::SeqCst);
            Some(line)
        }

        fn speak(&mut self, text: &str) {
            self.spoken.lock().unwrap().push(text.to_string());
        }

        fn is_available(&self) -> bool {
            !self.lines.is_empty()
        }
    }

    fn store() -> (tempfile::TempDir, TaskStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::open(dir.path().join("tasks.json"));
        (dir, store)
    }

    #[test]
    fn add_rejects_bad_dates_and_priorities() {
        let (_dir, mut store) = store();
        let err = handle_add("Essay".into(), None, Some("31/05/2024".into()), None, &mut store).unwrap_err();
        assert!(matches!(err, CliError::DateParseError(_)));
        let err = handle_add("Essay".into(), None, None, Some("asap".into()), &mut store).unwrap_err();
        assert!(matches!(err, CliError::PriorityError(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn edit_clears_due_date_with_none() {
        let (_dir, mut store) = store();
        handle_add("Essay".into(), None, Some("2024-06-01".into()), Some("high".into()), &mut store).unwrap();
        let args = EditArgs { id: 1, title: None, description: None, due: Some("none".into()), priority: None };
        handle_edit(args, &mut store).unwrap();
        let task = store.get(1).unwrap();
        assert_eq!(task.due_date, None);
        assert_eq!(task.priority, Priority::High);
    }

    #[test]
    fn edit_without_changes_is_rejected() {
        let (_dir, mut store) = store();
        let args = EditArgs { id: 1, title: None, description: None, due: None, priority: None };
        assert!(matches!(handle_edit(args, &mut store), Err(CliError::InvalidInput(_))));
    }

    #[test]
    fn unknown_ids_are_reported() {
        let (_dir, mut store) = store();
        assert!(matches!(handle_done(9, &mut store), Err(CliError::NotFound(9))));
        assert!(matches!(handle_delete(9, &mut store), Err(CliError::NotFound(9))));
    }

    #[test]
    fn block_and_unblock_persist_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.focus.blocked_sites.clear();
        let mut focus = FocusMode::new(true, &[], Box::new(crate::focus::LogOnlyBlocker));

        handle_focus(FocusAction::Block { domain: "https://www.Reddit.com/r/all".into() }, &mut config, &path, &mut focus).unwrap();
        let saved = Config::load_from_path(&path).unwrap();
        assert_eq!(saved.focus.blocked_sites, vec!["reddit.com"]);

        handle_focus(FocusAction::Unblock { domain: "reddit.com".into() }, &mut config, &path, &mut focus).unwrap();
        assert!(Config::load_from_path(&path).unwrap().focus.blocked_sites.is_empty());
    }

    #[test]
    fn cli_parses_nested_focus_command() {
        let cli = Cli::try_parse_from(["study", "--dev", "focus", "start", "--minutes", "50"]).unwrap();
        assert!(cli.dev);
        assert!(matches!(
            cli.command,
            Some(Commands::Focus { action: FocusAction::Start { minutes: Some(50) } })
        ));
    }

    #[test]
    fn voice_commands_see_the_time_after_listening() {
        let (_dir, mut store) = store();
        let mut focus = FocusMode::new(true, &[], Box::new(LogOnlyBlocker));
        let mut chat = ChatAssistant::new(Box::new(OfflineBackend), 10);
        let heard = Arc::new(AtomicUsize::new(0));
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let engine = ScriptedSpeech {
            lines: ["hey study helper what time is it", "hey study helper stop listening"]
                .into_iter()
                .map(String::from)
                .collect(),
            heard: Arc::clone(&heard),
            spoken: Arc::clone(&spoken),
        };
        let mut voice = VoiceAssistant::new(Box::new(engine), true, "hey study helper");

        // Each transcript arrives half an hour after the previous one
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(10, 0, 0).unwrap();
        let clock = || start + chrono::Duration::minutes(30 * heard.load(Ordering::SeqCst) as i64);

        run_voice_loop(&mut voice, &Config::default(), &mut store, &mut focus, &mut chat, clock).unwrap();

        let spoken = spoken.lock().unwrap();
        assert!(spoken.contains(&"It's 10:30.".to_string()), "spoken: {spoken:?}");
    }

    #[test]
    fn blocking_a_site_does_not_persist_the_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().save_to_path(&path).unwrap();

        let mut config = Config::load_from_path(&path).unwrap();
        config
            .apply_overrides(|key| (key == "STUDY_HELPER_API_KEY").then(|| "sk-secret".to_string()))
            .unwrap();
        let mut focus = FocusMode::new(true, &[], Box::new(LogOnlyBlocker));

        handle_focus(FocusAction::Block { domain: "x.com".into() }, &mut config, &path, &mut focus).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("x.com"));
        assert!(!contents.contains("sk-secret"));
        assert_eq!(config.chat.api_key.as_deref(), Some("sk-secret"));
    }
}
