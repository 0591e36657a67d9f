//! Voice front-end: a pluggable speech engine, wake-phrase handling and a
//! small command grammar that drives the task store, focus mode and chat.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::chat::ChatAssistant;
use crate::focus::FocusMode;
use crate::models::NewTask;
use crate::store::TaskStore;

/// Speech-to-text and text-to-speech provider
pub trait SpeechEngine: Send {
    /// Recognized text, or None when nothing was heard before `timeout`
    fn listen(&mut self, timeout: Duration) -> Option<String>;
    fn speak(&mut self, text: &str);
    fn is_available(&self) -> bool {
        true
    }
}

/// Typed input stands in for the microphone; speech is printed
pub struct ConsoleSpeech {
    lines: Receiver<String>,
    closed: bool,
}

impl ConsoleSpeech {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self { lines: rx, closed: false }
    }
}

impl Default for ConsoleSpeech {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechEngine for ConsoleSpeech {
    fn listen(&mut self, timeout: Duration) -> Option<String> {
        if self.closed {
            return None;
        }
        print!("Listening... ");
        let _ = io::stdout().flush();
        match self.lines.recv_timeout(timeout) {
            Ok(line) => Some(line),
            Err(RecvTimeoutError::Timeout) => {
                println!();
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    fn speak(&mut self, text: &str) {
        println!("TTS: {}", text);
    }

    fn is_available(&self) -> bool {
        !self.closed
    }
}

pub struct VoiceAssistant {
    engine: Box<dyn SpeechEngine>,
    enabled: bool,
    wake_word: String,
}

impl VoiceAssistant {
    pub fn new(engine: Box<dyn SpeechEngine>, enabled: bool, wake_word: impl Into<String>) -> Self {
        tracing::info!(enabled, "voice assistant initialized");
        Self {
            engine,
            enabled,
            wake_word: wake_word.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.enabled && self.engine.is_available()
    }

    pub fn wake_word(&self) -> &str {
        &self.wake_word
    }

    pub fn listen(&mut self, timeout: Duration) -> Option<String> {
        if !self.is_available() {
            return None;
        }
        let text = self.engine.listen(timeout)?;
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        tracing::info!(recognized = %text, "speech recognized");
        Some(text.to_string())
    }

    pub fn speak(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.engine.speak(text);
    }
}

/// Byte ranges of the alphanumeric words in `text`
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_alphanumeric() || c == '\'', start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

/// The command following the wake phrase, or None if the transcript does not
/// start with it. Case and punctuation are ignored; an empty wake phrase
/// accepts everything.
pub fn strip_wake_word<'a>(transcript: &'a str, wake_word: &str) -> Option<&'a str> {
    let wake: Vec<String> = word_spans(wake_word)
        .into_iter()
        .map(|(s, e)| wake_word[s..e].to_lowercase())
        .collect();
    if wake.is_empty() {
        return Some(transcript.trim());
    }

    let spans = word_spans(transcript);
    if spans.len() < wake.len() {
        return None;
    }
    let matches = spans
        .iter()
        .zip(&wake)
        .all(|(&(s, e), w)| transcript[s..e].to_lowercase() == *w);
    if !matches {
        return None;
    }
    let rest_start = spans[wake.len() - 1].1;
    Some(transcript[rest_start..].trim_start_matches(|c: char| !c.is_alphanumeric()).trim_end())
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceCommand {
    AddTask { title: String, due: Option<DueHint> },
    ListToday,
    ListUpcoming,
    CompleteTask(u64),
    StartFocus(Option<u32>),
    StopFocus,
    Time,
    Schedule,
    StopListening,
    Chat(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DueHint {
    Today,
    Tomorrow,
    On(NaiveDate),
}

impl DueHint {
    pub fn resolve(self, today: NaiveDate) -> NaiveDate {
        match self {
            DueHint::Today => today,
            DueHint::Tomorrow => today + ChronoDuration::days(1),
            DueHint::On(date) => date,
        }
    }
}

const ADD_PREFIXES: &[&str] = &["add a task to ", "add a task ", "add task ", "new task ", "remind me to "];
const COMPLETE_PREFIXES: &[&str] = &["complete task ", "finish task ", "mark task ", "done with task "];

impl VoiceCommand {
    pub fn parse(text: &str) -> Self {
        let original = text.trim().trim_end_matches(['.', '!', '?']);
        // ASCII lowering keeps byte offsets aligned with `original`
        let lower = original.to_ascii_lowercase();

        for prefix in ADD_PREFIXES {
            if let Some(rest) = lower.strip_prefix(prefix) {
                let title_part = &original[original.len() - rest.len()..];
                return Self::parse_add(title_part);
            }
        }

        for prefix in COMPLETE_PREFIXES {
            if let Some(rest) = lower.strip_prefix(prefix) {
                if let Some(id) = rest.split_whitespace().next().and_then(|w| w.trim_start_matches('#').parse().ok()) {
                    return VoiceCommand::CompleteTask(id);
                }
            }
        }

        let is = |phrases: &[&str]| phrases.iter().any(|p| lower.contains(p));

        if is(&["stop listening", "goodbye", "good bye"]) || matches!(lower.as_str(), "exit" | "quit" | "stop") {
            return VoiceCommand::StopListening;
        }
        if is(&["start focus", "begin focus", "focus mode on", "start a focus"]) {
            let minutes = lower
                .split_whitespace()
                .zip(lower.split_whitespace().skip(1))
                .find(|(_, unit)| unit.starts_with("minute"))
                .and_then(|(n, _)| n.parse().ok());
            return VoiceCommand::StartFocus(minutes);
        }
        if is(&["stop focus", "end focus", "focus mode off", "end the focus"]) {
            return VoiceCommand::StopFocus;
        }
        if is(&["what time", "the time"]) {
            return VoiceCommand::Time;
        }
        if is(&["schedule", "plan my study", "what should i study"]) {
            return VoiceCommand::Schedule;
        }
        if is(&["today"]) && is(&["task", "due", "have"]) {
            return VoiceCommand::ListToday;
        }
        if is(&["upcoming", "this week", "what's due", "whats due", "what is due"]) {
            return VoiceCommand::ListUpcoming;
        }

        VoiceCommand::Chat(original.to_string())
    }

    fn parse_add(rest: &str) -> Self {
        // Leading space so "due tomorrow" with no title still matches " due tomorrow"
        let padded = format!(" {rest}");
        let lower = padded.to_ascii_lowercase();
        let (title, due) = if let Some(title) = strip_suffix_ci(&padded, &lower, " due today").or_else(|| strip_suffix_ci(&padded, &lower, " today")) {
            (title, Some(DueHint::Today))
        } else if let Some(title) = strip_suffix_ci(&padded, &lower, " due tomorrow").or_else(|| strip_suffix_ci(&padded, &lower, " tomorrow")) {
            (title, Some(DueHint::Tomorrow))
        } else if let Some(idx) = lower.rfind(" due ") {
            match crate::utils::parse_date(&padded[idx + 5..]) {
                Ok(date) => (&padded[..idx], Some(DueHint::On(date))),
                Err(_) => (padded.as_str(), None),
            }
        } else {
            (padded.as_str(), None)
        };
        VoiceCommand::AddTask {
            title: title.trim().trim_matches('"').to_string(),
            due,
        }
    }
}

fn strip_suffix_ci<'a>(original: &'a str, lower: &str, suffix: &str) -> Option<&'a str> {
    lower
        .ends_with(suffix)
        .then(|| &original[..original.len() - suffix.len()])
}

pub enum VoiceOutcome {
    Reply(String),
    Stop(String),
}

/// Executes recognized commands against the rest of the application
pub struct VoiceSession<'a> {
    pub store: &'a mut TaskStore,
    pub focus: &'a mut FocusMode,
    pub chat: &'a mut ChatAssistant,
    pub focus_minutes: u32,
    pub upcoming_days: u32,
    pub slot_minutes: u32,
    pub gap_minutes: u32,
}

impl VoiceSession<'_> {
    pub fn handle(&mut self, text: &str, now: NaiveDateTime) -> VoiceOutcome {
        let command = VoiceCommand::parse(text);
        tracing::debug!(?command, "voice command");
        let today = now.date();

        let reply = match command {
            VoiceCommand::StopListening => return VoiceOutcome::Stop("Goodbye! Good luck with your studies.".to_string()),
            VoiceCommand::AddTask { title, due } => {
                let mut new_task = NewTask::new(title);
                new_task.due_date = due.map(|d| d.resolve(today));
                match self.store.add(new_task) {
                    Ok(task) => match task.due_date {
                        Some(date) => format!("Added task {}: {}, due {}.", task.id, task.title, date.format("%A %B %-d")),
                        None => format!("Added task {}: {}.", task.id, task.title),
                    },
                    Err(e) => format!("I couldn't add that task. {}", e),
                }
            }
            VoiceCommand::ListToday => describe_tasks(&self.store.today_tasks(today), "due today"),
            VoiceCommand::ListUpcoming => describe_tasks(
                &self.store.upcoming_from(today, self.upcoming_days),
                &format!("due in the next {} days", self.upcoming_days),
            ),
            VoiceCommand::CompleteTask(id) => match self.store.get(id) {
                Some(task) if self.store.complete(id) => format!("Marked task {} as done: {}.", id, task.title),
                _ => format!("I couldn't find task {}.", id),
            },
            VoiceCommand::StartFocus(minutes) => {
                let minutes = minutes.unwrap_or(self.focus_minutes);
                if !self.focus.is_available() {
                    "Focus mode is disabled in the settings.".to_string()
                } else if self.focus.is_active(now) {
                    "A focus session is already running.".to_string()
                } else if self.focus.start(minutes, now) {
                    format!("Focus session started for {} minutes. Good luck!", minutes)
                } else {
                    "I couldn't start a focus session.".to_string()
                }
            }
            VoiceCommand::StopFocus => {
                if self.focus.end(now) {
                    "Focus session ended.".to_string()
                } else {
                    "No focus session is running.".to_string()
                }
            }
            VoiceCommand::Time => format!("It's {}.", now.format("%H:%M")),
            VoiceCommand::Schedule => {
                let slots = self.store.suggest_schedule_at(now, self.slot_minutes, self.gap_minutes);
                if slots.is_empty() {
                    "You have no pending tasks to schedule.".to_string()
                } else {
                    let parts: Vec<String> = slots
                        .iter()
                        .map(|s| format!("{} at {}", s.task.title, s.suggested_start.format("%H:%M")))
                        .collect();
                    format!("Here's a plan: {}.", parts.join(", then "))
                }
            }
            VoiceCommand::Chat(message) => self.chat.get_response(&message, json!({ "source": "voice_assistant" })),
        };
        VoiceOutcome::Reply(reply)
    }
}

fn describe_tasks(tasks: &[crate::models::Task], what: &str) -> String {
    match tasks {
        [] => format!("You have no tasks {}.", what),
        [only] => format!("You have one task {}: {}.", what, only.title),
        _ => {
            let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
            format!("You have {} tasks {}: {}.", tasks.len(), what, titles.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::OfflineBackend;
    use crate::focus::LogOnlyBlocker;

    #[test]
    fn wake_word_is_case_and_punctuation_insensitive() {
        assert_eq!(strip_wake_word("Hey, Study Helper! add task Essay", "hey study helper"), Some("add task Essay"));
        assert_eq!(strip_wake_word("hey study", "hey study helper"), None);
        assert_eq!(strip_wake_word("add task x", "hey study helper"), None);
        assert_eq!(strip_wake_word(" anything ", ""), Some("anything"));
    }

    #[test]
    fn parses_add_task_with_due_hints() {
        assert_eq!(
            VoiceCommand::parse("Add task Read Chapter 3 due tomorrow."),
            VoiceCommand::AddTask { title: "Read Chapter 3".to_string(), due: Some(DueHint::Tomorrow) }
        );
        assert_eq!(
            VoiceCommand::parse("remind me to email Prof. Lee due 2024-06-02"),
            VoiceCommand::AddTask {
                title: "email Prof. Lee".to_string(),
                due: Some(DueHint::On(NaiveDate::from_ymd_opt(2024, 6, 2).unwrap())),
            }
        );
        assert_eq!(
            VoiceCommand::parse("add task due tomorrow"),
            VoiceCommand::AddTask { title: String::new(), due: Some(DueHint::Tomorrow) }
        );
        assert_eq!(
            VoiceCommand::parse("add task due 2024-06-02"),
            VoiceCommand::AddTask {
                title: String::new(),
                due: Some(DueHint::On(NaiveDate::from_ymd_opt(2024, 6, 2).unwrap())),
            }
        );
        assert_eq!(
            VoiceCommand::parse("new task essay"),
            VoiceCommand::AddTask { title: "essay".to_string(), due: None }
        );
    }

    #[test]
    fn parses_other_commands() {
        assert_eq!(VoiceCommand::parse("complete task 4"), VoiceCommand::CompleteTask(4));
        assert_eq!(VoiceCommand::parse("start focus mode for 50 minutes"), VoiceCommand::StartFocus(Some(50)));
        assert_eq!(VoiceCommand::parse("start focus"), VoiceCommand::StartFocus(None));
        assert_eq!(VoiceCommand::parse("stop focus mode"), VoiceCommand::StopFocus);
        assert_eq!(VoiceCommand::parse("What do I have today?"), VoiceCommand::ListToday);
        assert_eq!(VoiceCommand::parse("what's due this week"), VoiceCommand::ListUpcoming);
        assert_eq!(VoiceCommand::parse("what time is it"), VoiceCommand::Time);
        assert_eq!(VoiceCommand::parse("goodbye"), VoiceCommand::StopListening);
        assert_eq!(
            VoiceCommand::parse("explain photosynthesis"),
            VoiceCommand::Chat("explain photosynthesis".to_string())
        );
    }

    #[test]
    fn session_drives_store_and_focus() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TaskStore::open(dir.path().join("tasks.json"));
        let mut focus = FocusMode::new(true, &[], Box::new(LogOnlyBlocker));
        let mut chat = ChatAssistant::new(Box::new(OfflineBackend), 10);
        let now = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();

        let mut session = VoiceSession {
            store: &mut store,
            focus: &mut focus,
            chat: &mut chat,
            focus_minutes: 25,
            upcoming_days: 7,
            slot_minutes: 30,
            gap_minutes: 15,
        };

        let VoiceOutcome::Reply(reply) = session.handle("add task Essay today", now) else {
            panic!("expected a reply");
        };
        assert!(reply.starts_with("Added task 1: Essay"));

        let VoiceOutcome::Reply(reply) = session.handle("add task due tomorrow", now) else {
            panic!("expected a reply");
        };
        assert!(reply.starts_with("I couldn't add that task."));
        assert_eq!(session.store.len(), 1);

        let VoiceOutcome::Reply(reply) = session.handle("what's due today", now) else {
            panic!("expected a reply");
        };
        assert_eq!(reply, "You have one task due today: Essay.");

        let VoiceOutcome::Reply(reply) = session.handle("start focus", now) else {
            panic!("expected a reply");
        };
        assert!(reply.contains("25 minutes"));

        let VoiceOutcome::Reply(reply) = session.handle("complete task 1", now) else {
            panic!("expected a reply");
        };
        assert_eq!(reply, "Marked task 1 as done: Essay.");

        assert!(matches!(session.handle("stop listening", now), VoiceOutcome::Stop(_)));
        assert!(focus.is_active(now));
        assert!(store.get(1).unwrap().completed);
    }
}
