use super::{ChatBackend, ChatError, ChatReply, ChatRequest};

/// Keyword-matched study help for when no assistant API is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineBackend;

const GREETING: &[&str] = &["hello", "hi", "hey"];
const TIME: &[&str] = &["time", "date", "today is"];
const FOCUS: &[&str] = &["focus", "distract", "block"];
const SCHEDULE: &[&str] = &["schedule", "calendar", "plan", "task"];
const VOICE: &[&str] = &["voice", "speak", "listen"];
const HELP: &[&str] = &["help", "what can you do", "capabilities"];
const TIPS: &[&str] = &["study tips", "how to study", "study better", "technique"];
const MOTIVATION: &[&str] = &["motivation", "motivated", "lazy", "tired"];

impl OfflineBackend {
    pub fn answer(message: &str) -> ChatReply {
        let lower = message.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| contains_word(&lower, w));

        // Specific topics win over a greeting that merely opens the message
        if has(HELP) {
            return ChatReply {
                message: "I can help you organise your studying:\n\n\
                    * **Tasks**: add, complete and review study tasks\n\
                    * **Schedule**: see what's due and get a suggested study plan\n\
                    * **Focus mode**: timed sessions with a list of sites to avoid\n\
                    * **Voice**: speak commands instead of typing"
                    .to_string(),
                suggestions: vec![
                    "Show my upcoming tasks".to_string(),
                    "Give me study tips".to_string(),
                    "Start focus mode".to_string(),
                ],
                ..Default::default()
            };
        }
        if has(TIPS) {
            return ChatReply {
                message: "Some techniques that work well:\n\n\
                    * **Active recall**: close the book and write down what you remember\n\
                    * **Pomodoro**: 25 minutes of work, 5 minutes of rest\n\
                    * **Spaced repetition**: review material at growing intervals\n\
                    * **Teach it**: explain the topic out loud as if to a friend\n\
                    * **Sleep**: memories consolidate overnight"
                    .to_string(),
                suggestions: vec!["Start a 25 minute focus session".to_string()],
                ..Default::default()
            };
        }
        if has(MOTIVATION) {
            return ChatReply {
                message: "Motivation follows action more often than it precedes it. \
                    Pick the smallest next step of your most important task and do just that \
                    for five minutes. Track what you finish so progress stays visible."
                    .to_string(),
                suggestions: vec!["Break a big task into smaller ones".to_string()],
                ..Default::default()
            };
        }
        if has(FOCUS) {
            return ChatReply::text(
                "Focus mode runs a timed study session and keeps a list of distracting sites. \
                Start one from the Focus tab or with `study focus start`.",
            );
        }
        if has(SCHEDULE) {
            return ChatReply::text(
                "Your schedule lives in the task list. `study upcoming` shows what's due this week \
                and `study schedule` suggests back-to-back study slots for pending tasks.",
            );
        }
        if has(VOICE) {
            return ChatReply::text(
                "Run `study voice` and start a command with the wake phrase, for example \
                \"hey study helper, what's due today\".",
            );
        }
        if has(TIME) {
            let now = chrono::Local::now();
            return ChatReply::text(format!(
                "It's {} on {}.",
                now.format("%H:%M"),
                now.format("%A, %B %-d, %Y")
            ));
        }
        if has(GREETING) {
            return ChatReply::text("Hello! How can I help you with your studies today?");
        }

        ChatReply {
            message: format!(
                "I don't have specific information about \"{}\" while offline, \
                but I can help with study techniques, planning and staying focused.",
                message.trim()
            ),
            suggestions: vec![
                "How can I study better?".to_string(),
                "Help me plan my week".to_string(),
                "How do I stay focused?".to_string(),
            ],
            ..Default::default()
        }
    }
}

/// Phrase match on word boundaries so "this" does not count as "hi"
fn contains_word(haystack: &str, phrase: &str) -> bool {
    haystack.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

impl ChatBackend for OfflineBackend {
    fn send(&self, request: &ChatRequest) -> Result<ChatReply, ChatError> {
        Ok(Self::answer(&request.message))
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}
