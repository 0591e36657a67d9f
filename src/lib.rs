pub mod chat;
pub mod cli;
pub mod config;
pub mod focus;
pub mod logging;
pub mod models;
pub mod store;
pub mod tui;
pub mod utils;
pub mod voice;

pub use chat::ChatAssistant;
pub use config::Config;
pub use focus::FocusMode;
pub use models::{NewTask, Priority, Task};
pub use store::TaskStore;
pub use utils::Profile;
pub use voice::VoiceAssistant;
