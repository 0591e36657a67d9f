use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use thiserror::Error;

use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

pub const DEFAULT_BLOCKED_SITES: &[&str] = &[
    "facebook.com", "twitter.com", "instagram.com", "youtube.com",
    "tiktok.com", "snapchat.com", "reddit.com", "twitch.tv",
    "netflix.com", "hulu.com", "disney.com", "amazon.com",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub key_bindings: KeyBindings,
    #[serde(default = "default_current_theme")]
    pub current_theme: String,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the study assistant API; empty selects the offline assistant
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_wake_word")]
    pub wake_word: String,
    #[serde(default = "default_listen_timeout")]
    pub listen_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_focus_minutes")]
    pub default_minutes: u32,
    #[serde(default = "default_blocked_sites")]
    pub blocked_sites: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: u32,
    #[serde(default = "default_gap_minutes")]
    pub gap_minutes: u32,
    #[serde(default = "default_upcoming_days")]
    pub upcoming_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file path; empty means `study.log` in the data directory
    #[serde(default)]
    pub file: String,
}

/// Key names as accepted by `utils::parse_key_binding`. Unset keys keep their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub quit: String,
    pub new: String,
    pub edit: String,
    pub delete: String,
    pub list_up: String,
    pub list_down: String,
    pub tab_left: String,
    pub tab_right: String,
    pub help: String,
    pub toggle_task_status: String,
    pub focus_toggle: String,
    pub yank: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub fg: String,
    pub bg: String,
    pub highlight_bg: String,
    pub tab_bg: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            chat: ChatConfig::default(),
            voice: VoiceConfig::default(),
            focus: FocusConfig::default(),
            schedule: ScheduleConfig::default(),
            logging: LoggingConfig::default(),
            key_bindings: KeyBindings::default(),
            current_theme: default_current_theme(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            timeout_secs: default_chat_timeout(),
            history_limit: default_history_limit(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            wake_word: default_wake_word(),
            listen_timeout_secs: default_listen_timeout(),
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_minutes: default_focus_minutes(),
            blocked_sites: default_blocked_sites(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            slot_minutes: default_slot_minutes(),
            gap_minutes: default_gap_minutes(),
            upcoming_days: default_upcoming_days(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        let key = |s: &str| s.to_string();
        Self {
            quit: key("q"),
            new: key("n"),
            edit: key("e"),
            delete: key("d"),
            list_up: key("k"),
            list_down: key("j"),
            tab_left: key("Left"),
            tab_right: key("Right"),
            help: key("F1"),
            toggle_task_status: key("Space"),
            focus_toggle: key("f"),
            yank: key("y"),
        }
    }
}

/// (name, fg, bg, highlight_bg, tab_bg)
const THEME_PRESETS: &[(&str, &str, &str, &str, &str)] = &[
    ("default", "white", "black", "blue", "darkgray"),
    ("night", "#c0caf5", "#1a1b26", "#3d59a1", "#24283b"),
    ("paper", "black", "#f5f0e1", "#87afd7", "#d8d0b8"),
    ("forest", "#d8e4bc", "#1e2a1e", "#4f7942", "#2f3f2f"),
];

impl Theme {
    /// Preset theme by name
    pub fn preset(name: &str) -> Option<Theme> {
        THEME_PRESETS
            .iter()
            .find(|(preset, ..)| preset.eq_ignore_ascii_case(name.trim()))
            .map(|&(_, fg, bg, highlight_bg, tab_bg)| Theme {
                fg: fg.to_string(),
                bg: bg.to_string(),
                highlight_bg: highlight_bg.to_string(),
                tab_bg: tab_bg.to_string(),
            })
    }

    pub fn preset_names() -> impl Iterator<Item = &'static str> {
        THEME_PRESETS.iter().map(|(name, ..)| *name)
    }
}

// serde field defaults
fn default_store_path() -> String {
    // This is a fallback - actual profile will be determined at load time
    if let Some(data_dir) = utils::get_data_dir(utils::Profile::Prod) {
        data_dir.join("tasks.json").to_string_lossy().to_string()
    } else {
        "~/.local/share/study-helper/tasks.json".to_string()
    }
}

fn default_true() -> bool {
    true
}

fn default_chat_timeout() -> u64 {
    30
}

fn default_history_limit() -> usize {
    10
}

fn default_wake_word() -> String {
    "hey study helper".to_string()
}

fn default_listen_timeout() -> u64 {
    5
}

fn default_focus_minutes() -> u32 {
    25
}

fn default_blocked_sites() -> Vec<String> {
    DEFAULT_BLOCKED_SITES.iter().map(|s| s.to_string()).collect()
}

fn default_slot_minutes() -> u32 {
    30
}

fn default_gap_minutes() -> u32 {
    15
}

fn default_upcoming_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_current_theme() -> String {
    "default".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidOverride { key: &'static str, value: String },
}

impl Config {
    /// Load configuration from the profile's config file, or create the default if missing
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;

        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            let mut config = Config::default();
            config.store_path = Self::default_store_path_for_profile(profile);
            if let Err(e) = config.save_to_path(&config_path) {
                tracing::error!(path = ?config_path, "failed to save default config: {e}");
                return Err(e);
            }
            config
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from an explicit file (the `--config` flag)
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to an explicit file
    pub fn save_to_path(&mut self, path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Write a new block list into the file at `path`, leaving its other settings
    /// as they are on disk. The in-memory config may carry environment overrides
    /// (API keys among them) that do not belong in the file.
    pub fn save_blocked_sites(path: &Path, sites: &[String]) -> Result<(), ConfigError> {
        let mut on_disk = if path.exists() {
            Self::load_from_path(path)?
        } else {
            Config::default()
        };
        on_disk.focus.blocked_sites = sites.to_vec();
        on_disk.save_to_path(path)
    }

    /// Apply environment-style overrides (API_BASE_URL, API_TIMEOUT, ...)
    /// `lookup` returns the value for a key, if set
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("API_BASE_URL") {
            self.chat.base_url = url.trim().to_string();
        }
        if let Some(timeout) = lookup("API_TIMEOUT") {
            self.chat.timeout_secs = timeout.trim().parse().map_err(|_| {
                ConfigError::InvalidOverride { key: "API_TIMEOUT", value: timeout.clone() }
            })?;
        }
        if let Some(key) = lookup("STUDY_HELPER_API_KEY") {
            self.chat.api_key = Some(key).filter(|k| !k.trim().is_empty());
        }
        if let Some(enabled) = lookup("VOICE_ENABLED") {
            self.voice.enabled = parse_flag("VOICE_ENABLED", &enabled)?;
        }
        if let Some(enabled) = lookup("FOCUS_MODE_ENABLED") {
            self.focus.enabled = parse_flag("FOCUS_MODE_ENABLED", &enabled)?;
        }
        if let Some(sites) = lookup("BLOCKED_SITES") {
            self.focus.blocked_sites = sites
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level.trim().to_lowercase();
        }
        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    fn default_store_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("tasks.json").to_string_lossy().to_string()
        } else {
            match profile {
                utils::Profile::Dev => "~/.local/share/study-helper-dev/tasks.json".to_string(),
                utils::Profile::Prod => "~/.local/share/study-helper/tasks.json".to_string(),
            }
        }
    }

    /// Get the expanded task store path (with ~ expansion)
    pub fn get_store_path(&self) -> PathBuf {
        utils::expand_path(&self.store_path)
    }

    /// Get the log file path: the configured one, or `study.log` next to the task store
    pub fn get_log_path(&self) -> PathBuf {
        if !self.logging.file.is_empty() {
            return utils::expand_path(&self.logging.file);
        }
        self.get_store_path()
            .parent()
            .map(|dir| dir.join("study.log"))
            .unwrap_or_else(|| PathBuf::from("study.log"))
    }

    /// Active theme; an unknown name falls back to "default"
    pub fn get_active_theme(&self) -> Theme {
        Theme::preset(&self.current_theme)
            .or_else(|| {
                warn_unknown_theme(&self.current_theme);
                Theme::preset("default")
            })
            .unwrap_or(Theme {
                fg: "white".to_string(),
                bg: "black".to_string(),
                highlight_bg: "blue".to_string(),
                tab_bg: "darkgray".to_string(),
            })
    }
}

// Called on every frame; warn once per name
fn warn_unknown_theme(name: &str) {
    static WARNED: LazyLock<Mutex<HashSet<String>>> = LazyLock::new(Default::default);
    let first = WARNED
        .lock()
        .map(|mut seen| seen.insert(name.to_string()))
        .unwrap_or(true);
    if first {
        let available: Vec<_> = Theme::preset_names().collect();
        tracing::warn!(theme = name, ?available, "unknown theme, using default");
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidOverride { key, value: value.to_string() }),
    }
}
