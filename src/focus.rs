//! Focus mode: a list of distracting sites plus timed study sessions.
//!
//! Actually blocking the sites is left to a [`SiteBlocker`]; the default
//! implementation only records what it would do in the log.

use chrono::{Duration, NaiveDateTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FocusError {
    #[error("Site blocking is not available: {0}")]
    Unavailable(String),
    #[error("Permission denied while changing site blocks: {0}")]
    PermissionDenied(String),
}

/// Enforcement of the block list, e.g. hosts-file or firewall edits
pub trait SiteBlocker: Send {
    fn block(&mut self, sites: &[String]) -> Result<(), FocusError>;
    fn unblock(&mut self) -> Result<(), FocusError>;
}

/// Blocker that enforces nothing
#[derive(Debug, Default)]
pub struct LogOnlyBlocker;

impl SiteBlocker for LogOnlyBlocker {
    fn block(&mut self, sites: &[String]) -> Result<(), FocusError> {
        tracing::warn!(count = sites.len(), "site blocking not enforced on this platform");
        Ok(())
    }

    fn unblock(&mut self) -> Result<(), FocusError> {
        tracing::debug!("site unblock requested");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusStatus {
    pub is_active: bool,
    pub blocked_sites_count: usize,
    pub remaining: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
struct Session {
    ends_at: NaiveDateTime,
}

pub struct FocusMode {
    enabled: bool,
    sites: Vec<String>,
    session: Option<Session>,
    blocker: Box<dyn SiteBlocker>,
}

impl FocusMode {
    pub fn new(enabled: bool, sites: &[String], blocker: Box<dyn SiteBlocker>) -> Self {
        let mut focus = Self {
            enabled,
            sites: Vec::new(),
            session: None,
            blocker,
        };
        for site in sites {
            focus.add_site(site);
        }
        focus
    }

    pub fn is_available(&self) -> bool {
        self.enabled
    }

    pub fn sites(&self) -> &[String] {
        &self.sites
    }

    /// Add a domain; returns false for blanks and duplicates
    pub fn add_site(&mut self, site: &str) -> bool {
        let Some(domain) = normalize_domain(site) else {
            return false;
        };
        if self.sites.contains(&domain) {
            return false;
        }
        tracing::info!(%domain, "added blocked site");
        self.sites.push(domain);
        true
    }

    pub fn remove_site(&mut self, site: &str) -> bool {
        let Some(domain) = normalize_domain(site) else {
            return false;
        };
        let before = self.sites.len();
        self.sites.retain(|s| *s != domain);
        let removed = self.sites.len() != before;
        if removed {
            tracing::info!(%domain, "removed blocked site");
        }
        removed
    }

    /// Start a session of `minutes`. Returns false if focus mode is disabled,
    /// a session is already running, or `minutes` is zero.
    pub fn start(&mut self, minutes: u32, now: NaiveDateTime) -> bool {
        self.tick(now);
        if !self.enabled || minutes == 0 {
            return false;
        }
        if self.session.is_some() {
            tracing::warn!("focus session already active");
            return false;
        }
        self.session = Some(Session {
            ends_at: now + Duration::minutes(i64::from(minutes)),
        });
        if let Err(e) = self.blocker.block(&self.sites) {
            tracing::error!("error blocking sites: {e}");
        }
        tracing::info!(minutes, "focus session started");
        true
    }

    /// End the running session early; false if none is running
    pub fn end(&mut self, now: NaiveDateTime) -> bool {
        self.tick(now);
        if self.session.is_none() {
            return false;
        }
        self.finish();
        true
    }

    /// Expire the session once its time is up. Returns true if it just ended.
    pub fn tick(&mut self, now: NaiveDateTime) -> bool {
        match self.session {
            Some(session) if now >= session.ends_at => {
                self.finish();
                true
            }
            _ => false,
        }
    }

    fn finish(&mut self) {
        self.session = None;
        if let Err(e) = self.blocker.unblock() {
            tracing::error!("error unblocking sites: {e}");
        }
        tracing::info!("focus session ended");
    }

    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        self.session.is_some_and(|s| now < s.ends_at)
    }

    pub fn status(&self, now: NaiveDateTime) -> FocusStatus {
        let remaining = self
            .session
            .map(|s| s.ends_at - now)
            .filter(|left| *left > Duration::zero());
        FocusStatus {
            is_active: remaining.is_some(),
            blocked_sites_count: self.sites.len(),
            remaining,
        }
    }
}

/// Lower-case a domain and strip scheme, `www.`, path and port
pub fn normalize_domain(input: &str) -> Option<String> {
    let mut s = input.trim().to_lowercase();
    if let Some(idx) = s.find("://") {
        s = s[idx + 3..].to_string();
    }
    let host = s.split(['/', '?', '#']).next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host).trim_matches('.');
    if host.is_empty() || host.contains(char::is_whitespace) {
        return None;
    }
    Some(host.to_string())
}

/// "mm:ss" for a remaining session time
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
