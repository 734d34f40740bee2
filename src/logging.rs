//! Per-context log configuration.
//!
//! Messages are filtered by the context's [`LogLevel`](LogLevel) and
//! then handed to a user callback, or, if none is registered, to the
//! [`log`] facade under the `swo` target with the log domain prefixed.

use std::fmt;
use std::str::FromStr;

/// Maximum length of the log domain in bytes.
pub const LOG_DOMAIN_MAX_LENGTH: usize = 32;

/// Log domain used until another one is set.
pub const DEFAULT_LOG_DOMAIN: &str = "swo: ";

/// Log verbosity, ordered from least to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Output no messages.
    None,
    Error,
    Warning,
    Info,
    Debug,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Warning
    }
}

impl LogLevel {
    fn to_log(self) -> Option<log::Level> {
        match self {
            LogLevel::None => None,
            LogLevel::Error => Some(log::Level::Error),
            LogLevel::Warning => Some(log::Level::Warn),
            LogLevel::Info => Some(log::Level::Info),
            LogLevel::Debug => Some(log::Level::Debug),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid log level `{0}`; expected one of none, error, warning, info, debug")]
pub struct ParseLogLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(LogLevel::None),
            "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(ParseLogLevelError(s.to_owned())),
        }
    }
}

/// Receives every message that passes the level filter, pre-rendered.
pub type LogCallback<'a> = Box<dyn FnMut(LogLevel, &str) + 'a>;

pub(crate) struct Logger<'a> {
    level: LogLevel,
    domain: String,
    callback: Option<LogCallback<'a>>,
}

impl<'a> Logger<'a> {
    pub fn new() -> Self {
        Logger {
            level: LogLevel::default(),
            domain: DEFAULT_LOG_DOMAIN.to_owned(),
            callback: None,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Sets the domain, truncated to at most
    /// [`LOG_DOMAIN_MAX_LENGTH`](LOG_DOMAIN_MAX_LENGTH) bytes on a
    /// character boundary.
    pub fn set_domain(&mut self, domain: &str) {
        let mut end = domain.len().min(LOG_DOMAIN_MAX_LENGTH);
        while !domain.is_char_boundary(end) {
            end -= 1;
        }

        self.domain = domain[..end].to_owned();
    }

    pub fn set_callback(&mut self, callback: Option<LogCallback<'a>>) {
        self.callback = callback;
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None && level <= self.level
    }

    pub fn log(&mut self, level: LogLevel, args: fmt::Arguments) {
        if !self.enabled(level) {
            return;
        }

        match self.callback.as_mut() {
            Some(callback) => callback(level, &args.to_string()),
            None => {
                if let Some(level) = level.to_log() {
                    log::log!(target: "swo", level, "{}{}", self.domain, args);
                }
            }
        }
    }

    pub fn warn(&mut self, args: fmt::Arguments) {
        self.log(LogLevel::Warning, args);
    }

    pub fn debug(&mut self, args: fmt::Arguments) {
        self.log(LogLevel::Debug, args);
    }
}
