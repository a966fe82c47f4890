//! Time and host-log abstractions.
//!
//! Snapshot timestamps come from an injectable [`Clock`] so tests can pin
//! them, and log records can be mirrored into the host's native log facility
//! (Logcat, os_log) through a [`LogSink`].

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wall-clock source.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Milliseconds since the Unix epoch.
    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Clock pinned to `millis` after the Unix epoch.
    pub fn from_millis(millis: i64) -> Self {
        Self(Utc.timestamp_millis_opt(millis).single().unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Severity of a host log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Single-letter tag as printed by Logcat.
    pub fn tag(&self) -> char {
        match self {
            LogLevel::Trace => 'V',
            LogLevel::Debug => 'D',
            LogLevel::Info => 'I',
            LogLevel::Warn => 'W',
            LogLevel::Error => 'E',
        }
    }
}

/// Log record forwarded to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Module path of the emitting code.
    pub target: String,
    pub message: String,
    /// Structured fields recorded alongside the message, sorted by name.
    pub fields: BTreeMap<String, String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// `message key=value ...` rendering used by line-oriented host logs.
    pub fn render(&self) -> String {
        let mut line = self.message.clone();
        for (key, value) in &self.fields {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            line.push_str(value);
        }
        line
    }
}

/// Host log facility.
///
/// Called from whatever thread emitted the record; implementations must not
/// block for long and must not log through `tracing` themselves.
pub trait LogSink: Send + Sync {
    fn log(&self, entry: LogEntry);

    /// Records below this level are dropped before reaching [`LogSink::log`].
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Sink printing Logcat-style lines to stderr.
#[derive(Debug, Clone)]
pub struct StderrLogSink {
    pub min_level: LogLevel,
}

impl Default for StderrLogSink {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

impl LogSink for StderrLogSink {
    fn log(&self, entry: LogEntry) {
        eprintln!(
            "{} {}/{}: {}",
            entry.timestamp.format("%m-%d %H:%M:%S%.3f"),
            entry.level.tag(),
            entry.target,
            entry.render()
        );
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
