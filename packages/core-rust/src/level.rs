use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity of a log record.
///
/// Declaration order is severity order: `Error` is the most severe and
/// compares lowest, `Debug` the least severe and compares highest. A record
/// passes a threshold when `record.level <= threshold`.
///
/// Serializes as the lowercase name; deserializes through [`FromStr`], so
/// `"WARN"` and `"warning"` are accepted wherever `"warn"` is.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum LogLevel {
    /// Failures that need attention.
    Error,
    /// Unexpected but recoverable conditions.
    Warn,
    /// Normal operational messages.
    #[default]
    Info,
    /// Request/response traffic.
    Http,
    /// Verbose diagnostics.
    Debug,
}

impl LogLevel {
    /// All levels from most to least severe.
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Http,
        LogLevel::Debug,
    ];

    /// Lowercase name used in serialized records and labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Http => "http",
            LogLevel::Debug => "debug",
        }
    }

    /// Numeric severity; lower is more severe.
    #[must_use]
    pub fn severity(self) -> u8 {
        self as u8
    }

    /// Returns `true` if a record at this level passes `threshold`.
    #[must_use]
    pub fn enabled_at(self, threshold: LogLevel) -> bool {
        self <= threshold
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a [`LogLevel`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0:?}")]
pub struct ParseLevelError(pub String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "http" => Ok(LogLevel::Http),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = ParseLevelError;

    fn try_from(value: String) -> Result<Self, ParseLevelError> {
        value.parse()
    }
}
