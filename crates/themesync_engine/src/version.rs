//! Version tokens and their ordering.
//!
//! A token is an RFC3339 timestamp string. Anything that does not parse,
//! including the empty string, is the zero version, which orders before
//! every parsed timestamp.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::time::SystemTime;

/// A parsed version token. `Version::ZERO` sorts first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(Option<DateTime<Utc>>);

impl Version {
    /// The zero version: absent or unparsable token.
    pub const ZERO: Version = Version(None);

    /// Parses a token. Never fails; unparsable tokens are zero.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        Version(
            DateTime::parse_from_rfc3339(token.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc)),
        )
    }

    /// Parses an optional token; `None` is zero.
    #[must_use]
    pub fn parse_opt(token: Option<&String>) -> Self {
        token.map_or(Self::ZERO, |t| Self::parse(t))
    }

    /// Returns true for the zero version.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_none()
    }

    /// Returns true if `self` is strictly older than `other`.
    #[must_use]
    pub fn is_before(&self, other: &Version) -> bool {
        self < other
    }

    /// Renders the version for humans, e.g. `[Jan 2 3:04PM 2006]`.
    #[must_use]
    pub fn display_time(&self) -> String {
        match self.0 {
            Some(t) => format!("[{}]", t.format("%b %-d %-I:%M%p %Y")),
            None => "[never]".to_string(),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => Ok(()),
        }
    }
}

/// Formats a timestamp as a version token.
#[must_use]
pub fn token_from_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Version token for the current instant.
#[must_use]
pub fn token_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
