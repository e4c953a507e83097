//! Human-facing description of what a sync would change.

use std::fmt;

/// Lines describing created, updated and removed files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeDiff {
    /// Files the sync would bring back on the destination.
    pub created: Vec<String>,
    /// Files whose destination copy moved on since the source last synced.
    pub updated: Vec<String>,
    /// Files the destination no longer has.
    pub removed: Vec<String>,
}

impl ThemeDiff {
    /// Creates an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no file would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Total number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.removed.len()
    }
}

impl fmt::Display for ThemeDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No differences");
        }
        for (title, lines) in [
            ("Created", &self.created),
            ("Updated", &self.updated),
            ("Removed", &self.removed),
        ] {
            if lines.is_empty() {
                continue;
            }
            writeln!(f, "{title}:")?;
            for line in lines {
                writeln!(f, "  {line}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_diff() {
        let diff = ThemeDiff::new();
        assert!(diff.is_empty());
        assert_eq!(diff.len(), 0);
        assert_eq!(diff.to_string(), "No differences\n");
    }

    #[test]
    fn display_skips_empty_sections() {
        let diff = ThemeDiff {
            created: vec!["a.js [Jan 1 12:00AM 2021]".into()],
            updated: Vec::new(),
            removed: vec!["b.css [never]".into(), "c.css [never]".into()],
        };
        assert_eq!(diff.len(), 3);
        assert_eq!(
            diff.to_string(),
            "Created:\n  a.js [Jan 1 12:00AM 2021]\nRemoved:\n  b.css [never]\n  c.css [never]\n"
        );
    }
}
