//! On-disk text layout of the ledger.
//!
//! ```text
//! # THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
//! {
//!   "assets/app.js": {
//!     "production": "2021-01-01T00:00:00Z"
//!   }
//! }
//! ```
//!
//! The first line holds the comment, the remainder is a JSON object of
//! collections. Keys are written sorted so the file diffs cleanly.

use crate::store::Snapshot;

/// Marker that starts the comment line.
const COMMENT_PREFIX: &str = "#";

/// Decoded file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Contents {
    pub comment: String,
    pub entries: Snapshot,
}

/// Renders contents into the file text.
pub(crate) fn encode(contents: &Contents) -> Result<String, serde_json::Error> {
    let body = serde_json::to_string_pretty(&contents.entries)?;
    let mut text = String::with_capacity(body.len() + contents.comment.len() + 4);
    if !contents.comment.is_empty() {
        text.push_str(COMMENT_PREFIX);
        text.push(' ');
        text.push_str(&contents.comment);
        text.push('\n');
    }
    text.push_str(&body);
    text.push('\n');
    Ok(text)
}

/// Parses file text. The error string describes why the text is malformed.
pub(crate) fn decode(text: &str) -> Result<Contents, String> {
    let mut comment = String::new();
    let mut body = text;

    if let Some(rest) = text.strip_prefix(COMMENT_PREFIX) {
        let (line, remainder) = rest.split_once('\n').unwrap_or((rest, ""));
        comment = line.trim().to_string();
        body = remainder;
    }

    if body.trim().is_empty() {
        return Ok(Contents {
            comment,
            entries: Snapshot::new(),
        });
    }

    let entries: Snapshot = serde_json::from_str(body).map_err(|e| e.to_string())?;
    if let Some(collection) = entries.keys().find(|c| c.is_empty()) {
        return Err(format!("empty collection name {collection:?}"));
    }
    if entries.values().any(|keys| keys.contains_key("")) {
        return Err("empty key name".to_string());
    }

    Ok(Contents { comment, entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Contents {
        let mut entries = Snapshot::new();
        entries
            .entry("assets/app.js".to_string())
            .or_default()
            .insert("production".to_string(), "2021-01-01T00:00:00Z".to_string());
        Contents {
            comment: "generated".to_string(),
            entries,
        }
    }

    #[test]
    fn comment_is_first_line() {
        let text = encode(&sample()).unwrap();
        assert!(text.starts_with("# generated\n{"));
    }

    #[test]
    fn decode_reads_what_encode_wrote() {
        let contents = sample();
        let decoded = decode(&encode(&contents).unwrap()).unwrap();
        assert_eq!(decoded, contents);
    }

    #[test]
    fn blank_text_is_empty() {
        assert_eq!(decode("").unwrap(), Contents::default());
        assert_eq!(decode("   \n").unwrap(), Contents::default());
    }

    #[test]
    fn comment_without_body() {
        let decoded = decode("# only a banner").unwrap();
        assert_eq!(decoded.comment, "only a banner");
        assert!(decoded.entries.is_empty());
    }

    #[test]
    fn body_without_comment() {
        let decoded = decode(r#"{"a.css": {"dev": "x"}}"#).unwrap();
        assert!(decoded.comment.is_empty());
        assert_eq!(decoded.entries["a.css"]["dev"], "x");
    }

    #[test]
    fn malformed_body_rejected() {
        assert!(decode("# banner\nnot json").is_err());
        assert!(decode("# banner\n[1, 2, 3]").is_err());
        assert!(decode(r#"{"a.css": {"dev": 12}}"#).is_err());
        assert!(decode(r#"{"": {"dev": "x"}}"#).is_err());
        assert!(decode(r#"{"a.css": {"": "x"}}"#).is_err());
    }
}
