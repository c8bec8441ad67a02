//! Tab domain model

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};
use time::{Duration, OffsetDateTime};

/// Tab identifier, allocated once per tab and never reused
pub type TabId = i64;

/// Structured record describing a tab. Its presence in the metadata store is
/// what makes a tab exist; binary content without one is orphaned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabMetadata {
    pub id: TabId,
    pub title: String,
    pub artist: String,
    /// Key of the binary content in whichever backend holds it
    pub filename: String,
    pub original_filename: String,
    /// Millisecond precision, stored as `2025-09-26T07:29:56.450Z`
    #[serde(with = "millis_timestamp")]
    pub created_at: OffsetDateTime,
    pub public: bool,
}

impl TabMetadata {
    pub fn new(id: TabId, title: String, artist: String, filename: String) -> Self {
        Self {
            id,
            title,
            artist,
            original_filename: filename.clone(),
            filename,
            created_at: truncate_to_millis(OffsetDateTime::now_utc()),
            public: false,
        }
    }

    pub fn with_original_filename(mut self, original_filename: String) -> Self {
        self.original_filename = original_filename;
        self
    }

    pub fn with_created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = truncate_to_millis(created_at);
        self
    }

    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    /// Lowercased extension of the stored filename, if any
    pub fn format_key(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

/// Binary tab content as stored in a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabFile {
    pub filename: String,
    pub data: Vec<u8>,
}

impl TabFile {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }
}

/// Reject filenames that are not a single plain path component.
///
/// Filenames double as filesystem keys under per-tab directories.
pub fn validate_filename(filename: &str) -> Result<()> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !filename.contains(['/', '\\']) => Ok(()),
        _ => Err(Error::InvalidFilename(filename.to_string())),
    }
}

/// Parse an RFC 3339 timestamp such as `2025-09-26T07:29:56.450Z`
pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .map_err(|e| Error::InvalidTimestamp(format!("{value}: {e}")))
}

fn truncate_to_millis(value: OffsetDateTime) -> OffsetDateTime {
    value - Duration::nanoseconds(i64::from(value.nanosecond() % 1_000_000))
}

/// UTC timestamps with exactly three fractional digits. Any RFC 3339 value is
/// accepted on read.
mod millis_timestamp {
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::macros::format_description;
    use time::{OffsetDateTime, UtcOffset};

    pub fn serialize<S: Serializer>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let text = value
            .to_offset(UtcOffset::UTC)
            .format(format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
            ))
            .map_err(S::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_timestamp(&text).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_uses_camel_case_keys() {
        let created_at = parse_timestamp("2025-09-26T07:29:56.450Z").unwrap();
        let tab = TabMetadata::new(7, "Song".into(), "Artist".into(), "tab.gp".into())
            .with_original_filename("Song (Bass).gp".into())
            .with_created_at(created_at);

        let value = serde_json::to_value(&tab).unwrap();
        assert_eq!(value["originalFilename"], "Song (Bass).gp");
        assert_eq!(value["public"], false);
        assert_eq!(value["createdAt"], "2025-09-26T07:29:56.450Z");

        let parsed: TabMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, tab);
    }

    #[test]
    fn test_format_key() {
        let tab = TabMetadata::new(1, "t".into(), "a".into(), "Tab.GP5".into());
        assert_eq!(tab.format_key().as_deref(), Some("gp5"));

        let tab = TabMetadata::new(1, "t".into(), "a".into(), "README".into());
        assert_eq!(tab.format_key(), None);
    }

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("tab.gp").is_ok());
        assert!(validate_filename("汐れいら-ハレの日に.gp").is_ok());
        assert!(validate_filename("").is_err());
        assert!(validate_filename("..").is_err());
        assert!(validate_filename("a/b.gp").is_err());
        assert!(validate_filename("/etc/passwd").is_err());
    }

    #[test]
    fn test_created_at_is_stored_in_milliseconds() {
        let tab = TabMetadata::new(1, "t".into(), "a".into(), "tab.gp".into());
        assert_eq!(tab.created_at.nanosecond() % 1_000_000, 0);

        let offset = parse_timestamp("2025-09-26T16:29:56.450123+09:00").unwrap();
        let tab = tab.with_created_at(offset);
        let value = serde_json::to_value(&tab).unwrap();
        assert_eq!(value["createdAt"], "2025-09-26T07:29:56.450Z");

        let parsed: TabMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, tab);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
    }
}
