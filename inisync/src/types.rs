//! Core types shared by the pipeline stages.
//! The remote reader and the INI decoder produce these; the merger, layering
//! engine, encoder and differ consume them.

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::Error, traits::Parser};

/// Key to winning entry, ordered by key code point.
pub type MergedMapping = BTreeMap<String, Entry>;

/// Key to replacement text.
pub type OverrideMapping = BTreeMap<String, String>;

/// A file listed by the remote translation service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    /// Monotonically issued identifier; higher is newer.
    pub id: i64,
    /// Display name, possibly prefixed with its folder (`folder/name.json`).
    pub name: String,
    /// Folder/category label.
    #[serde(default)]
    pub folder: String,
    pub created_at: DateTime<Utc>,
}

impl SourceFile {
    /// File name without folder prefix and `.json` suffix.
    pub fn display_stem(&self) -> &str {
        display_stem(&self.name)
    }
}

impl Display for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {} (folder: {}, created: {})",
            self.id,
            self.name,
            self.folder,
            self.created_at.to_rfc3339()
        )
    }
}

/// Strips everything up to the last `/` and a trailing `.json`.
///
/// ```rust
/// assert_eq!(inisync::types::display_stem("override-rules/pinyin.json"), "pinyin");
/// assert_eq!(inisync::types::display_stem("plain"), "plain");
/// ```
pub fn display_stem(name: &str) -> &str {
    let base = name.rsplit('/').next().unwrap_or(name);
    base.strip_suffix(".json").unwrap_or(base)
}

/// Checks that `name` can be used as a single path component.
///
/// Rendering directory names come from remote file names, so `..`, `.`
/// and anything with a separator must never reach the filesystem.
pub fn validate_file_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("File name cannot be empty".to_string());
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(format!("File name must not contain a path: {}", name));
    }
    Ok(())
}

/// One translation record as served by the remote per-file endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RemoteEntry {
    pub key: String,
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub context: Option<String>,
    pub id: i64,
}

/// A translation entry, either fetched or decoded from a rendered document.
///
/// Serialized as the snapshot record: decoded entries carry
/// `key, original, translation, context`; fetched entries carry
/// `key, original, translation, id, fileName`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub key: String,

    #[serde(default)]
    pub original: String,

    #[serde(default)]
    pub translation: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub context: Option<String>,

    /// Remote record id; absent for decoded entries.
    #[serde(rename = "id")]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub source_id: Option<i64>,

    /// Name of the remote file the entry came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub file_name: Option<String>,

    #[serde(skip)]
    pub source_created_at: Option<DateTime<Utc>>,
}

impl Entry {
    /// An entry decoded from a rendered document.
    pub fn decoded(key: impl Into<String>, original: impl Into<String>) -> Self {
        Entry {
            key: key.into(),
            original: original.into(),
            translation: String::new(),
            context: Some(String::new()),
            source_id: None,
            file_name: None,
            source_created_at: None,
        }
    }

    /// Tags a remote record with the file it was fetched from.
    pub fn from_remote(remote: RemoteEntry, file: &SourceFile) -> Self {
        Entry {
            key: remote.key,
            original: remote.original,
            translation: remote.translation,
            context: remote.context,
            source_id: Some(remote.id),
            file_name: Some(file.name.clone()),
            source_created_at: Some(file.created_at),
        }
    }

    /// The text this entry contributes to a rendering.
    pub fn text(&self, field: TextField) -> &str {
        match field {
            TextField::Original => &self.original,
            TextField::Translation => &self.translation,
            TextField::TranslationOrOriginal if self.translation.is_empty() => &self.original,
            TextField::TranslationOrOriginal => &self.translation,
        }
    }
}

impl Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Entry {{ key: {}, original: {}, id: {:?} }}",
            self.key, self.original, self.source_id
        )
    }
}

/// JSON snapshot: a pretty-printed array of entries.
impl Parser for Vec<Entry> {
    fn from_reader<R: std::io::BufRead>(reader: R) -> Result<Self, Error> {
        serde_json::from_reader(reader).map_err(Error::Parse)
    }

    fn to_writer<W: std::io::Write>(&self, mut writer: W) -> Result<(), Error> {
        serde_json::to_writer_pretty(&mut writer, self).map_err(Error::Parse)?;
        writer.write_all(b"\n").map_err(Error::Io)
    }
}

/// Which entry field feeds a rendered value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextField {
    Original,
    Translation,
    /// Translation, or the original while the entry is still untranslated.
    #[default]
    TranslationOrOriginal,
}

impl FromStr for TextField {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "original" => Ok(TextField::Original),
            "translation" => Ok(TextField::Translation),
            "translation-or-original" => Ok(TextField::TranslationOrOriginal),
            other => Err(Error::InvalidConfig(format!("unknown text field `{}`", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: i64, name: &str) -> SourceFile {
        SourceFile {
            id,
            name: name.to_string(),
            folder: String::new(),
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_display_stem_strips_folder_and_suffix() {
        assert_eq!(display_stem("override-rules/3d-replacement.json"), "3d-replacement");
        assert_eq!(display_stem("a/b/c.json"), "c");
        assert_eq!(display_stem("notes.txt"), "notes.txt");
        assert_eq!(file(1, "x/full.json").display_stem(), "full");
    }

    #[test]
    fn test_validate_file_name_rejects_paths() {
        assert!(validate_file_name("pinyin").is_ok());
        assert!(validate_file_name("3d-replacement").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("  ").is_err());
        assert!(validate_file_name(".").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name("a/b").is_err());
        assert!(validate_file_name("..\\evil").is_err());
        assert_eq!(display_stem("override-rules/...json"), "..");
        assert!(validate_file_name(display_stem("override-rules/...json")).is_err());
    }

    #[test]
    fn test_text_field_fallback() {
        let mut entry = Entry::decoded("k", "Hello");
        assert_eq!(entry.text(TextField::TranslationOrOriginal), "Hello");
        assert_eq!(entry.text(TextField::Translation), "");
        entry.translation = "你好".to_string();
        assert_eq!(entry.text(TextField::TranslationOrOriginal), "你好");
        assert_eq!(entry.text(TextField::Original), "Hello");
    }

    #[test]
    fn test_decoded_snapshot_shape() {
        let json = serde_json::to_value(Entry::decoded("k", "v")).unwrap();
        let fields: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(fields, vec!["context", "key", "original", "translation"]);
    }

    #[test]
    fn test_reference_snapshot_shape() {
        let remote = RemoteEntry {
            key: "k".to_string(),
            original: "Hello".to_string(),
            translation: "你好".to_string(),
            context: None,
            id: 42,
        };
        let entry = Entry::from_remote(remote, &file(7, "ui/main.json"));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["id"], 42);
        assert_eq!(json["fileName"], "ui/main.json");
        assert!(json.get("context").is_none());
        assert!(json.get("sourceCreatedAt").is_none());
    }

    #[test]
    fn test_source_file_deserializes_camel_case() {
        let json = r#"{
            "id": 3,
            "name": "a.json",
            "folder": "ui",
            "createdAt": "2024-05-01T10:00:00.000Z"
        }"#;
        let parsed: SourceFile = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.id, 3);
        assert_eq!(parsed.folder, "ui");
    }

    #[test]
    fn test_snapshot_parser_round_trip() {
        let entries = vec![Entry::decoded("a", "1"), Entry::decoded("b", "ü")];
        let mut out = Vec::new();
        entries.to_writer(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"ü\""));
        let parsed = <Vec<Entry> as Parser>::from_str(&text).unwrap();
        assert_eq!(parsed, entries);
    }

    #[test]
    fn test_text_field_from_str() {
        assert_eq!("original".parse::<TextField>().unwrap(), TextField::Original);
        assert_eq!(
            "translation_or_original".parse::<TextField>().unwrap(),
            TextField::TranslationOrOriginal
        );
        assert!("nope".parse::<TextField>().is_err());
    }
}
