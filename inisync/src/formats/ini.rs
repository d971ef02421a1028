//! Support for the game's `global.ini` localization format.
//!
//! A document is a UTF-8 byte-order mark followed by `key=value\n` lines sorted
//! by key. Values are written verbatim: `=` inside a value is legal (readers
//! split on the first `=` only) and embedded newlines are not escaped.

use std::{
    borrow::Cow,
    io::{BufRead, Read},
};

use crate::{
    error::Error,
    traits::Parser,
    types::{Entry, MergedMapping, OverrideMapping, TextField},
};

/// UTF-8 byte-order mark prefixed to every rendered document.
pub const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

const NBSP_LEAD: u8 = 0xC2;
const NBSP_TAIL: u8 = 0xA0;

/// Represents a rendered `global.ini` document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    /// Key/value lines in file order.
    pub pairs: Vec<Pair>,
}

/// A single `key=value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub key: String,
    pub value: String,
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl Format {
    /// Renders `merged` with `overrides` substituted per key.
    ///
    /// Every merged key yields exactly one line; override keys that are not
    /// in `merged` are ignored.
    pub fn render(merged: &MergedMapping, overrides: &OverrideMapping, field: TextField) -> Self {
        // BTreeMap iteration is byte order, which for UTF-8 is code point order.
        let pairs = merged
            .iter()
            .map(|(key, entry)| Pair {
                key: key.clone(),
                value: overrides
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| entry.text(field).to_string()),
            })
            .collect();
        Format { pairs }
    }

    /// Serializes the document to bytes, BOM included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let capacity = self
            .pairs
            .iter()
            .map(|p| p.key.len() + p.value.len() + 2)
            .sum::<usize>();
        let mut out = Vec::with_capacity(BOM.len() + capacity);
        out.extend_from_slice(&BOM);
        for pair in &self.pairs {
            out.extend_from_slice(pair.key.as_bytes());
            out.push(b'=');
            out.extend_from_slice(pair.value.as_bytes());
            out.push(b'\n');
        }
        out
    }

    /// Decoded snapshot records, one per line.
    pub fn to_entries(&self) -> Vec<Entry> {
        self.pairs
            .iter()
            .map(|pair| Entry::decoded(pair.key.clone(), pair.value.clone()))
            .collect()
    }

    fn parse_text(text: &str) -> Self {
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
        let pairs = text
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once('=')?;
                Some(Pair {
                    key: key.trim().to_string(),
                    value: value.trim().to_string(),
                })
            })
            .collect();
        Format { pairs }
    }
}

/// Restores non-breaking spaces whose `0xC2` lead byte was stripped upstream.
///
/// Only *lone* `0xA0` bytes are touched: bytes that are already part of a
/// valid UTF-8 sequence (`C2 A0` itself, or a continuation byte of any other
/// character such as `à` = `C3 A0` or CJK text) are copied unchanged.
pub fn repair_nbsp(bytes: &[u8]) -> Cow<'_, [u8]> {
    if !needs_repair(bytes) {
        return Cow::Borrowed(bytes);
    }

    let mut out = Vec::with_capacity(bytes.len() + 16);
    for chunk in bytes.utf8_chunks() {
        out.extend_from_slice(chunk.valid().as_bytes());
        for &byte in chunk.invalid() {
            if byte == NBSP_TAIL {
                out.push(NBSP_LEAD);
            }
            out.push(byte);
        }
    }
    Cow::Owned(out)
}

fn needs_repair(bytes: &[u8]) -> bool {
    bytes
        .utf8_chunks()
        .any(|chunk| chunk.invalid().contains(&NBSP_TAIL))
}

impl Parser for Format {
    /// Repairs lone `0xA0` bytes, decodes as UTF-8 (invalid sequences are
    /// replaced, never rejected), skips the BOM and keeps every line that
    /// contains `=`, split on the first `=` with both sides trimmed.
    fn from_reader<R: BufRead>(mut reader: R) -> Result<Self, Error> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        let repaired = repair_nbsp(&raw);
        let (text, _had_errors) = encoding_rs::UTF_8.decode_with_bom_removal(&repaired);
        Ok(Format::parse_text(&text))
    }

    fn to_writer<W: std::io::Write>(&self, mut writer: W) -> Result<(), Error> {
        writer.write_all(&self.to_bytes()).map_err(Error::Io)
    }
}
