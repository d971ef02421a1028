//! Format consistency checks between original and translated text.
//!
//! These do not judge the translation itself. They look for structure that
//! must survive translation unchanged: `~name(arg)` markup, line breaks, and
//! for item descriptions the numbers and percentages players rely on.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::Entry;

lazy_static! {
    static ref KEY_VALUE_REGEX: Regex = Regex::new(r"(?s)~\s*(\w+)\s*[\(（](.*?)[\)）]").unwrap();
    static ref PAREN_REGEX: Regex = Regex::new(r"[\(（]([^）\)]*)[）\)]").unwrap();
    static ref COLON_TO_EOL_REGEX: Regex = Regex::new(r"[:：]\s*([^\n\r]*)").unwrap();
    static ref PERCENT_REGEX: Regex = Regex::new(r"[+-]?\s*[0-9０-９]+\s*[%％]").unwrap();
    static ref TAG_REGEX: Regex = Regex::new(r"</?[^>]+>").unwrap();
    static ref LEADING_NUMBER_REGEX: Regex = Regex::new(r"^\s*([0-9０-９]+)").unwrap();
    static ref NUMBER_REGEX: Regex = Regex::new(r"[0-9０-９]+").unwrap();
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
    static ref FRACTION_WORDS: Vec<(Regex, &'static str)> = vec![
        (Regex::new(r"(?i)\bthree[\s-]?quarters\b").unwrap(), "75%"),
        (Regex::new(r"(?i)\btwo[\s-]?thirds\b").unwrap(), "67%"),
        (Regex::new(r"(?i)\b(?:a|one)\s+third\b").unwrap(), "33%"),
        (Regex::new(r"(?i)\b(?:a|one)\s+quarter\b").unwrap(), "25%"),
        (Regex::new(r"(?i)\b(?:a|one)?\s*half\b").unwrap(), "50%"),
    ];
}

/// Keys with this prefix get number and percentage checks.
pub const ITEM_KEY_PREFIX: &str = "item_";

/// Numbers found on each side, as ASCII digits without leading zeros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberSides {
    pub original: Vec<String>,
    pub translation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberMismatch {
    pub colon: NumberSides,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paren: Option<NumberSides>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentageMismatch {
    pub original_percentages_explicit: Vec<String>,
    pub translation_percentages: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub original_percentages_mapped_from_fraction_words: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewlineMismatch {
    pub original_newlines: usize,
    pub translation_newlines: usize,
}

/// One entry whose translation breaks the original's structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inconsistency {
    pub key: String,
    pub id: Option<i64>,
    pub original: String,
    pub translation: String,
    /// `~name(arg)` pairs present in the original but not the translation.
    pub original_mismatches: Vec<(String, String)>,
    /// `~name(arg)` pairs present in the translation but not the original.
    pub translation_mismatches: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_mismatches: Option<NumberMismatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_mismatches: Option<PercentageMismatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newline_mismatch: Option<NewlineMismatch>,
}

/// Checks every translated entry; untranslated entries are skipped.
pub fn check_consistency(entries: &[Entry]) -> Vec<Inconsistency> {
    entries.iter().filter_map(check_entry).collect()
}

/// Checks a single entry, `None` when it is consistent or untranslated.
pub fn check_entry(entry: &Entry) -> Option<Inconsistency> {
    let original = entry.original.as_str();
    let translation = entry.translation.as_str();
    if translation.is_empty() {
        return None;
    }

    let original_pairs = key_pairs(original);
    let translation_pairs = key_pairs(translation);
    let original_mismatches: Vec<_> = original_pairs
        .iter()
        .filter(|p| !translation_pairs.contains(p))
        .cloned()
        .collect();
    let translation_mismatches: Vec<_> = translation_pairs
        .iter()
        .filter(|p| !original_pairs.contains(p))
        .cloned()
        .collect();
    let compared_keys: BTreeSet<&str> = original_pairs
        .iter()
        .chain(&translation_pairs)
        .map(|(k, _)| k.as_str())
        .collect();

    let original_parts = InspectedParts::extract(original, &compared_keys);
    let translation_parts = InspectedParts::extract(translation, &compared_keys);

    let (number_mismatches, percentage_mismatches) = if entry.key.starts_with(ITEM_KEY_PREFIX) {
        (
            check_numbers(&original_parts, &translation_parts),
            check_percentages(&original_parts, &translation_parts, translation),
        )
    } else {
        (None, None)
    };

    let original_newlines = count_newlines(original);
    let translation_newlines = count_newlines(translation);
    let newline_mismatch = (original_newlines != translation_newlines).then_some(NewlineMismatch {
        original_newlines,
        translation_newlines,
    });

    let consistent = original_mismatches.is_empty()
        && translation_mismatches.is_empty()
        && number_mismatches.is_none()
        && percentage_mismatches.is_none()
        && newline_mismatch.is_none();
    if consistent {
        return None;
    }

    Some(Inconsistency {
        key: entry.key.clone(),
        id: entry.source_id,
        original: original.to_string(),
        translation: translation.to_string(),
        original_mismatches,
        translation_mismatches,
        number_mismatches,
        percentage_mismatches,
        newline_mismatch,
    })
}

/// Markers used to pair an item's type line across languages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTypeMarkers {
    pub original: String,
    pub translation: String,
}

impl Default for ItemTypeMarkers {
    fn default() -> Self {
        ItemTypeMarkers {
            original: "Item Type: ".to_string(),
            translation: "物品类型：".to_string(),
        }
    }
}

/// Reports item types translated inconsistently, and items whose translation
/// lacks the translated type marker.
pub fn check_item_types(entries: &[Entry], markers: &ItemTypeMarkers) -> Vec<String> {
    let mut type_map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for entry in entries.iter().filter(|e| !e.translation.is_empty()) {
        let en = entry.original.split_once(markers.original.as_str());
        let cn = entry.translation.split_once(markers.translation.as_str());
        if let (Some((_, en_rest)), Some((_, cn_rest))) = (en, cn) {
            type_map
                .entry(first_line(en_rest))
                .or_default()
                .insert(first_line(cn_rest));
        }
    }

    let mut issues: Vec<String> = type_map
        .iter()
        .filter(|(_, translated)| translated.len() > 1)
        .map(|(en_type, translated)| {
            format!(
                "English type '{}' corresponds to multiple translated types: {:?}",
                en_type, translated
            )
        })
        .collect();

    let missing: Vec<String> = entries
        .iter()
        .filter(|e| {
            e.original.contains(markers.original.as_str())
                && !e.translation.contains(markers.translation.as_str())
        })
        .map(|e| e.key.clone())
        .collect();
    if !missing.is_empty() {
        issues.push(format!(
            "Keys of original texts with '{}' but missing '{}' in translation:",
            markers.original, markers.translation
        ));
        issues.extend(missing);
    }
    issues
}

struct InspectedParts {
    colon: Vec<String>,
    paren: Vec<String>,
}

impl InspectedParts {
    /// Text after colons and inside parentheses, with already compared
    /// `~name(...)` blocks removed and markup tags unwrapped.
    fn extract(text: &str, compared_keys: &BTreeSet<&str>) -> Self {
        let mut cleaned = text.to_string();
        for key in compared_keys {
            let pattern = format!(r"(?s)~\s*{}\s*[\(（].*?[\)）]", regex::escape(key));
            if let Ok(block) = Regex::new(&pattern) {
                cleaned = block.replace_all(&cleaned, "").into_owned();
            }
        }
        InspectedParts {
            colon: COLON_TO_EOL_REGEX
                .captures_iter(&cleaned)
                .map(unwrap_tags)
                .collect(),
            paren: PAREN_REGEX.captures_iter(&cleaned).map(unwrap_tags).collect(),
        }
    }

    fn all(&self) -> impl Iterator<Item = &String> {
        self.colon.iter().chain(&self.paren)
    }
}

fn unwrap_tags(captures: regex::Captures<'_>) -> String {
    TAG_REGEX.replace_all(&captures[1], "").into_owned()
}

fn key_pairs(text: &str) -> Vec<(String, String)> {
    KEY_VALUE_REGEX
        .captures_iter(text)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

fn count_newlines(text: &str) -> usize {
    text.matches('\n').count() + text.matches("\\n").count()
}

fn first_line(text: &str) -> String {
    let text = text.replace("\\n", "\n");
    text.split('\n').next().unwrap_or_default().to_string()
}

/// Percentages with their sign kept and inner spaces removed: `"+ 40 %"` → `"+40%"`.
fn percentages<'a>(parts: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    parts
        .into_iter()
        .flat_map(|part| PERCENT_REGEX.find_iter(part))
        .map(|m| {
            WHITESPACE_REGEX
                .replace_all(m.as_str(), "")
                .chars()
                .map(fold_width)
                .collect()
        })
        .collect()
}

fn fraction_words<'a>(parts: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    parts
        .into_iter()
        .flat_map(|part| {
            let lower = part.to_lowercase();
            FRACTION_WORDS
                .iter()
                .filter(move |(re, _)| re.is_match(&lower))
                .map(|(_, pct)| pct.to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn check_percentages(
    original: &InspectedParts,
    translation: &InspectedParts,
    whole_translation: &str,
) -> Option<PercentageMismatch> {
    let explicit = percentages(original.all());
    let mut translated = percentages(translation.all());
    if !explicit.is_empty() && translated.is_empty() {
        let whole = TAG_REGEX.replace_all(whole_translation, "").into_owned();
        translated = percentages([&whole]);
    }
    let mapped = fraction_words(original.all());

    let drop_hundred = |list: &[String]| -> Vec<String> {
        list.iter()
            .filter(|p| p.trim_start_matches(['+', '-']) != "100%")
            .cloned()
            .collect()
    };
    let mut required = drop_hundred(explicit.as_slice());
    required.extend(mapped.iter().cloned());
    let got = drop_hundred(translated.as_slice());

    if is_sub_multiset(&required, &got) {
        return None;
    }
    Some(PercentageMismatch {
        original_percentages_explicit: explicit,
        translation_percentages: translated,
        original_percentages_mapped_from_fraction_words: mapped,
    })
}

fn check_numbers(
    original: &InspectedParts,
    translation: &InspectedParts,
) -> Option<NumberMismatch> {
    let colon = NumberSides {
        original: colon_numbers(&original.colon),
        translation: colon_numbers(&translation.colon),
    };
    let paren = NumberSides {
        original: paren_numbers(&original.paren),
        translation: paren_numbers(&translation.paren),
    };

    let colon_mismatch = counts(&colon.original) != counts(&colon.translation);
    // Parenthesized numbers only count when the original has some.
    let paren_mismatch =
        !paren.original.is_empty() && counts(&paren.original) != counts(&paren.translation);
    if !colon_mismatch && !paren_mismatch {
        return None;
    }
    Some(NumberMismatch {
        colon,
        paren: (!paren.original.is_empty()).then_some(paren),
    })
}

/// The number right after a colon, ignoring percentages; nothing if the text
/// after the colon starts with anything else.
fn colon_numbers(parts: &[String]) -> Vec<String> {
    parts
        .iter()
        .filter_map(|part| {
            let stripped = PERCENT_REGEX.replace_all(part, "");
            LEADING_NUMBER_REGEX
                .captures(&stripped)
                .map(|c| normalize_number(&c[1]))
        })
        .collect()
}

fn paren_numbers(parts: &[String]) -> Vec<String> {
    parts
        .iter()
        .flat_map(|part| {
            let stripped = PERCENT_REGEX.replace_all(part, "");
            NUMBER_REGEX
                .find_iter(&stripped)
                .map(|m| normalize_number(m.as_str()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Compared as text so that any length of digits is accepted.
fn normalize_number(digits: &str) -> String {
    let ascii: String = digits.chars().map(fold_width).collect();
    match ascii.trim_start_matches('0') {
        "" => "0".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Full-width digits and percent sign to their ASCII forms.
fn fold_width(c: char) -> char {
    match c {
        '０'..='９' => char::from_digit(c as u32 - '０' as u32, 10).unwrap_or(c),
        '％' => '%',
        other => other,
    }
}

fn counts<T: Eq + std::hash::Hash>(items: &[T]) -> HashMap<&T, usize> {
    let mut map = HashMap::new();
    for item in items {
        *map.entry(item).or_insert(0) += 1;
    }
    map
}

fn is_sub_multiset(required: &[String], got: &[String]) -> bool {
    let have = counts(got);
    counts(required)
        .iter()
        .all(|(item, n)| have.get(item).copied().unwrap_or(0) >= *n)
}
