//! Layering override rule files on top of the baseline override.

use crate::types::{Entry, OverrideMapping, TextField};

/// Builds the override mapping for one named rule file.
///
/// Baseline pairs are written first, then the rule's own pairs overwrite them
/// unconditionally. Within one layer a repeated key keeps its last value.
pub fn layer_overrides(baseline: &[Entry], rule: &[Entry], field: TextField) -> OverrideMapping {
    baseline
        .iter()
        .chain(rule)
        .fold(OverrideMapping::new(), |mut layered, entry| {
            layered.insert(entry.key.clone(), entry.text(field).to_string());
            layered
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str)]) -> Vec<Entry> {
        pairs.iter().map(|(k, v)| Entry::decoded(*k, *v)).collect()
    }

    #[test]
    fn test_rule_overrides_baseline() {
        let layered = layer_overrides(
            &entries(&[("a", "1"), ("b", "2")]),
            &entries(&[("b", "3"), ("c", "4")]),
            TextField::Original,
        );
        let expected: OverrideMapping = [("a", "1"), ("b", "3"), ("c", "4")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(layered, expected);
    }

    #[test]
    fn test_no_baseline_is_rule_only() {
        let layered = layer_overrides(&[], &entries(&[("x", "y")]), TextField::Original);
        assert_eq!(layered.len(), 1);
        assert_eq!(layered["x"], "y");
    }

    #[test]
    fn test_baseline_only() {
        let layered = layer_overrides(&entries(&[("x", "base")]), &[], TextField::Original);
        assert_eq!(layered["x"], "base");
        assert!(layer_overrides(&[], &[], TextField::Original).is_empty());
    }

    #[test]
    fn test_layer_reads_requested_field() {
        let mut rule = Entry::decoded("k", "orig");
        rule.translation = "trans".to_string();
        let layered = layer_overrides(&[], &[rule], TextField::Translation);
        assert_eq!(layered["k"], "trans");
    }
}
