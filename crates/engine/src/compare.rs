//! Snapshot comparison
//!
//! Compares a reference snapshot against a fresh one in a fixed order:
//! metadata, then indexes, then documents. Sequences are checked for equal
//! length before they are compared pairwise, so a fresh capture that lost
//! entries is caught even when every remaining pair matches.
//!
//! [`first_mismatch`] stops at the first divergence; [`all_mismatches`]
//! walks everything and reports each one.

use serde_json::Value;

use strata_fidelity_core::{
    diff_documents, diff_values, Document, IndexDescriptor, Mismatch, MismatchKind,
};

use crate::normalize::NormalizationRuleSet;
use crate::snapshot::CollectionSnapshot;

/// First divergence between `reference` and `fresh`, if any
///
/// `rules` are applied to both metadata mappings before they are compared.
pub fn first_mismatch(
    reference: &CollectionSnapshot,
    fresh: &CollectionSnapshot,
    rules: &NormalizationRuleSet,
) -> Option<Mismatch> {
    let mut found = Vec::with_capacity(1);
    compare(reference, fresh, rules, true, &mut found);
    found.into_iter().next()
}

/// Every divergence between `reference` and `fresh`, in comparison order
pub fn all_mismatches(
    reference: &CollectionSnapshot,
    fresh: &CollectionSnapshot,
    rules: &NormalizationRuleSet,
) -> Vec<Mismatch> {
    let mut found = Vec::new();
    compare(reference, fresh, rules, false, &mut found);
    found
}

fn compare(
    reference: &CollectionSnapshot,
    fresh: &CollectionSnapshot,
    rules: &NormalizationRuleSet,
    fail_fast: bool,
    out: &mut Vec<Mismatch>,
) {
    let expected = rules.normalized(reference.metadata());
    let actual = rules.normalized(fresh.metadata());
    if expected != actual {
        let fields = diff_documents(&expected, &actual);
        out.push(Mismatch::whole(
            MismatchKind::Metadata,
            Value::Object(expected),
            Value::Object(actual),
            fields,
        ));
        if fail_fast {
            return;
        }
    }

    let index_json = |i: &IndexDescriptor| i.to_json();
    if !compare_sequence(
        MismatchKind::Indexes,
        reference.indexes(),
        fresh.indexes(),
        index_json,
        fail_fast,
        out,
    ) {
        return;
    }

    let document_json = |d: &Document| Value::Object(d.clone());
    compare_sequence(
        MismatchKind::Data,
        reference.documents(),
        fresh.documents(),
        document_json,
        fail_fast,
        out,
    );
}

/// Compare two sequences; returns `false` when a fail-fast comparison stopped
fn compare_sequence<T, F>(
    kind: MismatchKind,
    expected: &[T],
    actual: &[T],
    to_json: F,
    fail_fast: bool,
    out: &mut Vec<Mismatch>,
) -> bool
where
    T: PartialEq,
    F: Fn(&T) -> Value,
{
    if expected.len() != actual.len() {
        let unpaired = expected.len().min(actual.len());
        out.push(Mismatch::length(
            kind,
            expected.len(),
            actual.len(),
            expected.get(unpaired).map_or(Value::Null, &to_json),
            actual.get(unpaired).map_or(Value::Null, &to_json),
        ));
        if fail_fast {
            return false;
        }
    }

    for (position, (e, a)) in expected.iter().zip(actual).enumerate() {
        if e != a {
            let (e, a) = (to_json(e), to_json(a));
            let fields = diff_values(&e, &a);
            out.push(Mismatch::at(kind, position, e, a, fields));
            if fail_fast {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_fidelity_core::{IndexSpec, Metadata, MismatchSite, Namespace};

    fn obj(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn ns() -> Namespace {
        Namespace::new("test", "c")
    }

    fn snapshot(metadata: Value, indexes: &[&str], ids: &[i64]) -> CollectionSnapshot {
        let mut descriptors = vec![IndexDescriptor::primary(&ns())];
        for field in indexes {
            let mut key = Metadata::new();
            key.insert(field.to_string(), json!(1));
            descriptors.push(IndexDescriptor::from_spec(&ns(), &IndexSpec::new(key)));
        }
        let documents = ids.iter().map(|id| obj(json!({"_id": id, "v": id}))).collect();
        CollectionSnapshot::from_parts(ns(), obj(metadata), descriptors, documents)
    }

    #[test]
    fn test_identical_snapshots_match() {
        let s = snapshot(json!({"count": 2}), &["a"], &[0, 1]);
        assert!(first_mismatch(&s, &s.clone(), &NormalizationRuleSet::new()).is_none());
        assert!(all_mismatches(&s, &s, &NormalizationRuleSet::new()).is_empty());
    }

    #[test]
    fn test_metadata_mismatch_has_field_diffs() {
        let a = snapshot(json!({"count": 2, "size": 10}), &[], &[0, 1]);
        let b = snapshot(json!({"count": 2, "size": 12}), &[], &[0, 1]);
        let m = first_mismatch(&a, &b, &NormalizationRuleSet::new()).unwrap();
        assert_eq!(m.kind, MismatchKind::Metadata);
        assert_eq!(m.site, MismatchSite::Whole);
        assert_eq!(m.fields.len(), 1);
        assert_eq!(m.fields[0].path.to_path_string(), "size");
    }

    #[test]
    fn test_rules_apply_to_both_sides() {
        let a = snapshot(json!({"count": 2, "systemFlags": 1}), &[], &[0, 1]);
        let b = snapshot(json!({"count": 2, "capped": false}), &[], &[0, 1]);
        let rules = NormalizationRuleSet::comparison_defaults();
        assert!(first_mismatch(&a, &b, &rules).is_none());
        assert!(first_mismatch(&b, &a, &rules).is_none());
    }

    #[test]
    fn test_missing_index_is_a_length_mismatch() {
        let a = snapshot(json!({}), &["a", "b"], &[]);
        let b = snapshot(json!({}), &["a"], &[]);
        let m = first_mismatch(&a, &b, &NormalizationRuleSet::new()).unwrap();
        assert_eq!(m.kind, MismatchKind::Indexes);
        assert_eq!(m.site, MismatchSite::Length { expected: 3, actual: 2 });
        assert_eq!(m.expected["name"], json!("b_1"));
        assert_eq!(m.actual, Value::Null);
    }

    #[test]
    fn test_reference_longer_than_fresh_fails() {
        // Every pair that exists matches; only the count differs.
        let a = snapshot(json!({}), &[], &[0, 1, 2]);
        let b = snapshot(json!({}), &[], &[0, 1]);
        let m = first_mismatch(&a, &b, &NormalizationRuleSet::new()).unwrap();
        assert_eq!(m.kind, MismatchKind::Data);
        assert_eq!(m.expected["_id"], json!(2));
    }

    #[test]
    fn test_document_mismatch_position() {
        let a = snapshot(json!({}), &[], &[0, 1, 2]);
        let mut docs = a.documents().to_vec();
        docs[1].insert("v".to_string(), json!("changed"));
        let b = CollectionSnapshot::from_parts(
            ns(),
            a.metadata().clone(),
            a.indexes().to_vec(),
            docs,
        );
        let m = first_mismatch(&a, &b, &NormalizationRuleSet::new()).unwrap();
        assert_eq!(m.kind, MismatchKind::Data);
        assert_eq!(m.site, MismatchSite::Position(1));
        assert_eq!(m.fields[0].path.to_path_string(), "v");
        assert!(m.to_string().starts_with("data not equal at position 1"));
    }

    #[test]
    fn test_all_mismatches_reports_every_part() {
        let a = snapshot(json!({"count": 3}), &["a"], &[0, 1, 2]);
        let b = snapshot(json!({"count": 2}), &[], &[0, 1]);
        let kinds: Vec<MismatchKind> = all_mismatches(&a, &b, &NormalizationRuleSet::new())
            .into_iter()
            .map(|m| m.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![MismatchKind::Metadata, MismatchKind::Indexes, MismatchKind::Data]
        );
    }
}
