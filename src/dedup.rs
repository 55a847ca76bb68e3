//! Duplicate-measurement detection and whole-mouse exclusion
//!
//! A genuine data-entry duplicate reproduces every column, so two rows
//! sharing a (mouse id, timepoint) pair are the effective duplicate test.
//! Any mouse owning at least one such pair is untrustworthy as a whole:
//! every row for that mouse is removed, not just the duplicated ones.

use crate::dataset::StudyRecord;
use std::collections::{BTreeSet, HashMap, HashSet};

/// The combined table with duplicate-carrying mice removed, plus the audit
/// set of excluded mouse ids.
#[derive(Debug, Clone)]
pub struct CleanDataset {
    pub records: Vec<StudyRecord>,
    pub excluded_mice: BTreeSet<String>,
}

impl CleanDataset {
    /// Distinct mice remaining after exclusion
    pub fn mouse_count(&self) -> usize {
        distinct_mouse_count(&self.records)
    }
}

/// Count distinct mouse ids in a record slice
pub fn distinct_mouse_count(records: &[StudyRecord]) -> usize {
    records
        .iter()
        .map(|r| r.mouse_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Collect mouse ids that have more than one row for the same timepoint
fn duplicate_mice(records: &[StudyRecord]) -> BTreeSet<String> {
    let mut seen: HashMap<(&str, u32), u32> = HashMap::new();
    for record in records {
        *seen.entry((record.mouse_id.as_str(), record.timepoint)).or_default() += 1;
    }
    seen.into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((mouse_id, _), _)| mouse_id.to_string())
        .collect()
}

/// Remove every row belonging to a mouse with any duplicate
/// (mouse id, timepoint) pair.
///
/// Idempotent: a second pass over the output excludes nothing further.
pub fn deduplicate(records: &[StudyRecord]) -> CleanDataset {
    let excluded_mice = duplicate_mice(records);
    let clean: Vec<StudyRecord> = records
        .iter()
        .filter(|r| !excluded_mice.contains(&r.mouse_id))
        .cloned()
        .collect();

    if !excluded_mice.is_empty() {
        tracing::warn!(
            excluded = excluded_mice.len(),
            rows_removed = records.len() - clean.len(),
            "excluded mice with duplicate timepoints"
        );
    }

    CleanDataset {
        records: clean,
        excluded_mice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(mouse_id: &str, timepoint: u32, tumor_volume: f32) -> StudyRecord {
        StudyRecord {
            mouse_id: mouse_id.to_string(),
            timepoint,
            tumor_volume,
            metastatic_sites: 0,
            info: None,
        }
    }

    #[test]
    fn test_no_duplicates_keeps_everything() {
        let records = vec![record("a1", 0, 45.0), record("a1", 5, 44.0), record("b2", 0, 45.0)];
        let clean = deduplicate(&records);
        assert_eq!(clean.records.len(), 3);
        assert!(clean.excluded_mice.is_empty());
    }

    #[test]
    fn test_duplicate_pair_removes_whole_mouse() {
        let records = vec![
            record("g989", 0, 45.0),
            record("g989", 0, 45.0),
            record("g989", 5, 43.0),
            record("a1", 0, 45.0),
        ];
        let clean = deduplicate(&records);
        // All three g989 rows go, not just the duplicated pair
        assert_eq!(clean.records.len(), 1);
        assert_eq!(clean.records[0].mouse_id, "a1");
        assert_eq!(
            clean.excluded_mice.iter().collect::<Vec<_>>(),
            vec!["g989"]
        );
    }

    #[test]
    fn test_same_mouse_distinct_timepoints_not_duplicate() {
        let records = vec![record("a1", 0, 45.0), record("a1", 5, 45.0)];
        let clean = deduplicate(&records);
        assert_eq!(clean.records.len(), 2);
    }

    #[test]
    fn test_clean_pairs_are_unique() {
        let records = vec![
            record("a1", 0, 45.0),
            record("a1", 0, 46.0),
            record("b2", 0, 45.0),
            record("b2", 5, 44.0),
        ];
        let clean = deduplicate(&records);
        let mut pairs = HashSet::new();
        for r in &clean.records {
            assert!(pairs.insert((r.mouse_id.clone(), r.timepoint)));
        }
    }

    #[test]
    fn test_mouse_count_arithmetic() {
        let records = vec![
            record("a1", 0, 45.0),
            record("b2", 0, 45.0),
            record("b2", 0, 45.0),
            record("c3", 0, 45.0),
        ];
        let total = distinct_mouse_count(&records);
        let clean = deduplicate(&records);
        assert_eq!(total, 3);
        assert_eq!(clean.mouse_count(), total - clean.excluded_mice.len());
    }

    #[test]
    fn test_deduplicate_is_idempotent() {
        let records = vec![
            record("a1", 0, 45.0),
            record("a1", 0, 45.0),
            record("b2", 0, 45.0),
        ];
        let once = deduplicate(&records);
        let twice = deduplicate(&once.records);
        assert_eq!(once.records, twice.records);
        assert!(twice.excluded_mice.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let clean = deduplicate(&[]);
        assert!(clean.records.is_empty());
        assert_eq!(clean.mouse_count(), 0);
    }
}
