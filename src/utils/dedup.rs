//! Deduplication of publications by exact title.

use std::collections::HashSet;

use crate::models::PublicationRecord;

/// Remove publications whose title was already seen
///
/// Titles are compared byte-for-byte: no case folding, no whitespace or
/// punctuation normalization. The first occurrence wins and the relative
/// order of kept records is preserved.
pub fn deduplicate_by_title(records: Vec<PublicationRecord>) -> Vec<PublicationRecord> {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let before = records.len();

    let kept: Vec<PublicationRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.title.clone()))
        .collect();

    if kept.len() < before {
        tracing::debug!("Dropped {} duplicate publications", before - kept.len());
    }

    kept
}
