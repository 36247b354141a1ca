//! Groups incoming ciphertexts by matching index so the server-visible
//! pairing step can run without learning anything about the grouped
//! contents.

use std::collections::HashMap;

use crate::errors::{MalformedEntry, MalformedKind};
use crate::model::EncryptedData;

/// Groups `entries` by `matching_index`. An empty or single-entry input is
/// reported wholesale as [`MalformedKind::NotEnoughMatches`] (there isn't
/// enough material to even attempt grouping). Otherwise, any index with
/// exactly one entry is reported as [`MalformedKind::MatchingIndexSingleton`]
/// rather than included in the returned groups; the remaining groups (if
/// any) still carry correctly matched pairs.
#[must_use]
pub fn bucket(entries: &[EncryptedData]) -> (Vec<Vec<&EncryptedData>>, Vec<MalformedEntry>) {
    if entries.len() < 2 {
        return (Vec::new(), vec![MalformedEntry::new("All", MalformedKind::NotEnoughMatches)]);
    }

    let mut by_index: HashMap<&str, Vec<&EncryptedData>> = HashMap::new();
    for entry in entries {
        by_index.entry(entry.matching_index.as_str()).or_default().push(entry);
    }

    let mut groups = Vec::new();
    let mut malformed = Vec::new();
    for group in by_index.into_values() {
        if group.len() == 1 {
            malformed.push(MalformedEntry::new(
                group[0].id.to_string(),
                MalformedKind::MatchingIndexSingleton,
            ));
        } else {
            groups.push(group);
        }
    }

    (groups, malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: uuid::Uuid, matching_index: &str) -> EncryptedData {
        EncryptedData {
            id,
            matching_index: matching_index.to_string(),
            e_oc: String::new(),
            e_user: String::new(),
            e_record: String::new(),
        }
    }

    #[test]
    fn singleton_is_flagged_and_pairs_survive() {
        let a = entry(uuid::Uuid::new_v4(), "pi-1");
        let b = entry(uuid::Uuid::new_v4(), "pi-1");
        let c = entry(uuid::Uuid::new_v4(), "pi-2");
        let entries = vec![a, b, c];

        let (groups, malformed) = bucket(&entries);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].error, MalformedKind::MatchingIndexSingleton);
    }

    #[test]
    fn empty_input_is_not_enough_matches() {
        let (groups, malformed) = bucket(&[]);
        assert!(groups.is_empty());
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].id, "All");
        assert_eq!(malformed[0].error, MalformedKind::NotEnoughMatches);
    }

    #[test]
    fn single_entry_input_is_not_enough_matches() {
        let entries = vec![entry(uuid::Uuid::new_v4(), "pi-1")];
        let (groups, malformed) = bucket(&entries);
        assert!(groups.is_empty());
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].error, MalformedKind::NotEnoughMatches);
    }
}
