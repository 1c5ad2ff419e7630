//! Pattern-hierarchy enforcement.
//!
//! After consolidation every account keeps at most one classification
//! class: cycles beat shells beat smurfing beat structuring beat velocity
//! beat low variance. Immunity tags and the isolation-cluster marker sit
//! outside the hierarchy and always survive.

use std::collections::BTreeMap;

use fraudgraph_core::{AccountId, PatternSet};

/// Reduce every account's label set to the always-kept labels plus its
/// single highest-priority classification class.
pub fn enforce_hierarchy(patterns: &mut BTreeMap<AccountId, PatternSet>) {
    for set in patterns.values_mut() {
        let mut kept = set.intersection(PatternSet::KEEP_ALWAYS);
        for class in PatternSet::HIERARCHY {
            let hit = set.intersection(class);
            if !hit.is_empty() {
                kept = kept.union(hit);
                break;
            }
        }
        *set = kept;
    }
}
