//! Child-list differences.

use std::collections::{HashMap, HashSet};

use arbor_core::DocumentId;

/// What changes when a child list is replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildDiff {
    /// Present now, absent from the desired list. These subtrees are deleted.
    pub detach: Vec<DocumentId>,
    /// Present in the desired list, absent now. These roots are attached.
    pub attach: Vec<DocumentId>,
}

impl ChildDiff {
    pub fn is_empty(&self) -> bool {
        self.detach.is_empty() && self.attach.is_empty()
    }
}

/// Multiset difference between the current and desired child lists.
///
/// Each id in `desired` cancels at most one equal id in `current`, so
/// repeated ids are matched pair by pair in list order. Both outputs keep
/// the order of their source list.
pub fn child_diff(current: &[DocumentId], desired: &[DocumentId]) -> ChildDiff {
    let mut wanted: HashMap<DocumentId, usize> = HashMap::new();
    for id in desired {
        *wanted.entry(*id).or_default() += 1;
    }

    let mut matched: HashMap<DocumentId, usize> = HashMap::new();
    let mut detach = Vec::new();
    for id in current {
        match wanted.get_mut(id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                *matched.entry(*id).or_default() += 1;
            }
            _ => detach.push(*id),
        }
    }

    let attach = desired
        .iter()
        .filter(|id| match matched.get_mut(*id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                false
            }
            _ => true,
        })
        .copied()
        .collect();

    ChildDiff { detach, attach }
}

/// First id that appears more than once, if any.
pub fn find_duplicate(ids: &[DocumentId]) -> Option<DocumentId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().find(|id| !seen.insert(*id))
}
