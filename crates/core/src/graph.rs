//! In-memory guarantee tree.
//!
//! Built from a snapshot of guarantee rows read inside the caller's
//! transaction. Walks are iterative and carry a visited set, so corrupted
//! data produces a broken chain rather than an endless loop.

use std::collections::{HashMap, HashSet, VecDeque};

use fediseer_db::entities::guarantee;

/// Result of walking guarantor links upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    /// The walk reached the root.
    Unbroken,
    /// The walk stopped at `breaker`, which has no guarantor (or closes a cycle).
    Broken { breaker: i32 },
}

impl ChainStatus {
    #[must_use]
    pub const fn is_unbroken(self) -> bool {
        matches!(self, Self::Unbroken)
    }
}

/// Guarantor/guaranteed adjacency anchored at a root.
#[derive(Debug, Clone, Default)]
pub struct GuaranteeTree {
    root_id: i32,
    parent: HashMap<i32, i32>,
    children: HashMap<i32, Vec<i32>>,
}

impl GuaranteeTree {
    /// Build from `(guarantor, guaranteed)` pairs.
    pub fn new(root_id: i32, edges: impl IntoIterator<Item = (i32, i32)>) -> Self {
        let mut parent = HashMap::new();
        let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
        for (guarantor, guaranteed) in edges {
            parent.insert(guaranteed, guarantor);
            if guarantor != guaranteed {
                children.entry(guarantor).or_default().push(guaranteed);
            }
        }
        Self {
            root_id,
            parent,
            children,
        }
    }

    /// Build from guarantee rows.
    #[must_use]
    pub fn from_models(root_id: i32, models: &[guarantee::Model]) -> Self {
        Self::new(
            root_id,
            models.iter().map(|g| (g.guarantor_id, g.guaranteed_id)),
        )
    }

    /// Direct guarantor of `id`. The root reports itself.
    #[must_use]
    pub fn guarantor_of(&self, id: i32) -> Option<i32> {
        self.parent.get(&id).copied()
    }

    #[must_use]
    pub fn has_guarantor(&self, id: i32) -> bool {
        id == self.root_id || self.parent.contains_key(&id)
    }

    /// Instances directly guaranteed by `id`.
    #[must_use]
    pub fn guarantees_of(&self, id: i32) -> &[i32] {
        self.children.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Walk guarantor links from `id` towards the root.
    #[must_use]
    pub fn chain_of(&self, id: i32) -> ChainStatus {
        let mut visited = HashSet::new();
        let mut current = id;
        loop {
            if current == self.root_id {
                return ChainStatus::Unbroken;
            }
            if !visited.insert(current) {
                tracing::warn!(instance_id = id, at = current, "Cycle in guarantee tree");
                return ChainStatus::Broken { breaker: current };
            }
            match self.parent.get(&current) {
                Some(&next) => current = next,
                None => return ChainStatus::Broken { breaker: current },
            }
        }
    }

    /// Every instance transitively guaranteed by `id`, breadth first.
    #[must_use]
    pub fn descendants(&self, id: i32) -> Vec<i32> {
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        let mut out = Vec::new();
        while let Some(node) = queue.pop_front() {
            for &child in self.guarantees_of(node) {
                if seen.insert(child) {
                    out.push(child);
                    queue.push_back(child);
                }
            }
        }
        out
    }

    /// Apply a guarantee to the snapshot.
    pub fn attach(&mut self, guarantor: i32, guaranteed: i32) {
        self.parent.insert(guaranteed, guarantor);
        self.children.entry(guarantor).or_default().push(guaranteed);
    }

    /// Remove the guarantee held by `guaranteed` from the snapshot.
    pub fn detach(&mut self, guaranteed: i32) {
        if let Some(guarantor) = self.parent.remove(&guaranteed) {
            if let Some(siblings) = self.children.get_mut(&guarantor) {
                siblings.retain(|&c| c != guaranteed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: i32 = 0;

    /// root(0) -> 1 -> 2 -> 3, root -> 4
    fn sample_tree() -> GuaranteeTree {
        GuaranteeTree::new(ROOT, [(0, 0), (0, 1), (1, 2), (2, 3), (0, 4)])
    }

    #[test]
    fn test_chain_reaches_root() {
        let tree = sample_tree();

        assert_eq!(tree.chain_of(0), ChainStatus::Unbroken);
        assert_eq!(tree.chain_of(3), ChainStatus::Unbroken);
        assert_eq!(tree.chain_of(4), ChainStatus::Unbroken);
    }

    #[test]
    fn test_unguaranteed_instance_is_its_own_breaker() {
        let tree = sample_tree();

        assert_eq!(tree.chain_of(9), ChainStatus::Broken { breaker: 9 });
        assert!(!tree.has_guarantor(9));
        assert!(tree.has_guarantor(ROOT));
    }

    #[test]
    fn test_withdraw_orphans_subtree() {
        let mut tree = sample_tree();
        tree.detach(2);

        assert_eq!(tree.chain_of(2), ChainStatus::Broken { breaker: 2 });
        assert_eq!(tree.chain_of(3), ChainStatus::Broken { breaker: 2 });
        assert_eq!(tree.chain_of(1), ChainStatus::Unbroken);
        assert_eq!(tree.descendants(2), vec![3]);
    }

    #[test]
    fn test_reattach_repairs_chain() {
        let mut tree = sample_tree();
        tree.detach(2);
        tree.attach(4, 2);

        assert!(tree.chain_of(3).is_unbroken());
        assert_eq!(tree.guarantor_of(2), Some(4));
        assert_eq!(tree.guarantees_of(1), &[] as &[i32]);
    }

    #[test]
    fn test_descendants_breadth_first() {
        let tree = GuaranteeTree::new(ROOT, [(0, 1), (1, 2), (1, 3), (2, 4), (3, 5)]);

        assert_eq!(tree.descendants(1), vec![2, 3, 4, 5]);
        assert!(tree.descendants(5).is_empty());
    }

    #[test]
    fn test_cycle_terminates() {
        // 5 -> 6 -> 7 -> 5, detached from the root
        let tree = GuaranteeTree::new(ROOT, [(5, 6), (6, 7), (7, 5)]);

        assert!(matches!(tree.chain_of(6), ChainStatus::Broken { .. }));
        let mut descendants = tree.descendants(5);
        descendants.sort_unstable();
        assert_eq!(descendants, vec![6, 7]);
    }

    #[test]
    fn test_every_guaranteed_instance_stays_chained_after_sequence() {
        let mut tree = GuaranteeTree::new(ROOT, [(0, 0)]);
        tree.attach(0, 1);
        tree.attach(1, 2);
        tree.attach(2, 3);
        tree.detach(2);
        tree.attach(0, 2);

        for id in [1, 2, 3] {
            assert!(tree.chain_of(id).is_unbroken(), "instance {id}");
        }
    }
}
