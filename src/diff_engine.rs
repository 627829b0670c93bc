//! Keyed diffing with an O(n log n) LIS pass for minimal moves
use crate::errors::ReconcilerError;
use crate::types::{EditScript, Move};
use log::{trace, warn};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

/// Positional diff of two key sequences. Never reports mutations: callers
/// reload items whose containing section changed.
pub fn diff<K>(previous: &[K], current: &[K]) -> EditScript
where
    K: Eq + Hash + Debug,
{
    let prev_keys: Vec<&K> = previous.iter().collect();
    let curr_keys: Vec<&K> = current.iter().collect();
    DiffEngine::new(&prev_keys, &curr_keys).run().0
}

/// Diff of two element sequences matched by `key_of`. A matched pair for which
/// `same_content` is false lands in `mutations` under its previous index, in
/// addition to any move it needs.
pub fn diff_by<'a, T, K, F, C>(
    previous: &'a [T],
    current: &'a [T],
    key_of: F,
    same_content: C,
) -> EditScript
where
    K: Eq + Hash + Debug,
    F: Fn(&'a T) -> K,
    C: Fn(&T, &T) -> bool,
{
    let prev_keys: Vec<K> = previous.iter().map(&key_of).collect();
    let curr_keys: Vec<K> = current.iter().map(&key_of).collect();
    let (mut script, matched) = DiffEngine::new(&prev_keys, &curr_keys).run();

    for (from, to) in matched {
        if !same_content(&previous[from], &current[to]) {
            script.mutations.insert(from);
        }
    }
    script
}

/// First repeated key, as `(first index, second index)`.
pub fn find_duplicate_key<K>(keys: &[K]) -> Option<(usize, usize)>
where
    K: Eq + Hash,
{
    let mut seen: HashMap<&K, usize> = HashMap::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        if let Some(&first) = seen.get(key) {
            return Some((first, i));
        }
        seen.insert(key, i);
    }
    None
}

/// Sibling keys must be unique for a diff to be meaningful.
pub fn check_unique_keys<K>(keys: &[K], scope: &str) -> Result<(), ReconcilerError>
where
    K: Eq + Hash + Debug,
{
    match find_duplicate_key(keys) {
        Some((first, second)) => Err(ReconcilerError::DuplicateKey {
            scope: scope.to_string(),
            key: format!("{:?}", keys[first]),
            first,
            second,
        }),
        None => Ok(()),
    }
}

struct DiffEngine<'a, K> {
    previous: &'a [K],
    current: &'a [K],
}

impl<'a, K> DiffEngine<'a, K>
where
    K: Eq + Hash + Debug,
{
    fn new(previous: &'a [K], current: &'a [K]) -> Self {
        DiffEngine { previous, current }
    }

    /// Returns the script plus every `(previous, current)` pair matched by key,
    /// in current order.
    fn run(&self) -> (EditScript, Vec<(usize, usize)>) {
        self.warn_on_duplicates();

        let mut script = EditScript::default();
        if self.previous.is_empty() && self.current.is_empty() {
            return (script, Vec::new());
        }

        let old_key_to_idx: HashMap<&K, usize> = self
            .previous
            .iter()
            .enumerate()
            .map(|(i, k)| (k, i))
            .collect();
        let new_set: HashSet<&K> = self.current.iter().collect();

        for (i, old_key) in self.previous.iter().enumerate() {
            if !new_set.contains(old_key) {
                script.removals.insert(i);
            }
        }

        let mut matched = Vec::with_capacity(self.current.len());
        for (j, new_key) in self.current.iter().enumerate() {
            match old_key_to_idx.get(new_key) {
                Some(&i) => matched.push((i, j)),
                None => {
                    script.inserts.insert(j);
                }
            }
        }

        // Survivors on the LIS of their old indices keep their relative order;
        // everything else moves.
        let old_order: Vec<usize> = matched.iter().map(|&(i, _)| i).collect();
        let stable = stable_old_indices(&old_order);

        script.moves.extend(
            matched
                .iter()
                .filter(|(from, _)| !stable.contains(from))
                .map(|&(from, to)| Move { from, to }),
        );

        trace!(
            "diff: {} -> {} keys, {} removed, {} inserted, {} moved",
            self.previous.len(),
            self.current.len(),
            script.removals.len(),
            script.inserts.len(),
            script.moves.len()
        );

        (script, matched)
    }

    fn warn_on_duplicates(&self) {
        for (label, keys) in [("previous", self.previous), ("current", self.current)] {
            if let Some((first, second)) = find_duplicate_key(keys) {
                warn!(
                    "diff: duplicate key {:?} in {} sequence at {} and {}; edit script is undefined",
                    keys[first], label, first, second
                );
            }
        }
    }
}

/// Old indices lying on one longest strictly increasing run through
/// `old_indices`, which lists the survivors' previous positions in current
/// order. Patience sorting with back links: O(n log n).
fn stable_old_indices(old_indices: &[usize]) -> HashSet<usize> {
    // piles[len - 1]: position of the smallest tail of any run of length `len`
    let mut piles: Vec<usize> = Vec::new();
    let mut back_links: Vec<Option<usize>> = Vec::with_capacity(old_indices.len());

    for (position, &old) in old_indices.iter().enumerate() {
        let pile = piles.partition_point(|&top| old_indices[top] < old);
        back_links.push(pile.checked_sub(1).map(|below| piles[below]));
        if pile == piles.len() {
            piles.push(position);
        } else {
            piles[pile] = position;
        }
    }

    let mut stable = HashSet::with_capacity(piles.len());
    let mut cursor = piles.last().copied();
    while let Some(position) = cursor {
        stable.insert(old_indices[position]);
        cursor = back_links[position];
    }
    stable
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn moves(pairs: &[(usize, usize)]) -> Vec<Move> {
        pairs.iter().map(|&(from, to)| Move { from, to }).collect()
    }

    #[test]
    fn rotation_moves_only_the_displaced_element() {
        let script = diff(&["a", "b", "c"], &["b", "c", "a"]);
        assert_eq!(script.moves, moves(&[(0, 2)]));
        assert!(script.removals.is_empty());
        assert!(script.inserts.is_empty());
        assert!(script.mutations.is_empty());
    }

    #[test]
    fn insert_in_the_middle_keeps_relative_order() {
        let script = diff(&["a", "b"], &["a", "c", "b"]);
        assert_eq!(script.inserts, BTreeSet::from([1]));
        assert!(script.removals.is_empty());
        assert!(script.moves.is_empty());
    }

    #[test]
    fn empty_to_nonempty_and_back() {
        let empty: [&str; 0] = [];
        let grow = diff(&empty, &["x", "y"]);
        assert_eq!(grow.inserts, BTreeSet::from([0, 1]));
        assert!(grow.removals.is_empty() && grow.moves.is_empty());

        let shrink = diff(&["x", "y"], &empty);
        assert_eq!(shrink.removals, BTreeSet::from([0, 1]));
        assert!(shrink.inserts.is_empty() && shrink.moves.is_empty());
    }

    #[test]
    fn identical_sequences_produce_empty_script() {
        let keys = [1, 2, 3, 4];
        assert!(diff(&keys, &keys).is_empty());
        let empty: [u8; 0] = [];
        assert!(diff(&empty, &empty).is_empty());
    }

    #[test]
    fn reversal_is_all_moves_but_one() {
        let script = diff(&[1, 2, 3, 4], &[4, 3, 2, 1]);
        assert!(script.removals.is_empty() && script.inserts.is_empty());
        assert_eq!(script.moves.len(), 3);
        let destinations: Vec<usize> = script.moves.iter().map(|m| m.to).collect();
        assert!(destinations.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn combined_insert_remove_move() {
        let previous = ["a", "b", "c", "d", "e"];
        let current = ["e", "a", "x", "c", "d"];
        let script = diff(&previous, &current);
        assert_eq!(script.removals, BTreeSet::from([1]));
        assert_eq!(script.inserts, BTreeSet::from([2]));
        assert_eq!(script.moves, moves(&[(4, 0)]));

        let rebuilt = script.apply_to(&previous, |j| current[j]);
        assert_eq!(rebuilt, Some(current.to_vec()));
    }

    #[test]
    fn diff_is_deterministic() {
        let previous = [5, 1, 9, 3, 7, 2];
        let current = [2, 7, 3, 11, 9, 1];
        let first = diff(&previous, &current);
        for _ in 0..10 {
            assert_eq!(diff(&previous, &current), first);
        }
    }

    #[test]
    fn diff_by_flags_content_changes_by_previous_index() {
        let previous = [("a", 1), ("b", 1), ("c", 1)];
        let current = [("c", 2), ("a", 1), ("b", 5)];
        let script = diff_by(&previous, &current, |e| e.0, |p, c| p.1 == c.1);
        assert_eq!(script.mutations, BTreeSet::from([1, 2]));
        assert_eq!(script.moves, moves(&[(2, 0)]));
    }

    #[test]
    fn stable_run_handles_edge_cases() {
        assert!(stable_old_indices(&[]).is_empty());
        assert_eq!(stable_old_indices(&[3]), HashSet::from([3]));
        assert_eq!(stable_old_indices(&[2, 0, 1]), HashSet::from([0, 1]));

        let order = [3, 1, 4, 0, 5, 9, 2, 6];
        let stable = stable_old_indices(&order);
        assert_eq!(stable.len(), 4);
        let kept: Vec<usize> = order.iter().copied().filter(|i| stable.contains(i)).collect();
        assert!(kept.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn duplicate_keys_are_reported() {
        assert_eq!(find_duplicate_key(&["a", "b", "a"]), Some((0, 2)));
        assert_eq!(find_duplicate_key(&["a", "b"]), None);
        let err = check_unique_keys(&["x", "x"], "section items").unwrap_err();
        assert!(matches!(
            err,
            ReconcilerError::DuplicateKey { first: 0, second: 1, .. }
        ));
    }
}
