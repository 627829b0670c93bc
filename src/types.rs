//! Value types shared by the diff engine, the coordinator and the view layer
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identity of a section or item across declaration passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(value) => write!(f, "{}", value),
            Key::Str(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value.into())
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Key::Int(value.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexPath {
    pub section: usize,
    pub item: usize,
}

impl IndexPath {
    pub fn new(section: usize, item: usize) -> Self {
        IndexPath { section, item }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Size = Size { width: 0.0, height: 0.0 };

    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }
}

/// A kept element that changed position. `from` indexes the previous
/// sequence, `to` the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub from: usize,
    pub to: usize,
}

/// Structural edits turning one ordered collection into another.
///
/// Removals and mutations index the previous collection, inserts the current
/// one. Moves are ordered by ascending destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditScript {
    pub removals: BTreeSet<usize>,
    pub inserts: BTreeSet<usize>,
    pub moves: Vec<Move>,
    pub mutations: BTreeSet<usize>,
}

impl EditScript {
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty()
            && self.inserts.is_empty()
            && self.moves.is_empty()
            && self.mutations.is_empty()
    }

    /// Replays the script against `previous` the way a batch update does:
    /// removed elements disappear, moved and inserted elements land on their
    /// destinations, and every other survivor fills the remaining slots in its
    /// previous order. `inserted` supplies the value for each insert index.
    ///
    /// Returns `None` if the script does not fit `previous`.
    pub fn apply_to<T: Clone>(
        &self,
        previous: &[T],
        mut inserted: impl FnMut(usize) -> T,
    ) -> Option<Vec<T>> {
        let len = previous
            .len()
            .checked_sub(self.removals.len())?
            .checked_add(self.inserts.len())?;
        let mut slots: Vec<Option<T>> = vec![None; len];

        let mut moved_from = HashSet::with_capacity(self.moves.len());
        for m in &self.moves {
            if self.removals.contains(&m.from) || !moved_from.insert(m.from) {
                return None;
            }
            let slot = slots.get_mut(m.to)?;
            if slot.is_some() {
                return None;
            }
            *slot = Some(previous.get(m.from)?.clone());
        }

        for &index in &self.inserts {
            let slot = slots.get_mut(index)?;
            if slot.is_some() {
                return None;
            }
            *slot = Some(inserted(index));
        }

        let mut survivors = previous
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.removals.contains(i) && !moved_from.contains(i))
            .map(|(_, value)| value.clone());

        let rebuilt: Option<Vec<T>> = slots
            .into_iter()
            .map(|slot| slot.or_else(|| survivors.next()))
            .collect();

        if survivors.next().is_some() {
            return None;
        }
        rebuilt
    }
}

/// Global ID generator (lock-free, atomic)
static ID_COUNTER: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(1));

/// Next process-wide identifier, used for observer tokens and reactive source ids.
pub fn next_id() -> u64 {
    ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}
