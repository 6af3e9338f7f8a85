//! Natural and surrogate keys.
//!
//! A dimension row is addressed two ways: by the source system's own
//! identifier (the natural key, e.g. `film_id`) and by the identifier the
//! mirror hands out (the surrogate key, e.g. `film_key`). Surrogate keys are
//! assigned monotonically and never reused.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Identifier of an entity in the source schema.
pub type NaturalKey = i64;

/// Identifier of a row in the mirror, stable for the row's lifetime.
pub type SurrogateKey = i64;

/// Natural keys touched by a dimension synchronizer in one run.
pub type ChangedKeys = BTreeSet<NaturalKey>;

/// One natural/surrogate pair as read back from a mirror table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub natural_key: NaturalKey,
    pub surrogate_key: SurrogateKey,
}

/// Mapping from natural key to surrogate key for one mirror table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMap {
    keys: HashMap<NaturalKey, SurrogateKey>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = KeyPair>) -> Self {
        Self {
            keys: pairs
                .into_iter()
                .map(|p| (p.natural_key, p.surrogate_key))
                .collect(),
        }
    }

    pub fn insert(&mut self, natural: NaturalKey, surrogate: SurrogateKey) {
        self.keys.insert(natural, surrogate);
    }

    /// Resolve a natural key, `None` when the mirror has no such row.
    pub fn get(&self, natural: NaturalKey) -> Option<SurrogateKey> {
        self.keys.get(&natural).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Largest surrogate key currently present.
    pub fn max_surrogate(&self) -> Option<SurrogateKey> {
        self.keys.values().copied().max()
    }

    /// Surrogate keys of the given natural keys, skipping unresolved ones.
    ///
    /// The result is sorted so the delete statements built from it are
    /// deterministic.
    pub fn resolve_all(&self, naturals: &ChangedKeys) -> Vec<SurrogateKey> {
        let mut keys: Vec<SurrogateKey> = naturals.iter().filter_map(|n| self.get(*n)).collect();
        keys.sort_unstable();
        keys
    }

    /// Inverse lookup, surrogate to natural.
    pub fn inverse(&self) -> HashMap<SurrogateKey, NaturalKey> {
        self.keys.iter().map(|(n, s)| (*s, *n)).collect()
    }
}

/// Key maps of every dimension, built once per run after the dimension
/// synchronizers have committed.
#[derive(Debug, Clone, Default)]
pub struct DimensionKeys {
    pub film: KeyMap,
    pub actor: KeyMap,
    pub category: KeyMap,
    pub store: KeyMap,
    pub customer: KeyMap,
}

/// Hands out surrogate keys above a high-water mark.
#[derive(Debug, Clone)]
pub struct KeyAllocator {
    last: SurrogateKey,
    issued: bool,
}

impl KeyAllocator {
    /// Start allocating at `high_water + 1`.
    pub fn starting_after(high_water: SurrogateKey) -> Self {
        Self {
            last: high_water.max(0),
            issued: false,
        }
    }

    pub fn allocate(&mut self) -> SurrogateKey {
        self.last += 1;
        self.issued = true;
        self.last
    }

    /// The last key handed out, if any was.
    pub fn high_water(&self) -> Option<SurrogateKey> {
        self.issued.then_some(self.last)
    }
}

/// Outcome of looking a natural key up before writing its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDecision {
    /// The row exists; overwrite it in place under this key.
    Existing(SurrogateKey),
    /// The row is new; insert it under this freshly allocated key.
    Fresh(SurrogateKey),
}

impl KeyDecision {
    pub fn key(&self) -> SurrogateKey {
        match self {
            KeyDecision::Existing(k) | KeyDecision::Fresh(k) => *k,
        }
    }
}

/// Create-or-update decisions for one mirror table.
///
/// Combines the table's current [`KeyMap`] with a [`KeyAllocator`] so that a
/// natural key seen before always gets its old surrogate back and an unseen
/// one gets a key no row has ever used.
#[derive(Debug, Clone)]
pub struct KeyAssigner {
    known: KeyMap,
    allocator: KeyAllocator,
}

impl KeyAssigner {
    /// `high_water` is the persisted sequence value for the table; the live
    /// keys are consulted as well in case the sequence lags behind them.
    pub fn new(known: KeyMap, high_water: SurrogateKey) -> Self {
        let floor = known.max_surrogate().unwrap_or(0).max(high_water);
        Self {
            known,
            allocator: KeyAllocator::starting_after(floor),
        }
    }

    pub fn assign(&mut self, natural: NaturalKey) -> KeyDecision {
        match self.known.get(natural) {
            Some(key) => KeyDecision::Existing(key),
            None => {
                let key = self.allocator.allocate();
                self.known.insert(natural, key);
                KeyDecision::Fresh(key)
            }
        }
    }

    /// New sequence value to persist, `None` if no key was allocated.
    pub fn high_water(&self) -> Option<SurrogateKey> {
        self.allocator.high_water()
    }
}
