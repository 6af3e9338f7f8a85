//! Explicit write batches.
//!
//! A synchronizer never writes row by row. It plans a batch in memory and
//! hands the whole batch to the mirror, which applies it in one transaction.

use crate::keys::{KeyDecision, SurrogateKey};

/// A single planned write against a keyed mirror table.
#[derive(Debug, Clone, PartialEq)]
pub enum Write<R> {
    Insert(R),
    Update(R),
}

impl<R> Write<R> {
    pub fn record(&self) -> &R {
        match self {
            Write::Insert(r) | Write::Update(r) => r,
        }
    }

    pub fn into_record(self) -> R {
        match self {
            Write::Insert(r) | Write::Update(r) => r,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Write::Insert(_))
    }
}

/// Writes for a dimension or fact table.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch<R> {
    /// Delete every existing row of the table before writing.
    pub clear_first: bool,
    pub writes: Vec<Write<R>>,
    /// New surrogate key high-water mark, persisted with the batch.
    pub key_high_water: Option<SurrogateKey>,
}

impl<R> RecordBatch<R> {
    pub fn new(clear_first: bool) -> Self {
        Self {
            clear_first,
            writes: Vec::new(),
            key_high_water: None,
        }
    }

    /// Queue a record under the decision made for its natural key.
    ///
    /// When the table is cleared first every write becomes an insert, even
    /// for a key that existed before the clear.
    pub fn push(&mut self, decision: KeyDecision, record: R) {
        let write = match decision {
            KeyDecision::Existing(_) if !self.clear_first => Write::Update(record),
            _ => Write::Insert(record),
        };
        self.writes.push(write);
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn inserts(&self) -> usize {
        self.writes.iter().filter(|w| w.is_insert()).count()
    }

    pub fn updates(&self) -> usize {
        self.len() - self.inserts()
    }

    /// A batch that changes nothing need not reach the store.
    pub fn is_noop(&self) -> bool {
        !self.clear_first && self.writes.is_empty() && self.key_high_water.is_none()
    }
}

/// Deletes and inserts for a bridge table.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeBatch<R> {
    /// Delete every existing row of the table before inserting.
    pub clear_first: bool,
    /// Delete rows whose left key (film) is in this list.
    pub delete_left: Vec<SurrogateKey>,
    /// Delete rows whose right key (actor or category) is in this list.
    pub delete_right: Vec<SurrogateKey>,
    pub inserts: Vec<R>,
}

impl<R> BridgeBatch<R> {
    pub fn rebuild(inserts: Vec<R>) -> Self {
        Self {
            clear_first: true,
            delete_left: Vec::new(),
            delete_right: Vec::new(),
            inserts,
        }
    }

    pub fn scoped(delete_left: Vec<SurrogateKey>, delete_right: Vec<SurrogateKey>, inserts: Vec<R>) -> Self {
        Self {
            clear_first: false,
            delete_left,
            delete_right,
            inserts,
        }
    }
}
