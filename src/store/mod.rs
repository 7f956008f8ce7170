//! Backing-store capability interface.
//!
//! The engine requires exactly five logical operations from the distributed
//! sorted key-value store it runs on: point read, batched per-row column
//! slice, bounded range scan over row keys, batched multi-row mutation, and
//! row removal. Everything about the wire client (connection setup,
//! transport retries, consistency levels) stays behind the implementor of
//! [`KeyValueStore`].
//!
//! A store holds named row groups; each row is identified by a byte-string
//! key and holds a sorted mapping from column name to column value. Range
//! scans return rows in ascending key order, which is what makes sorted term
//! enumeration possible.

pub mod memory;

pub use memory::MemoryStore;

use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

/// A row key in the backing store.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey(pub Vec<u8>);

impl RowKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for RowKey {
    fn from(bytes: Vec<u8>) -> Self {
        RowKey(bytes)
    }
}

impl fmt::Debug for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowKey({})", String::from_utf8_lossy(&self.0))
    }
}

/// Named row groups (column families) the index uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowGroup {
    /// Term-dictionary rows: one row per term, one column per document.
    Terms,
    /// Document rows: one row per document, one column per stored field.
    Docs,
}

/// One column of a row: name plus value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

/// Column filter for slice reads.
#[derive(Debug, Clone)]
pub enum SlicePredicate {
    /// Every column of the row.
    All,
    /// Only the named columns, in store order.
    Columns(Vec<Vec<u8>>),
}

/// A single column-level write or tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Put { column: Vec<u8>, value: Vec<u8> },
    Delete { column: Vec<u8> },
}

/// An accumulated multi-row mutation set, flushed as one store call.
///
/// Rows are kept sorted by key; the store applies the whole batch in one
/// request. Atomicity across rows is whatever the store provides for a
/// single batch call; the engine assumes nothing stronger.
#[derive(Debug, Default)]
pub struct MutationBatch {
    rows: BTreeMap<RowKey, BTreeMap<RowGroup, Vec<Mutation>>>,
}

impl MutationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, group: RowGroup, key: RowKey, mutation: Mutation) {
        self.rows.entry(key).or_default().entry(group).or_default().push(mutation);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows touched by the batch.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RowKey, &BTreeMap<RowGroup, Vec<Mutation>>)> {
        self.rows.iter()
    }
}

impl IntoIterator for MutationBatch {
    type Item = (RowKey, BTreeMap<RowGroup, Vec<Mutation>>);
    type IntoIter = std::collections::btree_map::IntoIter<RowKey, BTreeMap<RowGroup, Vec<Mutation>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// The narrow capability interface the index requires from its store.
///
/// Every call is one blocking round trip. Transport failures surface as
/// [`crate::Error::Store`]; the engine never retries them and never caches
/// partial results from a failed call.
pub trait KeyValueStore {
    /// Point read of one column. `Ok(None)` when the row or column is absent.
    fn get(&self, group: RowGroup, key: &RowKey, column: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Batched per-row column slice. Rows absent from the store are simply
    /// absent from the result; that is not an error.
    fn multi_get_slice(
        &self,
        group: RowGroup,
        keys: &[RowKey],
        predicate: &SlicePredicate,
    ) -> Result<Vec<(RowKey, Vec<Column>)>>;

    /// Bounded range scan: up to `limit` rows with keys in `[start, end)`,
    /// ascending, each with its full column set.
    fn range_slices(
        &self,
        group: RowGroup,
        start: &RowKey,
        end: &RowKey,
        limit: usize,
    ) -> Result<Vec<(RowKey, Vec<Column>)>>;

    /// Apply a multi-row mutation batch in one request.
    fn batch_mutate(&self, batch: MutationBatch) -> Result<()>;

    /// Remove an entire row.
    fn remove_row(&self, group: RowGroup, key: &RowKey) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_accumulates_per_row_and_group() {
        let mut batch = MutationBatch::new();
        let key = RowKey(b"ix\xff\xffdoc1".to_vec());
        batch.add(
            RowGroup::Docs,
            key.clone(),
            Mutation::Put { column: b"title".to_vec(), value: b"a".to_vec() },
        );
        batch.add(RowGroup::Docs, key.clone(), Mutation::Delete { column: b"old".to_vec() });
        batch.add(
            RowGroup::Terms,
            key.clone(),
            Mutation::Put { column: b"d1".to_vec(), value: vec![] },
        );

        assert_eq!(batch.row_count(), 1);
        let (_, groups) = batch.iter().next().unwrap();
        assert_eq!(groups[&RowGroup::Docs].len(), 2);
        assert_eq!(groups[&RowGroup::Terms].len(), 1);
    }

    #[test]
    fn test_rows_iterate_in_key_order() {
        let mut batch = MutationBatch::new();
        for key in [b"c".to_vec(), b"a".to_vec(), b"b".to_vec()] {
            batch.add(RowGroup::Docs, RowKey(key), Mutation::Delete { column: vec![] });
        }
        let keys: Vec<_> = batch.iter().map(|(k, _)| k.0.clone()).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }
}
