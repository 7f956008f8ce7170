//! In-memory reference store.
//!
//! A `Mutex`-guarded pair of sorted maps implementing [`KeyValueStore`].
//! Used by the test suite, benches and doc examples; also the executable
//! definition of the semantics the engine expects from a real store
//! (ascending bounded range scans, per-call batch application, absent rows
//! silently missing from multi-get results).

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Mutex;

use super::{Column, KeyValueStore, Mutation, MutationBatch, RowGroup, RowKey, SlicePredicate};
use crate::error::Result;

type Row = BTreeMap<Vec<u8>, Vec<u8>>;
type Rows = BTreeMap<RowKey, Row>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Groups>,
}

#[derive(Debug, Default)]
struct Groups {
    terms: Rows,
    docs: Rows,
}

impl Groups {
    fn group(&self, group: RowGroup) -> &Rows {
        match group {
            RowGroup::Terms => &self.terms,
            RowGroup::Docs => &self.docs,
        }
    }

    fn group_mut(&mut self, group: RowGroup) -> &mut Rows {
        match group {
            RowGroup::Terms => &mut self.terms,
            RowGroup::Docs => &mut self.docs,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of live rows in a group. Test helper.
    pub fn row_count(&self, group: RowGroup) -> usize {
        self.inner.lock().unwrap().group(group).len()
    }
}

fn slice_columns(row: &Row, predicate: &SlicePredicate) -> Vec<Column> {
    match predicate {
        SlicePredicate::All => row
            .iter()
            .map(|(name, value)| Column { name: name.clone(), value: value.clone() })
            .collect(),
        SlicePredicate::Columns(names) => names
            .iter()
            .filter_map(|name| {
                row.get(name).map(|value| Column { name: name.clone(), value: value.clone() })
            })
            .collect(),
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, group: RowGroup, key: &RowKey, column: &[u8]) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.group(group).get(key).and_then(|row| row.get(column).cloned()))
    }

    fn multi_get_slice(
        &self,
        group: RowGroup,
        keys: &[RowKey],
        predicate: &SlicePredicate,
    ) -> Result<Vec<(RowKey, Vec<Column>)>> {
        let inner = self.inner.lock().unwrap();
        let rows = inner.group(group);
        Ok(keys
            .iter()
            .filter_map(|key| rows.get(key).map(|row| (key.clone(), slice_columns(row, predicate))))
            .collect())
    }

    fn range_slices(
        &self,
        group: RowGroup,
        start: &RowKey,
        end: &RowKey,
        limit: usize,
    ) -> Result<Vec<(RowKey, Vec<Column>)>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .group(group)
            .range((Bound::Included(start.clone()), Bound::Excluded(end.clone())))
            .take(limit)
            .map(|(key, row)| (key.clone(), slice_columns(row, &SlicePredicate::All)))
            .collect())
    }

    fn batch_mutate(&self, batch: MutationBatch) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for (key, groups) in batch {
            for (group, mutations) in groups {
                let rows = inner.group_mut(group);
                for mutation in mutations {
                    match mutation {
                        Mutation::Put { column, value } => {
                            rows.entry(key.clone()).or_default().insert(column, value);
                        }
                        Mutation::Delete { column } => {
                            if let Some(row) = rows.get_mut(&key) {
                                row.remove(&column);
                                if row.is_empty() {
                                    rows.remove(&key);
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn remove_row(&self, group: RowGroup, key: &RowKey) -> Result<()> {
        self.inner.lock().unwrap().group_mut(group).remove(key);
        Ok(())
    }
}
