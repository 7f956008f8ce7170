//! Session-scoped document identity and norm state.
//!
//! The store addresses documents by opaque identifier bytes; consumers of
//! posting lists expect small dense integers. [`DocIdMap`] virtualizes one
//! into the other for the lifetime of a reader session: numbers are
//! one-based, assigned on first sight, stable until [`reset`], and never
//! reused before it. Numbering beyond the configured maximum is a fatal
//! capacity error.
//!
//! [`reset`]: SessionState::reset

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use ahash::AHashMap;

use crate::error::{Error, Result};

/// Bidirectional identifier ↔ document-number map.
#[derive(Debug)]
pub struct DocIdMap {
    max_docs: u32,
    counter: AtomicU32,
    inner: Mutex<MapInner>,
}

#[derive(Debug, Default)]
struct MapInner {
    by_id: AHashMap<Vec<u8>, u32>,
    by_num: AHashMap<u32, Vec<u8>>,
}

impl DocIdMap {
    pub fn new(max_docs: u32) -> Self {
        DocIdMap { max_docs, counter: AtomicU32::new(0), inner: Mutex::new(MapInner::default()) }
    }

    /// Number for an identifier, assigning the next dense number on first
    /// sight. The same identifier always yields the same number within one
    /// session.
    pub fn assign(&self, doc_id: &[u8]) -> Result<u32> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(&num) = inner.by_id.get(doc_id) {
            return Ok(num);
        }

        let num = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        if num > self.max_docs {
            return Err(Error::CapacityExceeded { max: self.max_docs });
        }

        inner.by_id.insert(doc_id.to_vec(), num);
        inner.by_num.insert(num, doc_id.to_vec());
        Ok(num)
    }

    pub fn number(&self, doc_id: &[u8]) -> Option<u32> {
        self.inner.lock().unwrap().by_id.get(doc_id).copied()
    }

    pub fn id(&self, num: u32) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().by_num.get(&num).cloned()
    }

    /// Number of documents seen this session.
    pub fn len(&self) -> u32 {
        self.inner.lock().unwrap().by_id.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.by_id.clear();
        inner.by_num.clear();
        self.counter.store(0, Ordering::Relaxed);
    }
}

/// Default norm byte: the encoding of normalization factor 1.0.
pub const DEFAULT_NORM: u8 = 124;

/// Per-field norm byte arrays, indexed by document number.
///
/// Arrays grow by doubling, capped at the session document limit. Absent
/// entries read as [`DEFAULT_NORM`]. Norms arrive as a side effect of
/// posting decode in the term scanner.
#[derive(Debug)]
pub struct Norms {
    max_docs: u32,
    inner: Mutex<AHashMap<String, Vec<u8>>>,
}

impl Norms {
    pub fn new(max_docs: u32) -> Self {
        Norms { max_docs, inner: Mutex::new(AHashMap::new()) }
    }

    pub fn record(&self, field: &str, doc: u32, norm: u8) {
        let mut inner = self.inner.lock().unwrap();
        let arr = inner.entry(field.to_string()).or_default();
        let idx = doc as usize;
        if idx >= arr.len() {
            let mut new_len = arr.len().max(16);
            while new_len <= idx {
                new_len *= 2;
            }
            new_len = new_len.min(self.max_docs as usize + 1);
            arr.resize(new_len, DEFAULT_NORM);
        }
        arr[idx] = norm;
    }

    /// Norm byte for one (field, document) pair.
    pub fn get(&self, field: &str, doc: u32) -> u8 {
        let inner = self.inner.lock().unwrap();
        inner.get(field).and_then(|arr| arr.get(doc as usize).copied()).unwrap_or(DEFAULT_NORM)
    }

    /// Snapshot of a field's norms sized for `doc_count` documents
    /// (index 0 is unused; numbers are one-based).
    pub fn snapshot(&self, field: &str, doc_count: u32) -> Vec<u8> {
        let len = doc_count as usize + 1;
        let mut out = vec![DEFAULT_NORM; len];
        let inner = self.inner.lock().unwrap();
        if let Some(arr) = inner.get(field) {
            let n = arr.len().min(len);
            out[..n].copy_from_slice(&arr[..n]);
        }
        out
    }

    fn reset(&self) {
        self.inner.lock().unwrap().clear();
    }
}

/// The mutable state one reader session carries: identity map plus norms.
/// Shared between the reader and its term scanners; never shared across
/// sessions, because document numbers are only stable within one.
#[derive(Debug)]
pub struct SessionState {
    pub doc_map: DocIdMap,
    pub norms: Norms,
}

impl SessionState {
    pub fn new(max_docs: u32) -> Self {
        SessionState { doc_map: DocIdMap::new(max_docs), norms: Norms::new(max_docs) }
    }

    /// Forget every assignment and recorded norm. Called on reopen; any
    /// previously handed-out document number is invalid afterwards.
    pub fn reset(&self) {
        self.doc_map.reset();
        self.norms.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::codec::encode_norm;

    #[test]
    fn test_numbers_are_dense_and_stable() {
        let map = DocIdMap::new(100);
        let a = map.assign(b"doc-a").unwrap();
        let b = map.assign(b"doc-b").unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(map.assign(b"doc-a").unwrap(), 1);
        assert_eq!(map.id(2), Some(b"doc-b".to_vec()));
        assert_eq!(map.number(b"doc-b"), Some(2));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_capacity_is_fatal() {
        let map = DocIdMap::new(2);
        map.assign(b"a").unwrap();
        map.assign(b"b").unwrap();
        let err = map.assign(b"c").unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { max: 2 }));
        // existing assignments survive
        assert_eq!(map.assign(b"b").unwrap(), 2);
    }

    #[test]
    fn test_reset_restarts_numbering() {
        let state = SessionState::new(10);
        state.doc_map.assign(b"a").unwrap();
        state.norms.record("body", 1, 42);
        state.reset();
        assert!(state.doc_map.is_empty());
        assert_eq!(state.norms.get("body", 1), DEFAULT_NORM);
        assert_eq!(state.doc_map.assign(b"z").unwrap(), 1);
    }

    #[test]
    fn test_norm_default_and_growth() {
        let norms = Norms::new(1_000);
        assert_eq!(norms.get("body", 5), DEFAULT_NORM);
        norms.record("body", 700, 99);
        assert_eq!(norms.get("body", 700), 99);
        assert_eq!(norms.get("body", 699), DEFAULT_NORM);
        let snap = norms.snapshot("body", 700);
        assert_eq!(snap.len(), 701);
        assert_eq!(snap[700], 99);
        assert_eq!(snap[1], DEFAULT_NORM);
    }

    #[test]
    fn test_default_norm_encodes_one() {
        assert_eq!(DEFAULT_NORM, encode_norm(1.0));
    }
}
