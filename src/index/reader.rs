//! Session-scoped index reader.
//!
//! A reader owns the session identity map (persistent document id to dense
//! session-local number), an LRU cache of materialized documents, and a
//! cache of positioned term scanners keyed by the terms they have already
//! fetched. All state is interior-mutable behind `&self`; the reader is
//! meant to be shared.
//!
//! Document numbers are only meaningful within one session. `reopen`
//! discards every piece of session state and starts numbering afresh
//! against the store's current contents.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use log::warn;
use lru::LruCache;

use crate::error::Result;
use crate::index::codec;
use crate::index::doc_map::SessionState;
use crate::index::keys;
use crate::index::scanner::TermScanner;
use crate::index::term_vector::{self, TermVector};
use crate::index::types::{
    Document, Field, FieldSelector, FieldValue, IndexConfig, META_COLUMN, Posting, Term,
};
use crate::store::{Column, KeyValueStore, RowGroup, RowKey, SlicePredicate};

pub struct IndexReader<S> {
    index: String,
    store: Arc<S>,
    config: IndexConfig,
    session: Arc<SessionState>,
    doc_cache: Mutex<LruCache<u32, Document>>,
    scanners: Mutex<AHashMap<Term, Arc<Mutex<TermScanner<S>>>>>,
}

impl<S: KeyValueStore> IndexReader<S> {
    pub fn new(index: impl Into<String>, store: Arc<S>, config: IndexConfig) -> Self {
        let cap = NonZeroUsize::new(config.doc_cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        let session = Arc::new(SessionState::new(config.max_docs));
        IndexReader {
            index: index.into(),
            store,
            config,
            session,
            doc_cache: Mutex::new(LruCache::new(cap)),
            scanners: Mutex::new(AHashMap::new()),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Session state shared with writers and scanners over the same index.
    pub fn session(&self) -> Arc<SessionState> {
        self.session.clone()
    }

    /// Documents numbered so far in this session.
    pub fn num_docs(&self) -> u32 {
        self.session.doc_map.len()
    }

    /// Session-local number of a persistent document id, if it has been
    /// seen this session.
    pub fn doc_number(&self, doc_id: &[u8]) -> Option<u32> {
        self.session.doc_map.number(doc_id)
    }

    /// Persistent id behind a session-local document number.
    pub fn document_id(&self, doc: u32) -> Option<Vec<u8>> {
        self.session.doc_map.id(doc)
    }

    /// Norm bytes of `field` for every numbered document, indexed by
    /// document number (slot 0 unused).
    pub fn norms(&self, field: &str) -> Vec<u8> {
        self.session.norms.snapshot(field, self.session.doc_map.len())
    }

    /// Materialize the stored fields of a document by session number.
    /// Prefetch numbers named by the selector are fetched in the same round
    /// trip and parked in the document cache.
    pub fn document(&self, doc: u32, selector: &FieldSelector) -> Result<Option<Document>> {
        let Some(primary_id) = self.session.doc_map.id(doc) else {
            return Ok(None);
        };
        if let Some(found) = self.doc_cache.lock().unwrap().get(&doc) {
            return Ok(Some(found.clone()));
        }

        let mut wanted: Vec<(u32, Vec<u8>)> = vec![(doc, primary_id)];
        {
            let cache = self.doc_cache.lock().unwrap();
            for &num in &selector.prefetch {
                if num == doc || cache.contains(&num) {
                    continue;
                }
                match self.session.doc_map.id(num) {
                    Some(id) => wanted.push((num, id)),
                    None => warn!("prefetch of unknown document number {num}"),
                }
            }
        }

        let mut by_key: AHashMap<RowKey, u32> = AHashMap::with_capacity(wanted.len());
        let mut row_keys = Vec::with_capacity(wanted.len());
        for (num, id) in &wanted {
            let key = keys::doc_key(&self.index, id)?;
            by_key.insert(key.clone(), *num);
            row_keys.push(key);
        }

        let predicate = field_predicate(selector);
        let rows = self.store.multi_get_slice(RowGroup::Docs, &row_keys, &predicate)?;

        let mut primary = None;
        for (key, columns) in rows {
            let Some(&num) = by_key.get(&key) else {
                warn!("document fetch returned unrequested row {key:?}");
                continue;
            };
            if columns.is_empty() {
                continue;
            }
            let materialized = decode_document(columns)?;
            if num == doc {
                primary = Some(materialized.clone());
            }
            self.doc_cache.lock().unwrap().put(num, materialized);
        }
        Ok(primary)
    }

    /// Materialize a document by persistent id, numbering it into the
    /// session on first sight. Unknown ids return `Ok(None)` without
    /// consuming a number.
    pub fn document_by_id(
        &self,
        doc_id: &[u8],
        selector: &FieldSelector,
    ) -> Result<Option<Document>> {
        if let Some(num) = self.session.doc_map.number(doc_id) {
            return self.document(num, selector);
        }
        let key = keys::doc_key(&self.index, doc_id)?;
        let predicate = field_predicate(selector);
        let rows = self.store.multi_get_slice(RowGroup::Docs, &[key], &predicate)?;
        let Some((_, columns)) = rows.into_iter().next() else {
            return Ok(None);
        };
        if columns.is_empty() {
            return Ok(None);
        }
        let num = self.session.doc_map.assign(doc_id)?;
        let materialized = decode_document(columns)?;
        self.doc_cache.lock().unwrap().put(num, materialized.clone());
        Ok(Some(materialized))
    }

    /// Number of documents containing exactly `term`.
    pub fn doc_freq(&self, term: &Term) -> Result<usize> {
        let shared = self.scanner_for(term);
        let mut scanner = shared.lock().unwrap();
        let freq = if scanner.skip_to(term)? && scanner.term() == Some(term) {
            scanner.doc_freq()
        } else {
            0
        };
        self.register_scanner(&shared, &scanner);
        Ok(freq)
    }

    /// Postings of exactly `term`, ascending by session document number.
    /// A term with no row yields an empty list.
    pub fn postings(&self, term: &Term) -> Result<Vec<Posting>> {
        let shared = self.scanner_for(term);
        let mut scanner = shared.lock().unwrap();
        let postings = if scanner.skip_to(term)? && scanner.term() == Some(term) {
            scanner.postings()?
        } else {
            Vec::new()
        };
        self.register_scanner(&shared, &scanner);
        Ok(postings)
    }

    /// A scanner positioned at the first term `>= from` within its field,
    /// for caller-driven sorted enumeration.
    pub fn terms_from(&self, from: &Term) -> Result<TermScanner<S>> {
        let mut scanner = TermScanner::new(
            self.index.clone(),
            self.store.clone(),
            self.session.clone(),
            &self.config,
        );
        scanner.skip_to(from)?;
        Ok(scanner)
    }

    /// Term vector of one field of a document, by session number.
    pub fn term_vector(&self, doc: u32, field: &str) -> Result<Option<TermVector>> {
        let Some(doc_id) = self.session.doc_map.id(doc) else {
            return Ok(None);
        };
        term_vector::build_term_vector(self.store.as_ref(), &self.index, &doc_id, field)
    }

    /// Term vector of one field of a document, by persistent id.
    pub fn term_vector_by_id(&self, doc_id: &[u8], field: &str) -> Result<Option<TermVector>> {
        term_vector::build_term_vector(self.store.as_ref(), &self.index, doc_id, field)
    }

    /// Discard all session state: document numbering, norms, the document
    /// cache and every cached scanner. The next read sees the store's
    /// current contents with fresh numbering.
    pub fn reopen(&self) {
        self.session.reset();
        self.doc_cache.lock().unwrap().clear();
        self.scanners.lock().unwrap().clear();
    }

    fn scanner_for(&self, term: &Term) -> Arc<Mutex<TermScanner<S>>> {
        let map = self.scanners.lock().unwrap();
        if let Some(found) = map.get(term) {
            return found.clone();
        }
        drop(map);
        Arc::new(Mutex::new(TermScanner::new(
            self.index.clone(),
            self.store.clone(),
            self.session.clone(),
            &self.config,
        )))
    }

    /// File the scanner under every term it has fetched, so later lookups
    /// of neighboring terms reuse its page cache.
    fn register_scanner(&self, shared: &Arc<Mutex<TermScanner<S>>>, scanner: &TermScanner<S>) {
        let mut map = self.scanners.lock().unwrap();
        for term in scanner.cached_terms() {
            map.entry(term).or_insert_with(|| shared.clone());
        }
    }
}

fn field_predicate(selector: &FieldSelector) -> SlicePredicate {
    match &selector.fields {
        Some(names) => {
            SlicePredicate::Columns(names.iter().map(|n| n.as_bytes().to_vec()).collect())
        }
        None => SlicePredicate::All,
    }
}

/// Rebuild a [`Document`] from the stored-field columns of its row. The
/// meta term-list column is never surfaced as a field.
fn decode_document(columns: Vec<Column>) -> Result<Document> {
    let mut doc = Document::new();
    for column in columns {
        if column.name == META_COLUMN {
            continue;
        }
        let name = match std::str::from_utf8(&column.name) {
            Ok(name) => name.to_string(),
            Err(_) => {
                warn!("skipping stored field with non-UTF-8 name");
                continue;
            }
        };
        for value in codec::decode_field_value(&name, &column.value)? {
            doc.add(match value {
                FieldValue::Text(text) => Field::text(name.clone(), text),
                FieldValue::Binary(bytes) => Field::binary(name.clone(), bytes),
            });
        }
    }
    Ok(doc)
}
