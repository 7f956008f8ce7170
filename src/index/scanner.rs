//! Chunked term-dictionary scanner.
//!
//! The term dictionary is the sorted key range of one field's rows in the
//! Terms group. The store only hands out bounded pages, so the scanner
//! materializes the dictionary incrementally: a small first page (a lookup
//! probe is usually satisfied by one or two terms), then large chunks. Every
//! fetched page is merged into a cache keyed by term, so a later `skip_to`
//! of any term inside the fetched span is served from memory.
//!
//! The cursor is an explicit state machine. One slot past the end of the
//! page buffer acts as the end-of-field sentinel: reaching it either
//! triggers the next page fetch — restarted at the last *raw* row key of
//! the previous page *inclusive*, so a row created between fetches cannot
//! cause a term to be skipped, with the re-included last term stepped
//! over — or, when the last page came back short, ends the field.
//!
//! Continuation and exhaustion are decided on raw fetched rows, not on the
//! rows that survive the defensive filter: a page whose rows are all
//! artifacts still advances the scan.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use log::debug;

use crate::error::Result;
use crate::index::codec::{self, PostingPayload};
use crate::index::doc_map::SessionState;
use crate::index::keys;
use crate::index::types::{IndexConfig, Posting, Term};
use crate::store::{KeyValueStore, RowGroup, RowKey};

/// Decoded column set of one term row: (document id, payload) pairs in
/// store order.
type RawPostings = Vec<(Vec<u8>, PostingPayload)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// No fetch issued yet; the next fetch uses the small initial page.
    Uninitialized,
    /// Exactly one page fetched.
    InitialPage,
    /// Paging with full-size chunks.
    Chunked,
    /// A short page ended the field; nothing beyond the boundary exists.
    Exhausted,
}

/// Sequential, cursor-based iterator over the sorted term space of one
/// field.
pub struct TermScanner<S> {
    index: String,
    store: Arc<S>,
    session: Arc<SessionState>,
    init_page: usize,
    chunk_page: usize,

    field: Option<String>,
    state: ScanState,
    /// Contiguous fetched span: every term in `[floor, boundary]` is here.
    cache: BTreeMap<Term, RawPostings>,
    /// The skip target that opened the current span.
    floor: Option<Term>,
    /// Last kept term of the most recent page; upper bound of the span.
    boundary: Option<Term>,
    /// Raw key of the last fetched row, kept or not; the next page
    /// restarts here.
    continue_key: Option<RowKey>,
    /// Current page window; `pos == buffer.len()` is the sentinel slot.
    buffer: Vec<Term>,
    pos: usize,
    last_page_full: bool,
}

impl<S: KeyValueStore> TermScanner<S> {
    pub fn new(
        index: impl Into<String>,
        store: Arc<S>,
        session: Arc<SessionState>,
        config: &IndexConfig,
    ) -> Self {
        TermScanner {
            index: index.into(),
            store,
            session,
            init_page: config.init_page.max(1),
            // a chunk of one cannot make progress past an inclusive boundary
            chunk_page: config.chunk_page.max(2),
            field: None,
            state: ScanState::Uninitialized,
            cache: BTreeMap::new(),
            floor: None,
            boundary: None,
            continue_key: None,
            buffer: Vec::new(),
            pos: 0,
            last_page_full: false,
        }
    }

    /// Position the cursor at the first term `>= target` within the
    /// target's field. Returns whether any term was found. Switching fields
    /// resets all cursor state.
    pub fn skip_to(&mut self, target: &Term) -> Result<bool> {
        if self.field.as_deref() != Some(target.field()) {
            self.reset_for_field(target.field());
        }

        // inside the fetched span: no round trip needed
        let in_span = match (&self.floor, &self.boundary) {
            (Some(floor), Some(boundary)) => target >= floor && target <= boundary,
            _ => false,
        };
        if in_span {
            self.buffer = self.cache.range(target.clone()..).map(|(t, _)| t.clone()).collect();
            self.pos = 0;
            debug!(
                "skip_to {}:{} served from cache ({} buffered terms)",
                target.field(),
                target.text(),
                self.buffer.len()
            );
            return Ok(self.pos < self.buffer.len());
        }

        match (&self.floor, self.state) {
            // everything >= target was already ruled out
            (Some(floor), ScanState::Exhausted) if target >= floor => return Ok(false),
            // target predates or postdates the span; the cache cannot stay
            // contiguous across the jump, so drop it and rescan
            (Some(_), _) => self.restart(),
            (None, _) => {}
        }

        self.floor = Some(target.clone());
        self.load(target)?;
        Ok(self.pos < self.buffer.len())
    }

    /// Advance one term in sorted order. Returns false at field end.
    pub fn next(&mut self) -> Result<bool> {
        if self.state == ScanState::Uninitialized {
            return Ok(false); // position with skip_to first
        }
        if self.pos < self.buffer.len() {
            self.pos += 1;
        }

        while self.pos >= self.buffer.len() {
            // sentinel slot reached
            if self.state == ScanState::Exhausted || !self.last_page_full {
                self.state = ScanState::Exhausted;
                return Ok(false);
            }
            let Some(start) = self.continue_key.clone() else {
                self.state = ScanState::Exhausted;
                return Ok(false);
            };

            let returned = self.boundary.clone();
            self.load_from_key(start)?;
            if self.state == ScanState::Exhausted {
                return Ok(false);
            }
            // the inclusive restart may re-surface the last returned term
            self.pos = usize::from(self.buffer.first() == returned.as_ref());
        }

        Ok(true)
    }

    /// The current term, when the cursor is on one.
    pub fn term(&self) -> Option<&Term> {
        self.buffer.get(self.pos)
    }

    /// Number of documents containing the current term (its row's column
    /// count).
    pub fn doc_freq(&self) -> usize {
        self.term().and_then(|t| self.cache.get(t)).map_or(0, Vec::len)
    }

    /// Decoded postings of the current term, document numbers resolved
    /// through the session identity map and sorted ascending by number.
    /// Norm bytes found in payloads are folded into the session norm
    /// arrays as a side effect.
    pub fn postings(&self) -> Result<Vec<Posting>> {
        let Some(term) = self.term() else {
            return Ok(Vec::new());
        };
        let Some(raw) = self.cache.get(term) else {
            return Ok(Vec::new());
        };

        let mut postings = Vec::with_capacity(raw.len());
        for (doc_id, payload) in raw {
            let doc = self.session.doc_map.assign(doc_id)?;
            if let Some(norm) = payload.norm {
                self.session.norms.record(term.field(), doc, norm);
            }
            postings.push(Posting {
                doc,
                doc_id: doc_id.clone(),
                freq: payload.freq,
                positions: payload.positions.clone(),
                offsets: payload.offsets.clone(),
                norm: payload.norm,
            });
        }
        // the store returns columns in its own order; downstream consumers
        // require ascending document numbers
        postings.sort_by_key(|p| p.doc);
        Ok(postings)
    }

    /// Terms currently held in the page cache. The reader registers its
    /// enum cache under each of these.
    pub fn cached_terms(&self) -> Vec<Term> {
        self.cache.keys().cloned().collect()
    }

    fn reset_for_field(&mut self, field: &str) {
        self.field = Some(field.to_string());
        self.state = ScanState::Uninitialized;
        self.restart();
    }

    fn restart(&mut self) {
        self.cache.clear();
        self.buffer.clear();
        self.pos = 0;
        self.floor = None;
        self.boundary = None;
        self.continue_key = None;
        self.last_page_full = false;
        if self.state != ScanState::Uninitialized {
            self.state = ScanState::Chunked;
        }
    }

    fn load(&mut self, from: &Term) -> Result<()> {
        let start = keys::term_key(&self.index, from);
        self.load_from_key(start)
    }

    /// Fetch pages starting at `start` (inclusive) until one yields at
    /// least one usable term row or the key range runs out, then install
    /// the kept rows as the current window. The cache is only touched
    /// after a whole page decodes; a failed round trip leaves no
    /// partial-page state behind.
    ///
    /// Continuation and short-page detection run on raw row counts: a
    /// full page whose rows are all dropped still advances to the next
    /// page instead of ending the field.
    fn load_from_key(&mut self, mut start: RowKey) -> Result<()> {
        let Some(field) = self.field.clone() else {
            return Ok(());
        };
        let end = keys::field_end_key(&self.index, &field);

        loop {
            let limit = match self.state {
                ScanState::Uninitialized => self.init_page,
                _ => self.chunk_page,
            };

            let started = Instant::now();
            let rows = self.store.range_slices(RowGroup::Terms, &start, &end, limit)?;
            self.last_page_full = rows.len() == limit;
            if let Some((key, _)) = rows.last() {
                self.continue_key = Some(key.clone());
            }
            self.state = match self.state {
                ScanState::Uninitialized => ScanState::InitialPage,
                _ => ScanState::Chunked,
            };

            let mut page: Vec<(Term, RawPostings)> = Vec::with_capacity(rows.len());
            for (key, columns) in rows {
                let Some(term) = keys::parse_term_key(&self.index, &key) else {
                    debug!("dropping unparseable row key {key:?}");
                    continue;
                };
                // replication/ownership artifacts: foreign fields, tombstones
                if term.field() != field {
                    debug!("dropping row from field {:?} while scanning {:?}", term.field(), field);
                    continue;
                }
                if columns.is_empty() {
                    debug!("dropping empty posting row for {}:{}", term.field(), term.text());
                    continue;
                }
                let mut raw = Vec::with_capacity(columns.len());
                for column in columns {
                    raw.push((column.name, codec::decode_posting(&column.value)?));
                }
                page.push((term, raw));
            }

            debug!(
                "loaded {} terms for field {:?} (limit {}) in {:?}",
                page.len(),
                field,
                limit,
                started.elapsed()
            );

            self.buffer = page.iter().map(|(t, _)| t.clone()).collect();
            self.pos = 0;
            if let Some((last, _)) = page.last() {
                self.boundary = Some(last.clone());
            }
            self.cache.extend(page);

            if !self.buffer.is_empty() {
                return Ok(());
            }
            if !self.last_page_full {
                self.state = ScanState::Exhausted;
                return Ok(());
            }
            // every row of a full page was dropped: restart at the last
            // raw key; a chunk of at least two rows makes progress past
            // the inclusive restart row
            match self.continue_key.clone() {
                Some(key) => start = key,
                None => {
                    self.state = ScanState::Exhausted;
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::codec::{PostingPayload, encode_posting};
    use crate::store::{MemoryStore, Mutation, MutationBatch, RowKey};

    fn store_with_terms(index: &str, terms: &[(&str, &str, &[&[u8]])]) -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        let mut batch = MutationBatch::new();
        for &(field, text, docs) in terms {
            let key = keys::term_key(index, &Term::new(field, text));
            for &doc in docs {
                batch.add(
                    RowGroup::Terms,
                    key.clone(),
                    Mutation::Put {
                        column: doc.to_vec(),
                        value: encode_posting(&PostingPayload {
                            freq: 1,
                            positions: vec![1],
                            offsets: vec![],
                            norm: None,
                        }),
                    },
                );
            }
        }
        store.batch_mutate(batch).unwrap();
        Arc::new(store)
    }

    fn scanner_with_pages(
        store: Arc<MemoryStore>,
        init_page: usize,
        chunk_page: usize,
    ) -> TermScanner<MemoryStore> {
        let config = IndexConfig { init_page, chunk_page, ..IndexConfig::default() };
        TermScanner::new("ix", store, Arc::new(SessionState::new(1000)), &config)
    }

    fn scan_field(scanner: &mut TermScanner<MemoryStore>, field: &str) -> Vec<String> {
        let mut out = Vec::new();
        if scanner.skip_to(&Term::new(field, "")).unwrap() {
            loop {
                out.push(scanner.term().unwrap().text().to_string());
                if !scanner.next().unwrap() {
                    break;
                }
            }
        }
        out
    }

    const DOC: &[u8] = b"d1";
    const ONE_DOC: &[&[u8]] = &[DOC];

    #[test]
    fn test_sequential_scan_crosses_page_boundaries() {
        let texts = ["alpha", "brown", "cedar", "delta", "eagle", "frost", "grain"];
        let rows: Vec<(&str, &str, &[&[u8]])> =
            texts.iter().map(|&t| ("body", t, ONE_DOC)).collect();
        let store = store_with_terms("ix", &rows);

        let mut scanner = scanner_with_pages(store, 2, 2);
        assert_eq!(scan_field(&mut scanner, "body"), texts);
    }

    #[test]
    fn test_page_size_does_not_change_sequence() {
        let texts = ["ant", "bee", "cat", "dog", "elk", "fox", "gnu", "hen", "ibex"];
        let rows: Vec<(&str, &str, &[&[u8]])> =
            texts.iter().map(|&t| ("body", t, ONE_DOC)).collect();
        let store = store_with_terms("ix", &rows);

        for (init, chunk) in [(1, 2), (2, 2), (2, 3), (2, 1024), (1024, 1024)] {
            let mut scanner = scanner_with_pages(store.clone(), init, chunk);
            assert_eq!(
                scan_field(&mut scanner, "body"),
                texts,
                "sequence diverged at init={init} chunk={chunk}"
            );
        }
    }

    #[test]
    fn test_skip_to_positions_at_first_ge_term() {
        let store = store_with_terms(
            "ix",
            &[("body", "alpha", &[DOC]), ("body", "cedar", &[DOC]), ("body", "delta", &[DOC])],
        );
        let mut scanner = scanner_with_pages(store, 2, 1024);

        assert!(scanner.skip_to(&Term::new("body", "b")).unwrap());
        assert_eq!(scanner.term().unwrap().text(), "cedar");

        assert!(scanner.skip_to(&Term::new("body", "cedar")).unwrap());
        assert_eq!(scanner.term().unwrap().text(), "cedar");

        assert!(!scanner.skip_to(&Term::new("body", "zzz")).unwrap());
    }

    #[test]
    fn test_skip_back_rescans() {
        let store = store_with_terms(
            "ix",
            &[("body", "alpha", &[DOC]), ("body", "mid", &[DOC]), ("body", "zeta", &[DOC])],
        );
        let mut scanner = scanner_with_pages(store, 2, 1024);
        assert!(scanner.skip_to(&Term::new("body", "mid")).unwrap());
        // earlier than the scanned span: must not report exhaustion
        assert!(scanner.skip_to(&Term::new("body", "alpha")).unwrap());
        assert_eq!(scanner.term().unwrap().text(), "alpha");
    }

    #[test]
    fn test_field_scoping_and_switch() {
        let store = store_with_terms(
            "ix",
            &[
                ("author", "smith", &[DOC]),
                ("body", "alpha", &[DOC]),
                ("body", "beta", &[DOC]),
                ("title", "omega", &[DOC]),
            ],
        );
        let mut scanner = scanner_with_pages(store, 2, 1024);
        assert_eq!(scan_field(&mut scanner, "body"), ["alpha", "beta"]);
        assert_eq!(scan_field(&mut scanner, "title"), ["omega"]);
        assert_eq!(scan_field(&mut scanner, "nosuch"), Vec::<String>::new());
    }

    #[test]
    fn test_doc_freq_counts_columns() {
        let store =
            store_with_terms("ix", &[("body", "alpha", &[b"d1", b"d2", b"d3"])]);
        let mut scanner = scanner_with_pages(store, 2, 1024);
        assert!(scanner.skip_to(&Term::new("body", "alpha")).unwrap());
        assert_eq!(scanner.doc_freq(), 3);
    }

    #[test]
    fn test_postings_ascend_by_doc_number() {
        // columns arrive in store (byte) order: d01, d10, d2; numbering
        // follows first-seen order, and the result must be renumber-sorted
        let store = store_with_terms("ix", &[("body", "alpha", &[b"d10", b"d01", b"d2"])]);
        let mut scanner = scanner_with_pages(store, 2, 1024);
        assert!(scanner.skip_to(&Term::new("body", "alpha")).unwrap());
        let postings = scanner.postings().unwrap();
        let docs: Vec<u32> = postings.iter().map(|p| p.doc).collect();
        let mut sorted = docs.clone();
        sorted.sort_unstable();
        assert_eq!(docs, sorted);
        assert_eq!(postings.len(), 3);
    }

    #[test]
    fn test_cache_serves_repeat_skip_without_store() {
        let store = store_with_terms(
            "ix",
            &[("body", "alpha", &[DOC]), ("body", "beta", &[DOC])],
        );
        let mut scanner = scanner_with_pages(store.clone(), 1024, 1024);
        assert!(scanner.skip_to(&Term::new("body", "alpha")).unwrap());
        assert!(scanner.next().unwrap());

        // drop the backing rows; a cached skip must still succeed
        store.remove_row(RowGroup::Terms, &keys::term_key("ix", &Term::new("body", "alpha"))).unwrap();
        assert!(scanner.skip_to(&Term::new("body", "alpha")).unwrap());
        assert_eq!(scanner.term().unwrap().text(), "alpha");
    }

    // a row inside the field's key range whose text component is not
    // valid UTF-8, sorting between `after` and whatever follows it
    fn plant_bogus_row(store: &MemoryStore, after: &str) {
        let mut bogus = keys::term_key("ix", &Term::new("body", after)).0;
        bogus.push(0xC0);
        let mut batch = MutationBatch::new();
        batch.add(
            RowGroup::Terms,
            RowKey(bogus),
            Mutation::Put { column: b"c".to_vec(), value: b"v".to_vec() },
        );
        store.batch_mutate(batch).unwrap();
    }

    #[test]
    fn test_scan_continues_past_full_page_of_dropped_rows() {
        // with two-row pages, the two undecodable rows between alpha and
        // zeta fill a whole page; the scan must page past them rather
        // than report the field exhausted
        let store = store_with_terms("ix", &[("body", "alpha", &[DOC]), ("body", "zeta", &[DOC])]);
        plant_bogus_row(&store, "b");
        plant_bogus_row(&store, "c");

        let mut scanner = scanner_with_pages(store.clone(), 2, 2);
        assert!(scanner.skip_to(&Term::new("body", "b")).unwrap());
        assert_eq!(scanner.term().unwrap().text(), "zeta");

        let mut scanner = scanner_with_pages(store, 2, 2);
        assert_eq!(scan_field(&mut scanner, "body"), ["alpha", "zeta"]);
    }

    #[test]
    fn test_dropped_last_row_of_page_does_not_stall() {
        // the dropped row lands as the last raw row of a full page; the
        // next fetch must restart past it instead of re-reading the same
        // window
        let store = store_with_terms(
            "ix",
            &[("body", "alpha", &[DOC]), ("body", "beta", &[DOC]), ("body", "zeta", &[DOC])],
        );
        plant_bogus_row(&store, "beta");

        let mut scanner = scanner_with_pages(store, 2, 2);
        assert_eq!(scan_field(&mut scanner, "body"), ["alpha", "beta", "zeta"]);
    }

    #[test]
    fn test_trailing_dropped_rows_end_the_field() {
        let store = store_with_terms("ix", &[("body", "alpha", &[DOC]), ("body", "beta", &[DOC])]);
        plant_bogus_row(&store, "gamma");
        plant_bogus_row(&store, "theta");

        let mut scanner = scanner_with_pages(store, 2, 2);
        assert_eq!(scan_field(&mut scanner, "body"), ["alpha", "beta"]);
    }

    #[test]
    fn test_unparseable_rows_are_dropped() {
        let store = store_with_terms("ix", &[("body", "alpha", &[DOC])]);
        // plant a row inside the field's key range whose text component is
        // not valid UTF-8; the scanner must skip it, not fail
        let mut bogus = keys::term_key("ix", &Term::new("body", "x")).0;
        bogus.push(0xC0);
        let mut batch = MutationBatch::new();
        batch.add(
            RowGroup::Terms,
            RowKey(bogus),
            Mutation::Put { column: b"c".to_vec(), value: b"v".to_vec() },
        );
        store.batch_mutate(batch).unwrap();

        let mut scanner = scanner_with_pages(store, 1024, 1024);
        assert_eq!(scan_field(&mut scanner, "body"), ["alpha"]);
    }
}
