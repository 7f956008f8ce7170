//! Per-document term vectors.
//!
//! A document row carries a meta column listing every term the document was
//! indexed under. Rebuilding a vector reads that list once, narrows it to
//! the requested field, then fetches exactly one column (the document's
//! own) from each of those term rows.

use log::{debug, warn};

use crate::error::Result;
use crate::index::codec;
use crate::index::keys;
use crate::index::types::{META_COLUMN, Term};
use crate::store::{KeyValueStore, RowGroup, RowKey, SlicePredicate};

/// The terms of one field of one document, with per-term statistics.
/// Parallel vectors indexed together; `positions` and `offsets` entries are
/// empty for terms indexed without them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermVector {
    pub field: String,
    pub terms: Vec<String>,
    pub frequencies: Vec<u32>,
    pub positions: Vec<Vec<u32>>,
    pub offsets: Vec<Vec<(u32, u32)>>,
}

impl TermVector {
    /// Position of `text` in the (ascending) term list.
    pub fn index_of(&self, text: &str) -> Option<usize> {
        self.terms.binary_search_by(|t| t.as_str().cmp(text)).ok()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Rebuild the term vector of one field of the document identified by
/// `doc_id`. Returns None when the document has no meta term list.
pub(crate) fn build_term_vector<S: KeyValueStore>(
    store: &S,
    index: &str,
    doc_id: &[u8],
    field: &str,
) -> Result<Option<TermVector>> {
    let row = keys::doc_key(index, doc_id)?;
    let Some(raw) = store.get(RowGroup::Docs, &row, META_COLUMN)? else {
        return Ok(None);
    };
    let all_terms = codec::decode_term_list(&raw)?;

    let mut terms: Vec<Term> = all_terms.into_iter().filter(|t| t.field() == field).collect();
    terms.sort();
    terms.dedup();
    if terms.is_empty() {
        return Ok(Some(TermVector {
            field: field.to_string(),
            terms: Vec::new(),
            frequencies: Vec::new(),
            positions: Vec::new(),
            offsets: Vec::new(),
        }));
    }

    let keys: Vec<RowKey> = terms.iter().map(|t| keys::term_key(index, t)).collect();
    let predicate = SlicePredicate::Columns(vec![doc_id.to_vec()]);
    let rows = store.multi_get_slice(RowGroup::Terms, &keys, &predicate)?;
    debug!("term vector for field {field:?}: {} terms, {} rows returned", terms.len(), rows.len());

    // the trait does not promise any row order from multi_get_slice, and
    // index_of binary-searches the term list, so collect then sort
    let mut entries: Vec<(String, u32, Vec<u32>, Vec<(u32, u32)>)> = Vec::with_capacity(rows.len());
    for (key, columns) in rows {
        let Some(term) = keys::parse_term_key(index, &key) else {
            warn!("term vector row with unparseable key {key:?}");
            continue;
        };
        let Some(column) = columns.into_iter().find(|c| c.name == doc_id) else {
            // the meta list can outrun the term rows when a write is in
            // flight; skip rather than fail
            warn!("no posting for doc under term {}:{}", term.field(), term.text());
            continue;
        };
        let payload = codec::decode_posting(&column.value)?;
        let freq = if payload.freq == 0 && !payload.positions.is_empty() {
            payload.positions.len() as u32
        } else {
            payload.freq
        };
        entries.push((term.text().to_string(), freq, payload.positions, payload.offsets));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut vector = TermVector {
        field: field.to_string(),
        terms: Vec::with_capacity(entries.len()),
        frequencies: Vec::with_capacity(entries.len()),
        positions: Vec::with_capacity(entries.len()),
        offsets: Vec::with_capacity(entries.len()),
    };
    for (text, freq, positions, offsets) in entries {
        vector.terms.push(text);
        vector.frequencies.push(freq);
        vector.positions.push(positions);
        vector.offsets.push(offsets);
    }

    Ok(Some(vector))
}
