//! Index writer: turns documents into store mutations.
//!
//! One `add_document` call produces a single mutation batch touching every
//! term row the document participates in plus its own document row. In
//! auto-commit mode (the default) the batch is applied before the call
//! returns; otherwise batches accumulate until [`IndexWriter::commit`].
//!
//! Deletion has no reverse index to lean on. Every document row carries a
//! meta column listing the terms it was indexed under, and deleting walks
//! that list to strip the document's column from each term row. Deletions
//! always apply immediately and see only committed state.

use std::hash::BuildHasher;
use std::time::{SystemTime, UNIX_EPOCH};

use ahash::AHashMap;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::index::codec::{self, PostingPayload, encode_norm, length_norm};
use crate::index::keys;
use crate::index::reader::IndexReader;
use crate::index::types::{DOC_ID_FIELD, Document, FieldValue, META_COLUMN, Term};
use crate::store::{KeyValueStore, Mutation, MutationBatch, RowGroup, SlicePredicate};
use crate::utils::tokenizer::Analyzer;
use std::sync::Arc;

#[derive(Default)]
struct TermInfo {
    freq: u32,
    positions: Vec<u32>,
    offsets: Vec<(u32, u32)>,
}

/// Rolling per-field state across a field's (possibly multiple) values.
struct FieldAccum {
    position: u32,
    offset_base: u32,
    token_count: u32,
    boost: f32,
    omit_norms: bool,
}

pub struct IndexWriter<S> {
    index: String,
    store: Arc<S>,
    auto_commit: bool,
    pending: MutationBatch,
}

impl<S: KeyValueStore> IndexWriter<S> {
    pub fn new(index: impl Into<String>, store: Arc<S>) -> Self {
        IndexWriter {
            index: index.into(),
            store,
            auto_commit: true,
            pending: MutationBatch::new(),
        }
    }

    pub fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    /// Turning auto-commit back on flushes anything still pending.
    pub fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        self.auto_commit = auto_commit;
        if auto_commit {
            self.commit()?;
        }
        Ok(())
    }

    /// Apply every pending mutation batch. A no-op when nothing is pending.
    pub fn commit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::replace(&mut self.pending, MutationBatch::new());
        debug!("committing {} pending rows", batch.row_count());
        self.store.batch_mutate(batch)
    }

    /// Index one document and return its persistent id. The id comes from
    /// the document's `_id` field when present, otherwise one is generated.
    pub fn add_document(&mut self, doc: &Document, analyzer: &dyn Analyzer) -> Result<Vec<u8>> {
        let doc_id = match doc.get(DOC_ID_FIELD) {
            Some(id) => id.as_bytes().to_vec(),
            None => generate_doc_id(),
        };
        let doc_row = keys::doc_key(&self.index, &doc_id)?;

        let mut term_infos: AHashMap<Term, TermInfo> = AHashMap::new();
        let mut accums: AHashMap<String, FieldAccum> = AHashMap::new();
        let mut stored_text: AHashMap<String, Vec<String>> = AHashMap::new();
        let mut stored_binary: AHashMap<String, Vec<u8>> = AHashMap::new();

        for field in doc.fields() {
            let opts = field.options;
            if opts.indexed {
                match &field.value {
                    FieldValue::Text(text) if opts.tokenized => {
                        let accum =
                            accums.entry(field.name.clone()).or_insert_with(|| FieldAccum {
                                position: 0,
                                offset_base: 0,
                                token_count: 0,
                                boost: doc.boost(),
                                omit_norms: opts.omit_norms,
                            });
                        accum.boost *= field.boost;
                        if accum.token_count > 0 {
                            accum.position += analyzer.position_increment_gap(&field.name);
                        }
                        let mut stream = analyzer.token_stream(&field.name, text);
                        while let Some(token) = stream.next_token() {
                            accum.position += token.position_increment;
                            accum.token_count += 1;
                            let info = term_infos
                                .entry(Term::new(field.name.clone(), token.text))
                                .or_default();
                            info.freq += 1;
                            if opts.store_positions {
                                info.positions.push(accum.position);
                            }
                            if opts.store_offsets {
                                if let Some((start, end)) = token.offset {
                                    info.offsets.push((
                                        accum.offset_base + start,
                                        accum.offset_base + end,
                                    ));
                                }
                            }
                        }
                        drop(stream);
                        // value boundary; offsets of the next value start past
                        // this one
                        accum.offset_base += text.len() as u32 + 1;
                    }
                    FieldValue::Text(text) => {
                        // one presence-only term for the whole value; the
                        // payload stays empty (freq 0, no positions)
                        let accum =
                            accums.entry(field.name.clone()).or_insert_with(|| FieldAccum {
                                position: 0,
                                offset_base: 0,
                                token_count: 0,
                                boost: doc.boost(),
                                omit_norms: opts.omit_norms,
                            });
                        accum.boost *= field.boost;
                        accum.token_count += 1;
                        term_infos
                            .entry(Term::new(field.name.clone(), text.clone()))
                            .or_default();
                    }
                    FieldValue::Binary(_) => {
                        warn!("ignoring indexed flag on binary field {:?}", field.name);
                    }
                }
            }
            if opts.stored {
                match &field.value {
                    FieldValue::Text(text) => {
                        stored_text.entry(field.name.clone()).or_default().push(text.clone());
                    }
                    FieldValue::Binary(bytes) => {
                        stored_binary.insert(field.name.clone(), bytes.clone());
                    }
                }
            }
        }

        let mut field_norms: AHashMap<&str, u8> = AHashMap::new();
        for (name, accum) in &accums {
            if !accum.omit_norms {
                field_norms
                    .insert(name.as_str(), encode_norm(length_norm(accum.token_count) * accum.boost));
            }
        }

        let mut terms: Vec<Term> = term_infos.keys().cloned().collect();
        terms.sort();

        let mut batch = MutationBatch::new();
        for (term, info) in &term_infos {
            let payload = PostingPayload {
                freq: info.freq,
                positions: info.positions.clone(),
                offsets: info.offsets.clone(),
                norm: field_norms.get(term.field()).copied(),
            };
            batch.add(
                RowGroup::Terms,
                keys::term_key(&self.index, term),
                Mutation::Put { column: doc_id.clone(), value: codec::encode_posting(&payload) },
            );
        }

        for (name, values) in &stored_text {
            let refs: Vec<&str> = values.iter().map(String::as_str).collect();
            batch.add(
                RowGroup::Docs,
                doc_row.clone(),
                Mutation::Put {
                    column: name.as_bytes().to_vec(),
                    value: codec::encode_text_value(&refs),
                },
            );
        }
        for (name, bytes) in &stored_binary {
            batch.add(
                RowGroup::Docs,
                doc_row.clone(),
                Mutation::Put {
                    column: name.as_bytes().to_vec(),
                    value: codec::encode_binary_value(bytes),
                },
            );
        }
        batch.add(
            RowGroup::Docs,
            doc_row,
            Mutation::Put { column: META_COLUMN.to_vec(), value: codec::encode_term_list(&terms)? },
        );

        debug!(
            "indexed document {:?}: {} terms across {} rows",
            String::from_utf8_lossy(&doc_id),
            terms.len(),
            batch.row_count()
        );

        if self.auto_commit {
            self.store.batch_mutate(batch)?;
        } else {
            for (key, groups) in batch {
                for (group, mutations) in groups {
                    for mutation in mutations {
                        self.pending.add(group, key.clone(), mutation);
                    }
                }
            }
        }
        Ok(doc_id)
    }

    /// Remove one document by persistent id: strip its column from every
    /// term row named in its meta list, then drop the document row. Returns
    /// whether the document existed.
    pub fn delete_by_id(&mut self, doc_id: &[u8]) -> Result<bool> {
        let doc_row = keys::doc_key(&self.index, doc_id)?;
        let Some(raw) = self.store.get(RowGroup::Docs, &doc_row, META_COLUMN)? else {
            return Ok(false);
        };
        let terms = codec::decode_term_list(&raw)?;

        let mut batch = MutationBatch::new();
        for term in &terms {
            batch.add(
                RowGroup::Terms,
                keys::term_key(&self.index, term),
                Mutation::Delete { column: doc_id.to_vec() },
            );
        }
        if !batch.is_empty() {
            self.store.batch_mutate(batch)?;
        }
        self.store.remove_row(RowGroup::Docs, &doc_row)?;
        debug!(
            "deleted document {:?} ({} term rows touched)",
            String::from_utf8_lossy(doc_id),
            terms.len()
        );
        Ok(true)
    }

    /// Remove every document containing `term`. Returns how many were
    /// removed.
    pub fn delete_documents(&mut self, term: &Term) -> Result<usize> {
        let key = keys::term_key(&self.index, term);
        let rows = self.store.multi_get_slice(RowGroup::Terms, &[key], &SlicePredicate::All)?;
        let mut removed = 0;
        for (_, columns) in rows {
            for column in columns {
                if self.delete_by_id(&column.name)? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Remove documents by session-local number, resolving ids through the
    /// reader that numbered them.
    pub fn delete_document_numbers(
        &mut self,
        reader: &IndexReader<S>,
        docs: &[u32],
    ) -> Result<usize> {
        let mut removed = 0;
        for &doc in docs {
            let Some(doc_id) = reader.document_id(doc) else {
                return Err(Error::DocumentNotFound(format!("no document numbered {doc}")));
            };
            if self.delete_by_id(&doc_id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Delete every document containing `term`, then index `doc`. Not
    /// atomic; a concurrent reader can observe the gap.
    pub fn update_document(
        &mut self,
        term: &Term,
        doc: &Document,
        analyzer: &dyn Analyzer,
    ) -> Result<Vec<u8>> {
        self.delete_documents(term)?;
        self.add_document(doc, analyzer)
    }
}

/// Time-derived hex id, salted so two writers in the same nanosecond stay
/// apart.
fn generate_doc_id() -> Vec<u8> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64);
    let salt = ahash::RandomState::new().hash_one(nanos);
    format!("{nanos:x}{:08x}", salt as u32).into_bytes()
}
