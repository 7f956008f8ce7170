//! # Kivi - Inverted Index over a Sorted Key-Value Store
//!
//! Kivi is a full-text inverted index engine whose term dictionary,
//! postings, stored fields and term vectors live as rows and columns in a
//! distributed sorted key-value store. There are no segment files and no
//! merge phase: documents become searchable as soon as their mutation batch
//! is applied, and the store's sorted row-key order *is* the term
//! dictionary order.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`index`] - Writer, reader, term scanner, term vectors and the wire
//!   codecs for postings, stored fields and norms
//! - [`store`] - The five-operation capability trait the engine requires
//!   from its backing store, plus an in-memory implementation
//! - [`utils`] - Varint/delta encoding and the tokenizer capability traits
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use kivi::index::{Document, Field, FieldSelector, IndexReader, IndexWriter, Term};
//! use kivi::store::MemoryStore;
//! use kivi::utils::tokenizer::SimpleAnalyzer;
//!
//! let store = Arc::new(MemoryStore::new());
//! let mut writer = IndexWriter::new("books", store.clone());
//!
//! let mut doc = Document::new();
//! doc.add(Field::keyword("_id", "moby-dick"));
//! doc.add(Field::text("title", "Moby-Dick; or, The Whale"));
//! let id = writer.add_document(&doc, &SimpleAnalyzer).unwrap();
//!
//! let reader = IndexReader::new("books", store, Default::default());
//! assert_eq!(reader.doc_freq(&Term::new("title", "whale")).unwrap(), 1);
//! let found = reader.document_by_id(&id, &FieldSelector::all()).unwrap();
//! ```
//!
//! ## Data model
//!
//! Two row groups back one index. A term row (key: index name, field and
//! term text joined by a reserved delimiter) holds one column per matching
//! document, the column value a self-describing posting payload with
//! frequency, positions, offsets and the field's norm byte. A document row
//! holds one column per stored field plus a meta column listing every term
//! the document was indexed under, which is what makes deletion possible
//! without a reverse index.
//!
//! Document numbers are session-local: each reader densely numbers
//! persistent document ids as it first encounters them, so scores and
//! norms can be arrays instead of hash maps. Numbers from different
//! sessions are never comparable.

pub mod error;
pub mod index;
pub mod store;
pub mod utils;

pub use error::{Error, Result};
