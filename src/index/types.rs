use serde::{Deserialize, Serialize};

/// Name of the stored field that, when present, supplies the document's
/// persistent identifier. Without it the writer generates one.
pub const DOC_ID_FIELD: &str = "_id";

/// Reserved document-row column holding the serialized list of every term
/// indexed for the document. Deletion walks this list to remove postings
/// without a reverse index; it is excluded from default field selection.
pub const META_COLUMN: &[u8] = b"__meta__";

/// A term: one indexed token of one field.
///
/// Total order is by field then text, both as raw byte sequences, which
/// matches the row-key order of the term dictionary in the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Term {
    field: String,
    text: String,
}

impl Term {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Term { field: field.into(), text: text.into() }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A stored field value: UTF-8 text or opaque bytes.
///
/// The distinction is persisted via the value's trailing tag byte and must
/// survive a round trip through the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Binary(Vec<u8>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Binary(_) => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Binary(b) => Some(b),
            FieldValue::Text(_) => None,
        }
    }
}

/// Per-field indexing flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOptions {
    pub stored: bool,
    pub indexed: bool,
    /// Run the analyzer over the value. Unset, the whole value is indexed
    /// as a single presence-only term.
    pub tokenized: bool,
    pub store_positions: bool,
    pub store_offsets: bool,
    pub omit_norms: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        FieldOptions {
            stored: true,
            indexed: true,
            tokenized: true,
            store_positions: true,
            store_offsets: true,
            omit_norms: false,
        }
    }
}

/// One named field of a document.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    pub boost: f32,
    pub options: FieldOptions,
}

impl Field {
    /// Indexed, tokenized and stored text with positions and offsets.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            value: FieldValue::Text(value.into()),
            boost: 1.0,
            options: FieldOptions::default(),
        }
    }

    /// Indexed as one untokenized term, stored. For identifiers and exact
    /// match keys.
    pub fn keyword(name: impl Into<String>, value: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            value: FieldValue::Text(value.into()),
            boost: 1.0,
            options: FieldOptions {
                tokenized: false,
                store_positions: false,
                store_offsets: false,
                omit_norms: true,
                ..FieldOptions::default()
            },
        }
    }

    /// Stored-only opaque bytes; never indexed.
    pub fn binary(name: impl Into<String>, value: Vec<u8>) -> Self {
        Field {
            name: name.into(),
            value: FieldValue::Binary(value),
            boost: 1.0,
            options: FieldOptions {
                indexed: false,
                tokenized: false,
                store_positions: false,
                store_offsets: false,
                omit_norms: true,
                ..FieldOptions::default()
            },
        }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn with_options(mut self, options: FieldOptions) -> Self {
        self.options = options;
        self
    }
}

/// A document: an ordered set of fields plus a document-level boost.
#[derive(Debug, Clone)]
pub struct Document {
    fields: Vec<Field>,
    boost: f32,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Document { fields: Vec::new(), boost: 1.0 }
    }

    pub fn add(&mut self, field: Field) -> &mut Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn boost(&self) -> f32 {
        self.boost
    }

    pub fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    /// First text value of the named field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.name == name).and_then(|f| f.value.as_text())
    }

    /// Every value of the named field, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&FieldValue> {
        self.fields.iter().filter(|f| f.name == name).map(|f| &f.value).collect()
    }
}

/// Field selection for document reads.
#[derive(Debug, Clone, Default)]
pub struct FieldSelector {
    /// Field names to return. `None` returns every stored field except the
    /// reserved meta column.
    pub fields: Option<Vec<String>>,
    /// Other document numbers to fetch and cache in the same round trip.
    /// A batching device for callers that know they will need a cluster of
    /// documents soon (e.g. materializing a top-K result page).
    pub prefetch: Vec<u32>,
}

impl FieldSelector {
    pub fn all() -> Self {
        FieldSelector::default()
    }

    pub fn named(fields: Vec<String>) -> Self {
        FieldSelector { fields: Some(fields), prefetch: Vec::new() }
    }

    pub fn with_prefetch(mut self, prefetch: Vec<u32>) -> Self {
        self.prefetch = prefetch;
        self
    }
}

/// One decoded posting: a document that contains the current term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// Session-local document number.
    pub doc: u32,
    /// Persistent document identifier (the column name in the term row).
    pub doc_id: Vec<u8>,
    pub freq: u32,
    pub positions: Vec<u32>,
    /// (start, end) byte offset pairs, parallel to occurrences.
    pub offsets: Vec<(u32, u32)>,
    pub norm: Option<u8>,
}

/// Engine tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Hard cap on documents numbered within one reader session.
    pub max_docs: u32,
    /// Row count of the first term-dictionary page fetched for a field.
    pub init_page: usize,
    /// Row count of every subsequent page.
    pub chunk_page: usize,
    /// Capacity of the reader's per-session document cache.
    pub doc_cache_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig { max_docs: 1_000_000, init_page: 2, chunk_page: 1024, doc_cache_size: 1024 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_order_field_then_text() {
        let a = Term::new("author", "zzz");
        let b = Term::new("body", "aaa");
        let c = Term::new("body", "aab");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_document_multi_value_access() {
        let mut doc = Document::new();
        doc.add(Field::text("tag", "rust"));
        doc.add(Field::text("tag", "search"));
        assert_eq!(doc.get("tag"), Some("rust"));
        assert_eq!(doc.get_all("tag").len(), 2);
        assert_eq!(doc.get("missing"), None);
    }
}
