//! Row-key construction and parsing.
//!
//! All keys are built from an index namespace plus components joined by a
//! fixed delimiter. The delimiter is `0xFF 0xFF`: the byte `0xFF` never
//! occurs in valid UTF-8, so string components (index names, field names,
//! term text) can never collide with it. Binary components (caller-supplied
//! document ids) are validated instead.
//!
//! Term row keys are `index ++ DELIM ++ field ++ DELIM ++ text`. Because the
//! delimiter compares greater than every UTF-8 byte, all keys of one field
//! form a contiguous key range, closed off by the field-end sentinel text
//! (`0xFF x 4`), which sorts after any real term text.

use memchr::memmem;

use crate::error::{Error, Result};
use crate::index::types::Term;
use crate::store::RowKey;

/// Component separator inside row keys and multi-valued field payloads.
pub const DELIMITER: &[u8] = &[0xFF, 0xFF];

/// Sentinel term text marking end-of-field; never a real term.
pub(crate) const FIELD_END_TEXT: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF];

pub(crate) fn contains_delimiter(bytes: &[u8]) -> bool {
    memmem::find(bytes, DELIMITER).is_some()
}

/// Row key of one term's posting row.
pub fn term_key(index: &str, term: &Term) -> RowKey {
    let mut key = Vec::with_capacity(
        index.len() + term.field().len() + term.text().len() + 2 * DELIMITER.len(),
    );
    key.extend_from_slice(index.as_bytes());
    key.extend_from_slice(DELIMITER);
    key.extend_from_slice(term.field().as_bytes());
    key.extend_from_slice(DELIMITER);
    key.extend_from_slice(term.text().as_bytes());
    RowKey(key)
}

/// Exclusive upper bound for range scans over one field's term rows.
pub fn field_end_key(index: &str, field: &str) -> RowKey {
    let mut key = Vec::with_capacity(
        index.len() + field.len() + 2 * DELIMITER.len() + FIELD_END_TEXT.len(),
    );
    key.extend_from_slice(index.as_bytes());
    key.extend_from_slice(DELIMITER);
    key.extend_from_slice(field.as_bytes());
    key.extend_from_slice(DELIMITER);
    key.extend_from_slice(FIELD_END_TEXT);
    RowKey(key)
}

/// Row key of a document's stored-field row.
///
/// Fails if the identifier embeds the delimiter; generated ids never do,
/// caller-supplied ids must not.
pub fn doc_key(index: &str, doc_id: &[u8]) -> Result<RowKey> {
    if contains_delimiter(doc_id) {
        return Err(Error::InvalidKeyComponent {
            component: String::from_utf8_lossy(doc_id).into_owned(),
        });
    }
    let mut key = Vec::with_capacity(index.len() + DELIMITER.len() + doc_id.len());
    key.extend_from_slice(index.as_bytes());
    key.extend_from_slice(DELIMITER);
    key.extend_from_slice(doc_id);
    Ok(RowKey(key))
}

/// Parse a term row key back into its [`Term`].
///
/// Returns `None` for keys from another namespace, keys without both
/// components, or components that are not valid UTF-8 (e.g. sentinel rows).
/// Range scans use this as a defensive filter against replication and
/// partitioner artifacts.
pub fn parse_term_key(index: &str, key: &RowKey) -> Option<Term> {
    let bytes = key.as_bytes();
    let prefix_len = index.len() + DELIMITER.len();
    if bytes.len() < prefix_len
        || &bytes[..index.len()] != index.as_bytes()
        || &bytes[index.len()..prefix_len] != DELIMITER
    {
        return None;
    }

    let rest = &bytes[prefix_len..];
    let split = memmem::find(rest, DELIMITER)?;
    let field = std::str::from_utf8(&rest[..split]).ok()?;
    let text = std::str::from_utf8(&rest[split + DELIMITER.len()..]).ok()?;
    Some(Term::new(field, text))
}
