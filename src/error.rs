//! Error type shared across the crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A stored field value whose trailing tag byte is neither the text
    /// nor the binary marker. The value is unusable; there is no safe
    /// default to fall back to.
    #[error("corrupt stored value for field {field:?}: unknown tag byte {tag:#04x}")]
    CorruptField { field: String, tag: u8 },

    /// The session document limit was hit while numbering a new document.
    /// The session is out of numbers; reopen to start a fresh one.
    #[error("session document capacity of {max} reached")]
    CapacityExceeded { max: u32 },

    /// A persisted value failed to decode.
    #[error("failed to decode {context}: {message}")]
    Decode { context: &'static str, message: String },

    /// A key component (document id, index or field name) contains the
    /// reserved key delimiter.
    #[error("key component contains reserved delimiter bytes: {component:?}")]
    InvalidKeyComponent { component: String },

    /// An operation referenced a document the session does not know.
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// The backing store failed. Transport and consistency concerns live
    /// behind the store trait; this wraps whatever its implementation
    /// reports.
    #[error("store operation failed: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn decode(context: &'static str, message: impl Into<String>) -> Error {
        Error::Decode { context, message: message.into() }
    }

    /// Wrap a backend failure. For use by [`crate::store::KeyValueStore`]
    /// implementations.
    pub fn store(source: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::Store(Box::new(source))
    }
}
