//! Shared utilities.
//!
//! - [`encoding`] - Variable-length integer and delta encoding (varint)
//! - [`tokenizer`] - Tokenizer capability traits and a simple analyzer

pub mod encoding;
pub mod tokenizer;

pub use encoding::*;
pub use tokenizer::*;
