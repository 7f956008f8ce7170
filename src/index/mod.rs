pub mod codec;
pub mod doc_map;
pub mod keys;
pub mod reader;
pub mod scanner;
pub mod term_vector;
pub mod types;
pub mod writer;

pub use doc_map::{DocIdMap, Norms, SessionState, DEFAULT_NORM};
pub use reader::IndexReader;
pub use scanner::TermScanner;
pub use term_vector::TermVector;
pub use types::*;
pub use writer::IndexWriter;
