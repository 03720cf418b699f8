pub mod builder;
pub mod error;
pub mod extract;
pub mod index;
pub mod merge;
pub mod persist;
pub mod search;
pub mod tokenizer;

pub use builder::{build_partials, build_partials_into, BuilderConfig, IndexBuilder};
pub use error::IndexError;
pub use extract::{extract_document, ExtractedDocument, RawRecord};
pub use index::{DocId, DocMeta, DocRecord, FinalIndex, PartialIndex, Posting};
pub use merge::merge_partials;
pub use search::{QueryEngine, SearchHit, SearchPage, DEFAULT_TOP_K};
