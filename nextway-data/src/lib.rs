//! Feed ingestion for the Next Way There engine.
//!
//! Responsibilities:
//! - Unpack feed archives, including nested ones, into a sandboxed working
//!   store.
//! - Locate and validate the feed inside whatever was supplied.
//! - Materialise the schema catalogue in a per-region SQLite store and load
//!   every collection transactionally.
//!
//! Boundaries:
//! - File vocabulary, presence rules and record schemas live in
//!   `nextway-core`; this crate only applies them.
//! - Blocking work (ZIP decoding, file writes, SQLite) runs on the Tokio
//!   blocking pool; the public API is `async`.
//!
//! Invariants:
//! - A collection is either fully replaced or left untouched by a load.
//! - Rejected input never opens the region store.
#![forbid(unsafe_code)]

mod discover;
pub mod extract;
pub mod load;
mod pipeline;
mod source;
pub mod store;

#[cfg(test)]
mod test_support;

pub use discover::{LocateError, locate_feed_root, validate_source};
pub use extract::{
    ExtractDepth, ExtractError, ExtractReport, InvalidDepth, extract, extract_bytes,
};
pub use load::{
    CollectionCount, CollectionLoadError, CompletionBarrier, LoadError, LoadReport, load,
};
pub use pipeline::{
    FeedInput, IngestError, IngestOptions, IngestReport, PreparedFeed, SCRATCH_DIR, ingest,
    prepare,
};
pub use source::{DirectorySource, FeedReader, FeedSource, UploadedFiles};
pub use store::{FeedStore, QueryError, StoreError};
