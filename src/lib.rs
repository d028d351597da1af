//! Facade crate for the Next Way There feed ingestion engine.
//!
//! This crate re-exports the feed vocabulary and schema catalogue from
//! `nextway-core` and, behind the `ingest` feature, the ingestion pipeline and
//! feed store from `nextway-data`.

#![forbid(unsafe_code)]

pub use nextway_core::{
    CollectionSchema, FailureCategory, FeedFile, FieldKind, FieldValue, Record, RegionName,
    SchemaCatalogue, ValidationFailure, gtfs_catalogue, validate_feed,
};

#[cfg(feature = "ingest")]
pub use nextway_data::{
    ExtractDepth, FeedInput, FeedSource, FeedStore, IngestError, IngestOptions, IngestReport,
    UploadedFiles, ingest, prepare,
};
