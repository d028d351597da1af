//! Core domain types for the Next Way There feed ingestion engine.
//!
//! The crate is free of I/O. It describes:
//! - the closed vocabulary of GTFS files ([`FeedFile`]);
//! - the ordered presence rules that decide whether a file set is a usable
//!   feed ([`validate_feed`]);
//! - the collections a feed is loaded into ([`SchemaCatalogue`]);
//! - the typed records produced from feed rows ([`Record`]);
//! - the identity of an independently stored data set ([`RegionName`]).

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod feed;
mod record;
mod region;
pub mod schema;
pub mod validate;

pub use feed::{FeedFile, UnknownFeedFile};
pub use record::{CoerceError, FieldKind, FieldValue, Record};
pub use region::{InvalidRegionName, RegionName};
pub use schema::{CatalogueError, CollectionSchema, SchemaCatalogue, gtfs_catalogue};
pub use validate::{
    CategorisedRule, FailureCategory, FileRule, ValidationFailure, canonical_rules,
    validate_feed, validate_present,
};
