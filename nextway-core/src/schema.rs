//! Declarative description of the collections a feed is loaded into.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::{FeedFile, FieldKind};

/// Schema of a single collection.
///
/// # Examples
/// ```
/// use nextway_core::{CollectionSchema, FeedFile, FieldKind};
///
/// let schema = CollectionSchema::new("levels", FeedFile::Levels, &["level_id"])
///     .with_indexes(&["level_index"])
///     .with_fields(&[("level_index", FieldKind::Real)]);
/// assert_eq!(schema.kind_of("level_index"), FieldKind::Real);
/// assert_eq!(schema.kind_of("level_name"), FieldKind::Text);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    name: &'static str,
    source: FeedFile,
    primary_key: Vec<&'static str>,
    indexes: Vec<&'static str>,
    fields: Vec<(&'static str, FieldKind)>,
}

impl CollectionSchema {
    /// Declare a collection loaded from `source` and keyed by `primary_key`.
    #[must_use]
    pub fn new(name: &'static str, source: FeedFile, primary_key: &[&'static str]) -> Self {
        Self {
            name,
            source,
            primary_key: primary_key.to_vec(),
            indexes: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Add secondary index fields, in order.
    #[must_use]
    pub fn with_indexes(mut self, indexes: &[&'static str]) -> Self {
        self.indexes.extend_from_slice(indexes);
        self
    }

    /// Declare non-text field types.
    #[must_use]
    pub fn with_fields(mut self, fields: &[(&'static str, FieldKind)]) -> Self {
        self.fields.extend_from_slice(fields);
        self
    }

    /// Collection name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Feed file the collection is loaded from.
    #[must_use]
    pub const fn source(&self) -> FeedFile {
        self.source
    }

    /// Primary key fields; more than one means a composite key.
    #[must_use]
    pub fn primary_key(&self) -> &[&'static str] {
        &self.primary_key
    }

    /// Secondary index fields in declaration order.
    #[must_use]
    pub fn indexes(&self) -> &[&'static str] {
        &self.indexes
    }

    /// Declared kind of `field`; undeclared fields are text.
    #[must_use]
    pub fn kind_of(&self, field: &str) -> FieldKind {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map_or(FieldKind::Text, |(_, kind)| *kind)
    }

    /// Key fields followed by index fields, without duplicates.
    ///
    /// These are the fields stored as dedicated columns.
    #[must_use]
    pub fn keyed_fields(&self) -> Vec<&'static str> {
        let mut seen = BTreeSet::new();
        self.primary_key
            .iter()
            .chain(&self.indexes)
            .copied()
            .filter(|field| seen.insert(*field))
            .collect()
    }

    /// Whether `field` has a dedicated column usable for lookups.
    #[must_use]
    pub fn is_keyed(&self, field: &str) -> bool {
        self.primary_key.contains(&field) || self.indexes.contains(&field)
    }
}

/// Problems found when assembling a catalogue.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogueError {
    /// Two collections share a name.
    #[error("collection {name} is declared twice")]
    DuplicateCollection {
        /// Repeated collection name.
        name: &'static str,
    },
    /// A collection declares no primary key.
    #[error("collection {name} has no primary key")]
    MissingPrimaryKey {
        /// Collection lacking a key.
        name: &'static str,
    },
    /// A collection or keyed field name is not a plain identifier.
    #[error(
        "collection {name:?} and its keyed fields must be lowercase ASCII letters, digits or \
         underscores"
    )]
    InvalidName {
        /// Rejected name.
        name: &'static str,
    },
}

/// Ordered set of collection schemas sharing one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCatalogue {
    collections: Vec<CollectionSchema>,
}

impl SchemaCatalogue {
    /// Build a catalogue, rejecting duplicate names and keyless collections.
    ///
    /// # Errors
    /// Returns [`CatalogueError`] when a schema is malformed.
    pub fn new(collections: Vec<CollectionSchema>) -> Result<Self, CatalogueError> {
        let mut names = BTreeSet::new();
        for schema in &collections {
            if !is_identifier(schema.name)
                || schema.keyed_fields().iter().any(|field| !is_identifier(field))
            {
                return Err(CatalogueError::InvalidName { name: schema.name });
            }
            if schema.primary_key.is_empty() {
                return Err(CatalogueError::MissingPrimaryKey { name: schema.name });
            }
            if !names.insert(schema.name) {
                return Err(CatalogueError::DuplicateCollection { name: schema.name });
            }
        }
        Ok(Self { collections })
    }

    /// Collections in declaration order.
    #[must_use]
    pub fn collections(&self) -> &[CollectionSchema] {
        &self.collections
    }

    /// Look up a collection by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.iter().find(|schema| schema.name == name)
    }

    /// Stable textual description of every key and index.
    ///
    /// Stored alongside the schema version so a store initialised from a
    /// different catalogue is detected.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        self.collections
            .iter()
            .map(|schema| {
                format!(
                    "{}({})[{}]",
                    schema.name,
                    schema.primary_key.join(","),
                    schema.indexes.join(",")
                )
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'_')
}

/// Catalogue used for GTFS feeds.
///
/// The first seven collections cover the files every supported feed needs;
/// the remainder load common optional files when present.
#[must_use]
pub fn gtfs_catalogue() -> SchemaCatalogue {
    use FieldKind::{Boolean, Integer, Real};

    let collections = vec![
        CollectionSchema::new("agencies", FeedFile::Agency, &["agency_id"]),
        CollectionSchema::new("stops", FeedFile::Stops, &["stop_id"])
            .with_indexes(&["stop_code", "stop_name", "parent_station"])
            .with_fields(&[
                ("stop_lat", Real),
                ("stop_lon", Real),
                ("location_type", Integer),
                ("wheelchair_boarding", Integer),
            ]),
        CollectionSchema::new("routes", FeedFile::Routes, &["route_id"])
            .with_indexes(&[
                "agency_id",
                "route_short_name",
                "route_long_name",
                "route_type",
            ])
            .with_fields(&[("route_type", Integer), ("route_sort_order", Integer)]),
        CollectionSchema::new("trips", FeedFile::Trips, &["trip_id"])
            .with_indexes(&["route_id", "service_id", "direction_id"])
            .with_fields(&[
                ("direction_id", Integer),
                ("wheelchair_accessible", Integer),
                ("bikes_allowed", Integer),
            ]),
        CollectionSchema::new("stop_times", FeedFile::StopTimes, &["trip_id", "stop_sequence"])
            .with_indexes(&[
                "arrival_time",
                "departure_time",
                "stop_id",
                "pickup_type",
                "drop_off_type",
            ])
            .with_fields(&[
                ("stop_sequence", Integer),
                ("pickup_type", Integer),
                ("drop_off_type", Integer),
                ("shape_dist_traveled", Real),
                ("timepoint", Integer),
            ]),
        CollectionSchema::new("calendar", FeedFile::Calendar, &["service_id"])
            .with_indexes(&[
                "monday",
                "tuesday",
                "wednesday",
                "thursday",
                "friday",
                "saturday",
                "sunday",
            ])
            .with_fields(&[
                ("monday", Boolean),
                ("tuesday", Boolean),
                ("wednesday", Boolean),
                ("thursday", Boolean),
                ("friday", Boolean),
                ("saturday", Boolean),
                ("sunday", Boolean),
            ]),
        CollectionSchema::new("calendar_dates", FeedFile::CalendarDates, &["service_id", "date"])
            .with_indexes(&["date"])
            .with_fields(&[("exception_type", Integer)]),
        CollectionSchema::new("shapes", FeedFile::Shapes, &["shape_id", "shape_pt_sequence"])
            .with_fields(&[
                ("shape_pt_lat", Real),
                ("shape_pt_lon", Real),
                ("shape_pt_sequence", Integer),
                ("shape_dist_traveled", Real),
            ]),
        CollectionSchema::new("frequencies", FeedFile::Frequencies, &["trip_id", "start_time"])
            .with_fields(&[("headway_secs", Integer), ("exact_times", Integer)]),
        CollectionSchema::new(
            "transfers",
            FeedFile::Transfers,
            &["from_stop_id", "to_stop_id"],
        )
        .with_indexes(&["to_stop_id"])
        .with_fields(&[("transfer_type", Integer), ("min_transfer_time", Integer)]),
        CollectionSchema::new("fare_attributes", FeedFile::FareAttributes, &["fare_id"])
            .with_indexes(&["agency_id"])
            .with_fields(&[
                ("price", Real),
                ("payment_method", Integer),
                ("transfer_duration", Integer),
            ]),
        CollectionSchema::new("levels", FeedFile::Levels, &["level_id"])
            .with_fields(&[("level_index", Real)]),
        CollectionSchema::new("pathways", FeedFile::Pathways, &["pathway_id"])
            .with_indexes(&["from_stop_id", "to_stop_id"])
            .with_fields(&[
                ("pathway_mode", Integer),
                ("is_bidirectional", Integer),
                ("traversal_time", Integer),
            ]),
    ];
    SchemaCatalogue { collections }
}
