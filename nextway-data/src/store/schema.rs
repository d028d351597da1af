//! Table, index and version bookkeeping for a feed store.

use nextway_core::{CollectionSchema, FieldKind, SchemaCatalogue};
use rusqlite::{Connection, Error as SqliteError, OptionalExtension, Transaction};
use thiserror::Error;

/// Layout version written into `nwt_schema_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Create one table per collection, its indexes, and the version record.
///
/// Running the function again against a store initialised from the same
/// catalogue changes nothing. A store recorded with another version or another
/// catalogue is rejected so it can be rebuilt explicitly.
///
/// # Examples
/// ```
/// use nextway_core::gtfs_catalogue;
/// use nextway_data::store::initialise_schema;
/// use rusqlite::Connection;
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_schema(&mut conn, &gtfs_catalogue()).expect("create feed schema");
/// initialise_schema(&mut conn, &gtfs_catalogue()).expect("second run is a no-op");
///
/// let version: i64 = conn
///     .query_row("SELECT version FROM nwt_schema_version LIMIT 1", [], |row| row.get(0))
///     .expect("read schema version");
/// assert_eq!(version, 1);
/// ```
///
/// # Errors
/// Returns [`SchemaError`] when a statement fails or the recorded version does
/// not match.
pub fn initialise_schema(
    connection: &mut Connection,
    catalogue: &SchemaCatalogue,
) -> Result<(), SchemaError> {
    let transaction = connection
        .transaction()
        .map_err(|source| SchemaError::Migration {
            step: "begin schema transaction",
            source,
        })?;

    ensure_schema_version(&transaction, catalogue)?;
    for schema in catalogue.collections() {
        create_collection(&transaction, schema)?;
    }

    transaction
        .commit()
        .map_err(|source| SchemaError::Migration {
            step: "commit schema transaction",
            source,
        })
}

fn create_collection(
    transaction: &Transaction<'_>,
    schema: &CollectionSchema,
) -> Result<(), SchemaError> {
    let name = schema.name();
    let columns: Vec<String> = schema
        .keyed_fields()
        .into_iter()
        .map(|field| {
            let not_null = if schema.primary_key().contains(&field) {
                " NOT NULL"
            } else {
                ""
            };
            format!("\"{field}\" {}{not_null}", column_type(schema.kind_of(field)))
        })
        .collect();
    let key: Vec<String> = schema
        .primary_key()
        .iter()
        .map(|field| format!("\"{field}\""))
        .collect();
    let table = format!(
        "CREATE TABLE IF NOT EXISTS \"{name}\" ({}, record TEXT NOT NULL, PRIMARY KEY ({}))",
        columns.join(", "),
        key.join(", ")
    );
    run_collection_step(transaction, name, "create table", &table)?;

    for field in schema.indexes() {
        let index = format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{name}_{field}\" ON \"{name}\" (\"{field}\")"
        );
        run_collection_step(transaction, name, "create index", &index)?;
    }
    Ok(())
}

const fn column_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "TEXT",
        FieldKind::Integer | FieldKind::Boolean => "INTEGER",
        FieldKind::Real => "REAL",
    }
}

fn ensure_schema_version(
    transaction: &Transaction<'_>,
    catalogue: &SchemaCatalogue,
) -> Result<(), SchemaError> {
    transaction
        .execute(
            "CREATE TABLE IF NOT EXISTS nwt_schema_version (
                version INTEGER PRIMARY KEY CHECK (version > 0),
                fingerprint TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            ) WITHOUT ROWID",
            [],
        )
        .map_err(|source| SchemaError::Migration {
            step: "create schema version table",
            source,
        })?;

    let existing: Option<(i64, String)> = transaction
        .query_row(
            "SELECT version, fingerprint FROM nwt_schema_version LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|source| SchemaError::Migration {
            step: "read schema version",
            source,
        })?;

    let fingerprint = catalogue.fingerprint();
    match existing {
        Some((version, _)) if version != SCHEMA_VERSION => Err(SchemaError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found: version,
        }),
        Some((_, found)) if found != fingerprint => Err(SchemaError::CatalogueMismatch {
            expected: fingerprint,
            found,
        }),
        Some(_) => Ok(()),
        None => transaction
            .execute(
                "INSERT INTO nwt_schema_version (version, fingerprint) VALUES (?1, ?2)",
                (SCHEMA_VERSION, fingerprint.as_str()),
            )
            .map(|_| ())
            .map_err(|source| SchemaError::Migration {
                step: "record schema version",
                source,
            }),
    }
}

fn run_collection_step(
    transaction: &Transaction<'_>,
    collection: &'static str,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError::Collection {
            collection,
            step,
            source,
        })
}

/// Errors raised when initialising the feed store schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A bookkeeping statement failed.
    #[error("failed to execute migration step '{step}'")]
    Migration {
        /// Step being executed.
        step: &'static str,
        /// Underlying SQLite error.
        #[source]
        source: SqliteError,
    },
    /// A collection's table or index could not be created.
    #[error("failed to {step} for collection {collection}")]
    Collection {
        /// Collection being created.
        collection: &'static str,
        /// Step being executed.
        step: &'static str,
        /// Underlying SQLite error.
        #[source]
        source: SqliteError,
    },
    /// The store was written by a different layout version.
    #[error(
        "expected feed store schema version {expected} but found {found}; rebuild the store \
         before retrying"
    )]
    VersionMismatch {
        /// Version this build writes.
        expected: i64,
        /// Version recorded in the store.
        found: i64,
    },
    /// The store was initialised from a different catalogue.
    #[error("feed store was initialised for collections {found:?} but {expected:?} was requested")]
    CatalogueMismatch {
        /// Fingerprint of the requested catalogue.
        expected: String,
        /// Fingerprint recorded in the store.
        found: String,
    },
}
