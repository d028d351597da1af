//! SQLite feed store: one file per region, one table per collection.
//!
//! The module is split into two parts:
//! - [`schema`] materialises the tables and indexes a catalogue declares.
//! - this module opens stores and answers point and range lookups.
//!
//! Each collection table holds its key and index fields as dedicated columns
//! and the full record as JSON in a `record` column.

mod schema;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use nextway_core::{CollectionSchema, FieldValue, Record, RegionName, SchemaCatalogue};
use nextway_fs::ensure_parent_dir;
use rusqlite::{Connection, Error as SqliteError, params_from_iter, types::Value};
use thiserror::Error;

pub use schema::{SCHEMA_VERSION, SchemaError, initialise_schema};

/// How long a connection waits for another process's write lock by default.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised when opening a feed store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The directory holding the store could not be created.
    #[error("failed to create the store directory for {path}")]
    Directory {
        /// Store file path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The database could not be opened or configured.
    #[error("failed to open SQLite store at {path}")]
    Open {
        /// Store file path.
        path: Utf8PathBuf,
        /// Underlying SQLite error.
        #[source]
        source: SqliteError,
    },
    /// The schema could not be initialised or does not match.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Errors raised by store lookups.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The catalogue declares no such collection.
    #[error("unknown collection {collection}")]
    UnknownCollection {
        /// Requested collection.
        collection: String,
    },
    /// The field has no dedicated column in the collection.
    #[error("collection {collection} has no key or index on {field}")]
    NotIndexed {
        /// Collection queried.
        collection: &'static str,
        /// Requested field.
        field: String,
    },
    /// The key has the wrong number of parts.
    #[error("collection {collection} is keyed by {expected} fields but {found} were given")]
    KeyArity {
        /// Collection queried.
        collection: &'static str,
        /// Number of primary key fields.
        expected: usize,
        /// Number of values supplied.
        found: usize,
    },
    /// A stored record could not be decoded.
    #[error("failed to decode a record from {collection}")]
    Decode {
        /// Collection queried.
        collection: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The query itself failed.
    #[error("failed to {operation}")]
    Sqlite {
        /// Operation attempted.
        operation: &'static str,
        /// Underlying SQLite error.
        #[source]
        source: SqliteError,
    },
}

/// Handle on an initialised feed store file.
///
/// # Examples
/// ```
/// use nextway_core::{FieldValue, gtfs_catalogue};
/// use nextway_data::FeedStore;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::tempdir()?;
/// let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("feed.sqlite"))
///     .map_err(|_| "temporary path is not UTF-8")?;
/// let store = FeedStore::open(&path, gtfs_catalogue())?;
/// assert_eq!(store.count("stops")?, 0);
/// assert!(store.get("stops", &[FieldValue::from("S1")])?.is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FeedStore {
    path: Utf8PathBuf,
    catalogue: SchemaCatalogue,
    connection: Connection,
    busy_timeout: Duration,
}

impl FeedStore {
    /// Open (creating if needed) the store at `path` and initialise its schema.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the file cannot be opened or its schema
    /// does not match `catalogue`.
    pub fn open(path: &Utf8Path, catalogue: SchemaCatalogue) -> Result<Self, StoreError> {
        ensure_parent_dir(path).map_err(|source| StoreError::Directory {
            path: path.to_path_buf(),
            source,
        })?;
        let mut connection = connect(path, DEFAULT_BUSY_TIMEOUT)?;
        connection
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        initialise_schema(&mut connection, &catalogue)?;
        debug!("opened feed store at {path}");
        Ok(Self {
            path: path.to_path_buf(),
            catalogue,
            connection,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        })
    }

    /// Open the store of `region` inside `store_dir`.
    ///
    /// # Errors
    /// As for [`FeedStore::open`].
    pub fn open_region(
        store_dir: &Utf8Path,
        region: &RegionName,
        catalogue: SchemaCatalogue,
    ) -> Result<Self, StoreError> {
        Self::open(&store_dir.join(region.store_file_name()), catalogue)
    }

    /// Location of the store file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Catalogue the store was initialised from.
    #[must_use]
    pub const fn catalogue(&self) -> &SchemaCatalogue {
        &self.catalogue
    }

    /// How long connections to this store wait for a held write lock.
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    /// Change the busy timeout of this handle and of the loader's writer.
    ///
    /// # Errors
    /// Returns [`StoreError::Open`] when SQLite rejects the setting.
    pub fn set_busy_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        self.connection
            .busy_timeout(timeout)
            .map_err(|source| StoreError::Open {
                path: self.path.clone(),
                source,
            })?;
        self.busy_timeout = timeout;
        Ok(())
    }

    /// Point lookup by the full primary key, in key field order.
    ///
    /// # Errors
    /// Returns [`QueryError`] for unknown collections, wrong key arity, or
    /// failed queries.
    pub fn get(&self, collection: &str, key: &[FieldValue]) -> Result<Option<Record>, QueryError> {
        let schema = self.schema(collection)?;
        let fields = schema.primary_key();
        if fields.len() != key.len() {
            return Err(QueryError::KeyArity {
                collection: schema.name(),
                expected: fields.len(),
                found: key.len(),
            });
        }
        let filter: Vec<String> = fields
            .iter()
            .enumerate()
            .map(|(position, field)| format!("\"{field}\" = ?{}", position + 1))
            .collect();
        let sql = format!(
            "SELECT record FROM \"{}\" WHERE {}",
            schema.name(),
            filter.join(" AND ")
        );
        let mut records = self.select(schema, &sql, key.iter().map(sql_value))?;
        Ok(records.pop())
    }

    /// Records whose `field` equals `value`, ordered by primary key.
    ///
    /// # Errors
    /// Returns [`QueryError::NotIndexed`] when `field` is neither a key nor an
    /// index field.
    pub fn find_by_index(
        &self,
        collection: &str,
        field: &str,
        value: &FieldValue,
    ) -> Result<Vec<Record>, QueryError> {
        let schema = self.indexed(collection, field)?;
        let sql = format!(
            "SELECT record FROM \"{}\" WHERE \"{field}\" = ?1 ORDER BY {}",
            schema.name(),
            order_by_key(schema)
        );
        self.select(schema, &sql, [sql_value(value)])
    }

    /// Records whose `field` lies within `lower..=upper`, ordered by that field
    /// then primary key.
    ///
    /// # Errors
    /// As for [`FeedStore::find_by_index`].
    pub fn range_by_index(
        &self,
        collection: &str,
        field: &str,
        lower: &FieldValue,
        upper: &FieldValue,
    ) -> Result<Vec<Record>, QueryError> {
        let schema = self.indexed(collection, field)?;
        let sql = format!(
            "SELECT record FROM \"{}\" WHERE \"{field}\" BETWEEN ?1 AND ?2 \
             ORDER BY \"{field}\", {}",
            schema.name(),
            order_by_key(schema)
        );
        self.select(schema, &sql, [sql_value(lower), sql_value(upper)])
    }

    /// Number of records in `collection`.
    ///
    /// # Errors
    /// Returns [`QueryError`] for unknown collections or failed queries.
    pub fn count(&self, collection: &str) -> Result<u64, QueryError> {
        let schema = self.schema(collection)?;
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", schema.name());
        let count: i64 = self
            .connection
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|source| QueryError::Sqlite {
                operation: "count records",
                source,
            })?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn schema(&self, collection: &str) -> Result<&CollectionSchema, QueryError> {
        self.catalogue
            .get(collection)
            .ok_or_else(|| QueryError::UnknownCollection {
                collection: collection.to_owned(),
            })
    }

    fn indexed(&self, collection: &str, field: &str) -> Result<&CollectionSchema, QueryError> {
        let schema = self.schema(collection)?;
        if schema.is_keyed(field) {
            Ok(schema)
        } else {
            Err(QueryError::NotIndexed {
                collection: schema.name(),
                field: field.to_owned(),
            })
        }
    }

    fn select(
        &self,
        schema: &CollectionSchema,
        sql: &str,
        params: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<Record>, QueryError> {
        let mut statement = self
            .connection
            .prepare_cached(sql)
            .map_err(|source| QueryError::Sqlite {
                operation: "prepare lookup",
                source,
            })?;
        let rows = statement
            .query_map(params_from_iter(params), |row| row.get::<_, String>(0))
            .map_err(|source| QueryError::Sqlite {
                operation: "run lookup",
                source,
            })?;
        let mut records = Vec::new();
        for row in rows {
            let json = row.map_err(|source| QueryError::Sqlite {
                operation: "read lookup row",
                source,
            })?;
            let record = serde_json::from_str(&json).map_err(|source| QueryError::Decode {
                collection: schema.name(),
                source,
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

pub(crate) fn connect(path: &Utf8Path, busy_timeout: Duration) -> Result<Connection, StoreError> {
    let open_failed = |source| StoreError::Open {
        path: path.to_path_buf(),
        source,
    };
    let connection = Connection::open(path).map_err(open_failed)?;
    connection.busy_timeout(busy_timeout).map_err(open_failed)?;
    Ok(connection)
}

fn order_by_key(schema: &CollectionSchema) -> String {
    schema
        .primary_key()
        .iter()
        .map(|field| format!("\"{field}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convert a field value into its SQLite representation.
pub(crate) fn sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Boolean(flag) => Value::Integer(i64::from(*flag)),
        FieldValue::Integer(number) => Value::Integer(*number),
        FieldValue::Real(number) => Value::Real(*number),
        FieldValue::Text(text) => Value::Text(text.clone()),
    }
}
