//! Transactional bulk loading of feed files into a [`FeedStore`].
//!
//! Every collection of the catalogue becomes one unit of work on the blocking
//! pool: open its source file, parse the whole table, then replace the
//! collection's contents in a single transaction. Opening and parsing run
//! concurrently; commits go one at a time through the run's single writer
//! connection, so sibling collections never wait on each other's write lock.
//! Collections never share a transaction, so one failing collection leaves
//! the others committed. A [`CompletionBarrier`] decides when the run is over.

mod barrier;
mod parse;

use std::{
    io,
    iter::once,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use camino::Utf8PathBuf;
use log::{debug, info, warn};
use nextway_core::{CollectionSchema, FeedFile, Record};
use rusqlite::{
    Connection, Error as SqliteError, TransactionBehavior, params_from_iter, types::Value,
};
use serde::Serialize;
use thiserror::Error;

pub use barrier::{CompletionBarrier, DispatchClosed, Settle};
pub use parse::{MalformedRow, RowError, parse_table};

use crate::{
    FeedSource,
    source::FeedReader,
    store::{FeedStore, StoreError, connect, sql_value},
};

/// Why a single collection was not loaded.
#[derive(Debug, Error)]
pub enum CollectionLoadError {
    /// The source table has a malformed row; no transaction was opened.
    #[error("failed to parse {collection} at row {row}")]
    ParseMalformed {
        /// Collection being loaded.
        collection: &'static str,
        /// Line the failing row starts on.
        row: u64,
        /// What was wrong with the row.
        #[source]
        source: RowError,
    },
    /// The source file exists but could not be opened.
    #[error("failed to open {file} for {collection}")]
    ReadSource {
        /// Collection being loaded.
        collection: &'static str,
        /// Source file.
        file: FeedFile,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The writer could not reach the store.
    #[error("failed to connect to the store for {collection}")]
    Connect {
        /// Collection being loaded.
        collection: &'static str,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
    /// The transaction failed and was rolled back.
    #[error("transaction for {collection} was rolled back")]
    TransactionAborted {
        /// Collection being loaded.
        collection: &'static str,
        /// Underlying SQLite error.
        #[source]
        source: SqliteError,
    },
    /// A record could not be serialised for storage.
    #[error("failed to encode a record for {collection}")]
    Encode {
        /// Collection being loaded.
        collection: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The loader task ended without reporting an outcome.
    #[error("loader task for {collection} did not complete")]
    Task {
        /// Collection being loaded.
        collection: &'static str,
    },
}

impl CollectionLoadError {
    /// Collection the failure belongs to.
    #[must_use]
    pub const fn collection(&self) -> &'static str {
        match self {
            Self::ParseMalformed { collection, .. }
            | Self::ReadSource { collection, .. }
            | Self::Connect { collection, .. }
            | Self::TransactionAborted { collection, .. }
            | Self::Encode { collection, .. }
            | Self::Task { collection } => *collection,
        }
    }
}

/// Records committed for one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionCount {
    /// Collection name.
    pub collection: &'static str,
    /// Records committed.
    pub records: usize,
}

/// Outcome of a load run, in catalogue order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Collections committed and their record counts.
    pub collections: Vec<CollectionCount>,
    /// Collections whose source file was absent.
    pub skipped: Vec<&'static str>,
}

impl LoadReport {
    /// Records committed for `collection`, if it was loaded.
    #[must_use]
    pub fn records(&self, collection: &str) -> Option<usize> {
        self.collections
            .iter()
            .find(|count| count.collection == collection)
            .map(|count| count.records)
    }
}

/// One or more collections failed to load; the rest stayed committed.
#[derive(Debug, Error)]
#[error("failed to load {}", describe(.failures))]
pub struct LoadError {
    /// Every failed collection, in catalogue order.
    pub failures: Vec<CollectionLoadError>,
    /// What was committed despite the failures.
    pub report: LoadReport,
}

fn describe(failures: &[CollectionLoadError]) -> String {
    failures
        .iter()
        .map(CollectionLoadError::collection)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug)]
enum Loaded {
    Committed(usize),
    Absent,
}

type Outcome = Result<Loaded, CollectionLoadError>;

enum Pending {
    Dispatched(usize),
    Failed(CollectionLoadError),
}

/// The one connection a load run commits through, opened on first use.
struct Writer {
    path: Utf8PathBuf,
    busy_timeout: Duration,
    connection: Mutex<Option<Connection>>,
}

impl Writer {
    fn new(store: &FeedStore) -> Self {
        Self {
            path: store.path().to_path_buf(),
            busy_timeout: store.busy_timeout(),
            connection: Mutex::new(None),
        }
    }

    /// Hold the writer for the whole of one collection's transaction.
    fn commit(
        &self,
        schema: &CollectionSchema,
        records: &[Record],
    ) -> Result<usize, CollectionLoadError> {
        let collection = schema.name();
        let mut guard = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let connection = match guard.take() {
            Some(connection) => connection,
            None => connect(&self.path, self.busy_timeout)
                .map_err(|source| CollectionLoadError::Connect { collection, source })?,
        };
        write_collection(guard.insert(connection), schema, records)
    }
}

/// Load every collection of the store's catalogue from `source`.
///
/// Takes `source` by value so loader tasks can open its files on the
/// blocking pool. Resolves once dispatch is closed and every dispatched
/// collection has settled.
///
/// # Errors
/// Returns [`LoadError`] listing every collection that failed.
pub async fn load<S>(source: S, store: &FeedStore) -> Result<LoadReport, LoadError>
where
    S: FeedSource + 'static,
{
    let source: Arc<dyn FeedSource> = Arc::new(source);
    let barrier = Arc::new(CompletionBarrier::new());
    let slots: Arc<Mutex<Vec<Option<Outcome>>>> = Arc::default();
    let writer = Arc::new(Writer::new(store));
    let mut plan = Vec::new();

    for schema in store.catalogue().collections() {
        let unit = Unit {
            schema: schema.clone(),
            source: Arc::clone(&source),
            writer: Arc::clone(&writer),
        };
        plan.push((schema.name(), dispatch(&barrier, &slots, unit)));
    }
    barrier.close_dispatch();
    barrier.wait().await;

    let mut outcomes =
        std::mem::take(&mut *slots.lock().unwrap_or_else(PoisonError::into_inner));
    let mut report = LoadReport::default();
    let mut failures = Vec::new();
    for (collection, pending) in plan {
        let outcome = match pending {
            Pending::Failed(err) => Err(err),
            Pending::Dispatched(slot) => outcomes
                .get_mut(slot)
                .and_then(Option::take)
                .unwrap_or_else(|| Err(CollectionLoadError::Task { collection })),
        };
        match outcome {
            Ok(Loaded::Committed(records)) => {
                info!("loaded {records} records into {collection}");
                report.collections.push(CollectionCount {
                    collection,
                    records,
                });
            }
            Ok(Loaded::Absent) => report.skipped.push(collection),
            Err(err) => {
                warn!("{err}");
                failures.push(err);
            }
        }
    }

    if failures.is_empty() {
        Ok(report)
    } else {
        Err(LoadError { failures, report })
    }
}

/// Everything one collection task needs, owned.
struct Unit {
    schema: CollectionSchema,
    source: Arc<dyn FeedSource>,
    writer: Arc<Writer>,
}

fn dispatch(
    barrier: &Arc<CompletionBarrier>,
    slots: &Arc<Mutex<Vec<Option<Outcome>>>>,
    unit: Unit,
) -> Pending {
    let collection = unit.schema.name();
    let Ok(settle) = barrier.dispatch() else {
        return Pending::Failed(CollectionLoadError::Task { collection });
    };
    let slot = {
        let mut guard = slots.lock().unwrap_or_else(PoisonError::into_inner);
        guard.push(None);
        guard.len() - 1
    };
    let slots = Arc::clone(slots);
    debug!("dispatching load of {collection}");
    tokio::task::spawn_blocking(move || {
        let outcome = load_collection(&unit);
        drop(unit);
        if let Some(entry) = slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(slot)
        {
            *entry = Some(outcome);
        }
        drop(settle);
    });
    Pending::Dispatched(slot)
}

fn load_collection(unit: &Unit) -> Outcome {
    let schema = &unit.schema;
    let collection = schema.name();
    let file = schema.source();
    let Some(reader) = open_source(unit.source.as_ref(), schema)? else {
        debug!("{file} not present; skipping {collection}");
        return Ok(Loaded::Absent);
    };
    let records = parse_table(schema, reader).map_err(|err| {
        CollectionLoadError::ParseMalformed {
            collection,
            row: err.row,
            source: err.source,
        }
    })?;
    unit.writer
        .commit(schema, &records)
        .map(Loaded::Committed)
}

fn open_source(
    source: &dyn FeedSource,
    schema: &CollectionSchema,
) -> Result<Option<FeedReader>, CollectionLoadError> {
    let file = schema.source();
    source
        .open(file.file_name())
        .map_err(|err| CollectionLoadError::ReadSource {
            collection: schema.name(),
            file,
            source: err,
        })
}

/// Replace the contents of one collection inside a single transaction.
fn write_collection(
    connection: &mut Connection,
    schema: &CollectionSchema,
    records: &[Record],
) -> Result<usize, CollectionLoadError> {
    let collection = schema.name();
    let aborted = |source| CollectionLoadError::TransactionAborted { collection, source };
    let columns = schema.keyed_fields();
    let names: Vec<String> = columns
        .iter()
        .map(|field| format!("\"{field}\""))
        .chain(once("record".to_owned()))
        .collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|index| format!("?{index}")).collect();

    let transaction = connection
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(aborted)?;
    transaction
        .execute(&format!("DELETE FROM \"{collection}\""), [])
        .map_err(aborted)?;
    {
        let mut insert = transaction
            .prepare(&format!(
                "INSERT INTO \"{collection}\" ({}) VALUES ({})",
                names.join(", "),
                placeholders.join(", ")
            ))
            .map_err(aborted)?;
        for record in records {
            let json = serde_json::to_string(record)
                .map_err(|source| CollectionLoadError::Encode { collection, source })?;
            let values = columns
                .iter()
                .map(|field| record.get(field).map_or(Value::Null, sql_value))
                .chain(once(Value::Text(json)));
            insert.execute(params_from_iter(values)).map_err(aborted)?;
        }
    }
    transaction.commit().map_err(aborted)?;
    Ok(records.len())
}
