//! Header-delimited table parsing into typed records.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord};
use nextway_core::{CoerceError, CollectionSchema, Record};
use thiserror::Error;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Why a single row could not be turned into a record.
#[derive(Debug, Error)]
pub enum RowError {
    /// The table is not well-formed CSV.
    #[error("invalid CSV")]
    Csv(#[from] csv::Error),
    /// A cell does not match its declared kind.
    #[error(transparent)]
    Coerce(#[from] CoerceError),
    /// A primary key field is empty or absent.
    #[error("primary key field {field} is empty")]
    MissingKey {
        /// Key field lacking a value.
        field: &'static str,
    },
    /// The row has more cells than the header names.
    #[error("row has {found} cells but the header names {expected}")]
    ExtraCells {
        /// Header width.
        expected: usize,
        /// Row width.
        found: usize,
    },
}

/// Row-numbered parse failure; rows count from 1 at the header line.
#[derive(Debug, Error)]
#[error("row {row}: {source}")]
pub struct MalformedRow {
    /// Line the failing row starts on.
    pub row: u64,
    /// What was wrong with it.
    #[source]
    pub source: RowError,
}

/// Parse a whole table into records for `schema`.
///
/// The first row names the fields. A leading byte order mark is dropped and
/// header names are trimmed. Rows whose cells are all blank are skipped, and
/// empty cells are left out of the record.
///
/// # Errors
/// Returns the first [`MalformedRow`]; nothing is returned for the other rows.
pub fn parse_table<R: Read>(
    schema: &CollectionSchema,
    reader: R,
) -> Result<Vec<Record>, MalformedRow> {
    let mut csv = ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);
    let headers: Vec<String> = csv
        .headers()
        .map_err(|source| MalformedRow {
            row: 1,
            source: source.into(),
        })?
        .iter()
        .map(|name| name.trim_start_matches(BYTE_ORDER_MARK).trim().to_owned())
        .collect();

    let mut records = Vec::new();
    let mut row = StringRecord::new();
    loop {
        let line = csv.position().line();
        match csv.read_record(&mut row) {
            Ok(false) => break,
            Ok(true) => {}
            Err(source) => {
                return Err(MalformedRow {
                    row: line,
                    source: source.into(),
                });
            }
        }
        let line = row.position().map_or(line, csv::Position::line);
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let record = build_record(schema, &headers, &row).map_err(|source| MalformedRow {
            row: line,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

fn build_record(
    schema: &CollectionSchema,
    headers: &[String],
    row: &StringRecord,
) -> Result<Record, RowError> {
    if row.len() > headers.len() {
        return Err(RowError::ExtraCells {
            expected: headers.len(),
            found: row.len(),
        });
    }
    let mut record = Record::default();
    for (field, cell) in headers.iter().zip(row.iter()) {
        if field.is_empty() || cell.is_empty() {
            continue;
        }
        let value = schema.kind_of(field).coerce(field, cell)?;
        record.insert(field.as_str(), value);
    }
    if let Some(field) = schema
        .primary_key()
        .iter()
        .copied()
        .find(|field| record.get(field).is_none())
    {
        return Err(RowError::MissingKey { field });
    }
    Ok(record)
}
