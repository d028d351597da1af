//! Typed records parsed from feed rows.

use std::{cmp::Ordering, collections::BTreeMap, fmt};

use thiserror::Error;

/// Declared storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text; never coerced.
    Text,
    /// Signed integer.
    Integer,
    /// Floating-point number.
    Real,
    /// `0`/`1` flag.
    Boolean,
}

/// Single value inside a [`Record`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FieldValue {
    /// `0`/`1` flag.
    Boolean(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating-point number.
    Real(f64),
    /// Free text.
    Text(String),
}

impl FieldValue {
    /// Borrow the text payload, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::Boolean(_) | Self::Integer(_) | Self::Real(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{}", u8::from(*value)),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Boolean(lhs), Self::Boolean(rhs)) => lhs.partial_cmp(rhs),
            (Self::Integer(lhs), Self::Integer(rhs)) => lhs.partial_cmp(rhs),
            (Self::Real(lhs), Self::Real(rhs)) => lhs.partial_cmp(rhs),
            (Self::Text(lhs), Self::Text(rhs)) => lhs.partial_cmp(rhs),
            _ => None,
        }
    }
}

/// Raw cell that could not be coerced to its declared kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("field {field} expects {expected:?} but found {value:?}")]
pub struct CoerceError {
    /// Field being coerced.
    pub field: String,
    /// Declared kind.
    pub expected: FieldKind,
    /// Offending raw text.
    pub value: String,
}

impl FieldKind {
    /// Convert a raw, non-empty cell into a typed value.
    ///
    /// Surrounding whitespace is ignored for numeric and boolean kinds.
    ///
    /// # Errors
    /// Returns [`CoerceError`] when the cell cannot be read as the declared kind.
    pub fn coerce(self, field: &str, raw: &str) -> Result<FieldValue, CoerceError> {
        let trimmed = raw.trim();
        let fail = || CoerceError {
            field: field.to_owned(),
            expected: self,
            value: raw.to_owned(),
        };
        match self {
            Self::Text => Ok(FieldValue::Text(raw.to_owned())),
            Self::Integer => trimmed
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| fail()),
            Self::Real => trimmed
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(FieldValue::Real)
                .ok_or_else(fail),
            Self::Boolean => match trimmed {
                "0" => Ok(FieldValue::Boolean(false)),
                "1" => Ok(FieldValue::Boolean(true)),
                _ => Err(fail()),
            },
        }
    }
}

/// One parsed row, keyed by field name.
///
/// Empty cells are not stored, so an absent field and an empty cell read the
/// same way.
///
/// # Examples
/// ```
/// use nextway_core::{FieldValue, Record};
///
/// let mut record = Record::default();
/// record.insert("stop_id", "S1");
/// record.insert("stop_sequence", 3_i64);
/// assert_eq!(record.get("stop_sequence"), Some(&FieldValue::Integer(3)));
/// assert!(record.get("stop_headsign").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Record(BTreeMap<String, FieldValue>);

impl Record {
    /// Set a field, replacing any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(field.into(), value.into());
    }

    /// Look up a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    /// Number of populated fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no field is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over populated fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        )
    }
}
