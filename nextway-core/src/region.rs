//! Identity of an independently loaded data set.

use std::{fmt, ops::Deref, str::FromStr};

use thiserror::Error;

/// Name of a region whose feed lives in its own store.
///
/// Restricted to ASCII letters, digits, `-` and `_` so it can be embedded in a
/// file name.
///
/// # Examples
/// ```
/// use nextway_core::RegionName;
///
/// let region: RegionName = "victoria".parse().expect("valid region");
/// assert_eq!(region.store_file_name(), "nwt-region-victoria.sqlite");
/// assert!("../victoria".parse::<RegionName>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "String", try_from = "String"))]
pub struct RegionName(String);

/// Region name rejected by [`RegionName::new`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("region name {name:?} must be non-empty ASCII letters, digits, '-' or '_'")]
pub struct InvalidRegionName {
    /// The rejected name.
    pub name: String,
}

impl RegionName {
    /// Validate and wrap a region name.
    ///
    /// # Errors
    /// Returns [`InvalidRegionName`] for empty names or names containing other
    /// characters.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidRegionName> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_');
        if valid {
            Ok(Self(name))
        } else {
            Err(InvalidRegionName { name })
        }
    }

    /// File name of the store backing this region.
    #[must_use]
    pub fn store_file_name(&self) -> String {
        format!("nwt-region-{}.sqlite", self.0)
    }

    /// Borrow the raw name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RegionName {
    type Err = InvalidRegionName;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl TryFrom<String> for RegionName {
    type Error = InvalidRegionName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RegionName> for String {
    fn from(value: RegionName) -> Self {
        value.0
    }
}

impl Deref for RegionName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
