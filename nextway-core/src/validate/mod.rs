//! Presence rules that decide whether a set of files looks like a usable feed.
//!
//! Rules are evaluated in a fixed canonical order and evaluation stops at the
//! first failure, so a feed missing several files always reports the earliest
//! rule it breaks.

use std::{collections::BTreeSet, fmt};

use thiserror::Error;

use crate::FeedFile;

/// Presence predicate over a feed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRule {
    /// `file` must exist.
    Required(FeedFile),
    /// At least one of `file` and `other` must exist.
    RequiredIfAbsent {
        /// File reported when the rule fails.
        file: FeedFile,
        /// Alternative that satisfies the rule on its own.
        other: FeedFile,
    },
    /// When `other` exists, `file` must exist too.
    RequiredIfPresent {
        /// File obligated by `other`.
        file: FeedFile,
        /// Optional file whose presence triggers the obligation.
        other: FeedFile,
    },
}

impl FileRule {
    /// File named when the rule fails.
    #[must_use]
    pub const fn file(self) -> FeedFile {
        match self {
            Self::Required(file)
            | Self::RequiredIfAbsent { file, .. }
            | Self::RequiredIfPresent { file, .. } => file,
        }
    }

    /// Whether the rule holds for the given set of present files.
    #[must_use]
    pub fn holds(self, present: &BTreeSet<FeedFile>) -> bool {
        match self {
            Self::Required(file) => present.contains(&file),
            Self::RequiredIfAbsent { file, other } => {
                present.contains(&file) || present.contains(&other)
            }
            Self::RequiredIfPresent { file, other } => {
                !present.contains(&other) || present.contains(&file)
            }
        }
    }
}

/// Machine-readable reason a feed was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum FailureCategory {
    /// One of the always-required files is absent.
    MissingCore,
    /// Neither calendar definition is present.
    MissingCalendar,
    /// An optional file is present without the file it depends on.
    MissingDependency,
    /// Neither stop definition is present.
    MissingStops,
    /// Only the zone-based stop definition is present, which is valid GTFS but
    /// cannot be loaded.
    UnsupportedStops,
}

impl FailureCategory {
    /// Stable kebab-case identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingCore => "missing-core",
            Self::MissingCalendar => "missing-calendar",
            Self::MissingDependency => "missing-dependency",
            Self::MissingStops => "missing-stops",
            Self::UnsupportedStops => "unsupported-stops",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First rule a feed breaks, with the file to show the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[error("{category}: {file} not found")]
pub struct ValidationFailure {
    /// Category of the broken rule.
    pub category: FailureCategory,
    /// File the broken rule names.
    pub file: FeedFile,
}

/// A rule paired with the category reported when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorisedRule {
    /// Presence predicate.
    pub rule: FileRule,
    /// Category reported on failure.
    pub category: FailureCategory,
}

const CANONICAL_RULES: [CategorisedRule; 8] = [
    core(FeedFile::Agency),
    core(FeedFile::Routes),
    core(FeedFile::Trips),
    core(FeedFile::StopTimes),
    CategorisedRule {
        rule: FileRule::RequiredIfAbsent {
            file: FeedFile::Calendar,
            other: FeedFile::CalendarDates,
        },
        category: FailureCategory::MissingCalendar,
    },
    CategorisedRule {
        rule: FileRule::RequiredIfPresent {
            file: FeedFile::FeedInfo,
            other: FeedFile::Translations,
        },
        category: FailureCategory::MissingDependency,
    },
    CategorisedRule {
        rule: FileRule::RequiredIfAbsent {
            file: FeedFile::Stops,
            other: FeedFile::Locations,
        },
        category: FailureCategory::MissingStops,
    },
    CategorisedRule {
        rule: FileRule::Required(FeedFile::Stops),
        category: FailureCategory::UnsupportedStops,
    },
];

const fn core(file: FeedFile) -> CategorisedRule {
    CategorisedRule {
        rule: FileRule::Required(file),
        category: FailureCategory::MissingCore,
    }
}

/// Rules in canonical order: core files, calendar pair, dependency, stops pair.
#[must_use]
pub const fn canonical_rules() -> &'static [CategorisedRule] {
    &CANONICAL_RULES
}

/// Check discovered file names against the canonical rules.
///
/// Names outside the feed vocabulary are ignored. Returns `None` when every
/// rule holds.
///
/// # Examples
/// ```
/// use nextway_core::{FailureCategory, FeedFile, validate_feed};
///
/// let names = ["routes.txt", "trips.txt", "stop_times.txt", "calendar.txt", "stops.txt"];
/// let failure = validate_feed(names).expect("agency.txt is missing");
/// assert_eq!(failure.category, FailureCategory::MissingCore);
/// assert_eq!(failure.file, FeedFile::Agency);
/// ```
pub fn validate_feed<I, S>(names: I) -> Option<ValidationFailure>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let present: BTreeSet<FeedFile> = names
        .into_iter()
        .filter_map(|name| FeedFile::from_file_name(name.as_ref()))
        .collect();
    validate_present(&present)
}

/// Check an already-classified set of files against the canonical rules.
#[must_use]
pub fn validate_present(present: &BTreeSet<FeedFile>) -> Option<ValidationFailure> {
    canonical_rules()
        .iter()
        .find(|entry| !entry.rule.holds(present))
        .map(|entry| ValidationFailure {
            category: entry.category,
            file: entry.rule.file(),
        })
}
