//! Vocabulary of files recognised inside a GTFS feed.

use std::{fmt, str::FromStr};

use thiserror::Error;

macro_rules! feed_files {
    ($($(#[$meta:meta])* $variant:ident => $name:literal,)+) => {
        /// A file name from the GTFS static reference.
        ///
        /// The set is closed: anything else found in a feed directory is
        /// ignored by validation and loading.
        ///
        /// # Examples
        /// ```
        /// use nextway_core::FeedFile;
        ///
        /// let file: FeedFile = "stop_times.txt".parse().expect("known file");
        /// assert_eq!(file, FeedFile::StopTimes);
        /// assert_eq!(file.file_name(), "stop_times.txt");
        /// ```
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(into = "String", try_from = "String"))]
        pub enum FeedFile {
            $($(#[$meta])* $variant,)+
        }

        impl FeedFile {
            /// Every recognised file in reference order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// File name as it appears inside the feed.
            #[must_use]
            pub const fn file_name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            /// Look up a file by its exact name.
            #[must_use]
            pub fn from_file_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

feed_files! {
    /// Transit agencies operating services in the feed.
    Agency => "agency.txt",
    /// Stops, stations and other locations.
    Stops => "stops.txt",
    /// Transit routes.
    Routes => "routes.txt",
    /// Trips for each route.
    Trips => "trips.txt",
    /// Arrival and departure times per trip and stop.
    StopTimes => "stop_times.txt",
    /// Weekly service patterns.
    Calendar => "calendar.txt",
    /// Service exceptions by date.
    CalendarDates => "calendar_dates.txt",
    /// Fare information (legacy fares).
    FareAttributes => "fare_attributes.txt",
    /// Fare application rules (legacy fares).
    FareRules => "fare_rules.txt",
    /// Time frames used by fare rules.
    Timeframes => "timeframes.txt",
    /// Fare media.
    FareMedia => "fare_media.txt",
    /// Fare products.
    FareProducts => "fare_products.txt",
    /// Fare rules for individual legs.
    FareLegRules => "fare_leg_rules.txt",
    /// Fare rules for joined legs.
    FareLegJoinRules => "fare_leg_join_rules.txt",
    /// Fare rules for transfers between legs.
    FareTransferRules => "fare_transfer_rules.txt",
    /// Area groupings of stops.
    Areas => "areas.txt",
    /// Assignment of stops to areas.
    StopAreas => "stop_areas.txt",
    /// Route network groupings.
    Networks => "networks.txt",
    /// Assignment of routes to networks.
    RouteNetworks => "route_networks.txt",
    /// Vehicle travel paths.
    Shapes => "shapes.txt",
    /// Headway-based service.
    Frequencies => "frequencies.txt",
    /// Transfer rules between routes and stops.
    Transfers => "transfers.txt",
    /// Pathways inside stations.
    Pathways => "pathways.txt",
    /// Levels inside stations.
    Levels => "levels.txt",
    /// Groups of stops for demand-responsive services.
    LocationGroups => "location_groups.txt",
    /// Assignment of stops to location groups.
    LocationGroupStops => "location_groups_stops.txt",
    /// GeoJSON zones for demand-responsive services.
    Locations => "locations.geojson",
    /// Booking rules for demand-responsive services.
    BookingRules => "booking_rules.txt",
    /// Translations of customer-facing text.
    Translations => "translations.txt",
    /// Dataset metadata.
    FeedInfo => "feed_info.txt",
    /// Dataset attributions.
    Attributions => "attributions.txt",
}

impl fmt::Display for FeedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Error returned when parsing a name outside the feed vocabulary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{name:?} is not a recognised GTFS file")]
pub struct UnknownFeedFile {
    /// The rejected name.
    pub name: String,
}

impl FromStr for FeedFile {
    type Err = UnknownFeedFile;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_file_name(value).ok_or_else(|| UnknownFeedFile {
            name: value.to_owned(),
        })
    }
}

impl TryFrom<String> for FeedFile {
    type Error = UnknownFeedFile;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FeedFile> for String {
    fn from(value: FeedFile) -> Self {
        value.file_name().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn vocabulary_names_round_trip() {
        for file in FeedFile::ALL {
            assert_eq!(FeedFile::from_file_name(file.file_name()), Some(*file));
        }
        assert_eq!(FeedFile::ALL.len(), 31, "reference lists 31 files");
    }

    #[rstest]
    #[case("Agency.txt")]
    #[case("agency")]
    #[case("notes.txt")]
    fn rejects_names_outside_vocabulary(#[case] name: &str) {
        let err = name.parse::<FeedFile>().expect_err("unknown name");
        assert_eq!(err.name, name);
    }
}
