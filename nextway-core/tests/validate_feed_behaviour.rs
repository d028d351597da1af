//! Behavioural coverage for the feed presence rules.

use std::cell::RefCell;

use nextway_core::{FailureCategory, FeedFile, ValidationFailure, validate_feed};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

/// Scenario state shared by every step.
#[derive(Debug, Default)]
struct ValidationWorld {
    names: RefCell<Vec<String>>,
    outcome: RefCell<Option<Option<ValidationFailure>>>,
}

impl ValidationWorld {
    fn remove(&self, name: &str) {
        self.names.borrow_mut().retain(|entry| entry != name);
    }

    fn add(&self, name: &str) {
        self.names.borrow_mut().push(name.to_owned());
    }

    fn failure(&self) -> ValidationFailure {
        self.outcome
            .borrow()
            .expect("validation should have run")
            .expect("validation should have failed")
    }
}

#[fixture]
fn world() -> ValidationWorld {
    ValidationWorld::default()
}

#[given("a feed with the core files, calendar.txt and stops.txt")]
fn minimal_feed(world: &ValidationWorld) {
    for name in [
        "agency.txt",
        "routes.txt",
        "trips.txt",
        "stop_times.txt",
        "calendar.txt",
        "stops.txt",
    ] {
        world.add(name);
    }
}

#[given("agency.txt is removed from the feed")]
fn remove_agency(world: &ValidationWorld) {
    world.remove("agency.txt");
}

#[given("calendar.txt is removed from the feed")]
fn remove_calendar(world: &ValidationWorld) {
    world.remove("calendar.txt");
}

#[given("stops.txt is replaced by locations.geojson")]
fn zone_only_stops(world: &ValidationWorld) {
    world.remove("stops.txt");
    world.add("locations.geojson");
}

#[when("I validate the feed")]
fn validate(world: &ValidationWorld) {
    let outcome = validate_feed(world.names.borrow().iter());
    world.outcome.replace(Some(outcome));
}

#[then("validation passes")]
fn passes(world: &ValidationWorld) {
    let outcome = *world.outcome.borrow();
    assert_eq!(outcome, Some(None), "expected the feed to pass");
}

#[then("validation fails with missing-core naming agency.txt")]
fn fails_missing_agency(world: &ValidationWorld) {
    let failure = world.failure();
    assert_eq!(failure.category, FailureCategory::MissingCore);
    assert_eq!(failure.file, FeedFile::Agency);
}

#[then("validation fails with unsupported-stops naming stops.txt")]
fn fails_unsupported_stops(world: &ValidationWorld) {
    let failure = world.failure();
    assert_eq!(failure.category, FailureCategory::UnsupportedStops);
    assert_eq!(failure.file, FeedFile::Stops);
}

#[scenario(path = "tests/features/validate_feed.feature", index = 0)]
fn accepting_minimal_feed(world: ValidationWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/validate_feed.feature", index = 1)]
fn rejecting_missing_agency(world: ValidationWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/validate_feed.feature", index = 2)]
fn flagging_zone_only_stops(world: ValidationWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/validate_feed.feature", index = 3)]
fn reporting_earliest_rule(world: ValidationWorld) {
    let _ = world;
}
