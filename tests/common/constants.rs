//! Shared constants for end-to-end tests
//!
//! When fixture data changes, update only this file.

// ============================================================================
// Fixture Items
// ============================================================================

/// (topic, source, lean, title). The topic is embedded in the item url and is
/// what the fixture grouper groups by.
pub const FIXTURE_ITEMS: &[(&str, &str, &str, &str)] = &[
    ("election", "AP", "center", "Polls close in tight race"),
    ("election", "Fox", "right", "Voters head home as polls close"),
    ("election", "NPR", "left", "Turnout surges in final hours"),
    ("storm", "BBC", "international", "Storm makes landfall"),
    ("storm", "AP", "center", "Coastal towns evacuate ahead of storm"),
    ("chips", "Reuters", "center", "Chipmaker posts record quarter"),
];

pub const FIXTURE_ITEM_COUNT: usize = 6;
pub const FIXTURE_STORY_COUNT: usize = 3;
pub const FIXTURE_SOURCE_COUNT: usize = 5;

/// Title of the first item of each topic, which becomes the story title.
pub const ELECTION_STORY_TITLE: &str = "Polls close in tight race";
pub const STORM_STORY_TITLE: &str = "Storm makes landfall";
pub const CHIPS_STORY_TITLE: &str = "Chipmaker posts record quarter";

/// Smart runs skip ingestion once this many items are recent.
pub const TEST_INGEST_SKIP_THRESHOLD: usize = 5;

// ============================================================================
// Timeouts
// ============================================================================

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
