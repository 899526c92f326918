//! Shared constants for end-to-end tests

// ============================================================================
// Audio Fixtures
// ============================================================================

/// Sample rate of generated recordings, equal to the analysis rate so no
/// resampling happens.
pub const FIXTURE_SAMPLE_RATE: u32 = 22_050;

/// Concert A4, MIDI 69.
pub const A4_HZ: f32 = 440.0;

/// B4, MIDI 71.
pub const B4_HZ: f32 = 493.88;

pub const A4_MIDI: i64 = 69;
pub const B4_MIDI: i64 = 71;

/// Length of each tone in the two-tone fixture.
pub const TONE_SECONDS: f32 = 1.0;

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for the server to become ready
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Request timeout for the HTTP client
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
