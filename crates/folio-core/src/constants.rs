//! Application-wide constants
//!
//! Defaults for the admin session and the timing values of the
//! realtime and auth protocols.

// Session defaults
/// Seconds between analytics refreshes
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
/// Maximum number of items kept in the activity feed
pub const DEFAULT_FEED_CAPACITY: usize = 10;
/// Seconds before an unread activity item hides itself (0 = never)
pub const DEFAULT_AUTO_HIDE_SECS: u64 = 5;
/// Recent contact submissions merged into the feed on every refresh
pub const DEFAULT_RECENT_CONTACTS: usize = 5;

/// Schema the portfolio tables live in
pub const DEFAULT_SCHEMA: &str = "public";

// Realtime channel timing
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const JOIN_TIMEOUT_SECS: u64 = 10;

// Auth session refresh
/// Refresh this long before the access token expires
pub const REFRESH_LEAD_SECS: i64 = 5 * 60;
/// Never schedule a refresh sooner than this
pub const MIN_REFRESH_DELAY_SECS: i64 = 60;
