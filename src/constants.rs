//! Application-wide constants for tuning and configuration
//!
//! Centralizes magic numbers to make them discoverable and configurable.

/// Successful sends allowed per run unless `sending.daily_limit` says otherwise.
pub const DEFAULT_DAILY_LIMIT: usize = 10;

/// Lower bound of the randomized pause between sends, in seconds.
pub const DEFAULT_MIN_DELAY_SECS: u64 = 120;

/// Upper bound of the randomized pause between sends, in seconds.
pub const DEFAULT_MAX_DELAY_SECS: u64 = 480;

/// Delivery failures in a row that end the run early.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: usize = 3;

/// Total AI generation attempts per candidate before the fallback template.
pub const GENERATION_ATTEMPTS: u32 = 2;

/// Pause before the second generation attempt.
pub const GENERATION_RETRY_DELAY_SECS: u64 = 2;

/// Research summaries are capped at this many characters.
pub const RESEARCH_SUMMARY_MAX_CHARS: usize = 500;

/// Wikipedia extracts shorter than this are treated as stubs.
pub const WIKIPEDIA_MIN_EXTRACT_CHARS: usize = 50;

/// Scraped search snippets must be at least this long to be useful.
pub const SNIPPET_MIN_CHARS: usize = 80;

/// Maximum number of companies kept in the research cache.
pub const RESEARCH_CACHE_CAPACITY: u64 = 1_000;

/// Greeting used when a contact row has no name.
pub const DEFAULT_RECIPIENT_NAME: &str = "Hiring Manager";

/// Keyring service name for stored secrets.
pub const KEYRING_SERVICE: &str = "coldmail";

/// User agent sent with research requests.
pub const RESEARCH_USER_AGENT: &str = concat!("coldmail/", env!("CARGO_PKG_VERSION"));
