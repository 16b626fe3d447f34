// src/config/consts.rs

// Net config
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 card_scrape/0.5";
pub const REQUEST_TIMEOUT_SECS: u64 = 20;

// Local session cache
pub const STORE_DIR: &str = ".store";
pub const SESSIONS_SUBDIR: &str = "sessions";
pub const SESSION_TTL_SECS: u64 = 3600; // one hour, then a scan must be redone

// Concurrency
pub const WORKERS: usize = 4;
pub const REQUEST_PAUSE_MS: u64 = 100; // be polite
pub const JITTER_MS: u64 = 50; // extra 0..50 ms per worker

// Export
pub const DEFAULT_OUT_DIR: &str = "out";
pub const EXPORT_PREFIX: &str = "cards_";
pub const EXPORT_TIMESTAMP_FMT: &str = "%Y%m%d_%H%M%S";

/// Column carrying the originating event; synthesized when the template
/// lacks it.
pub const EVENT_COLUMN: &str = "活动名称";
