/// Application name used in logs and banners.
pub const APP_NAME: &str = "kestrel";

/// Crate version, stamped by cargo.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default per-hook time budgets (milliseconds).
pub const DEFAULT_INIT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_START_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 5_000;

/// Default health polling interval (milliseconds).
pub const DEFAULT_HEALTH_INTERVAL_MS: u64 = 30_000;
