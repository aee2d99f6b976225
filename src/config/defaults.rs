//! Default configuration constants used across the system.

/// Retained-version ceiling of a versioned policy, default version included.
pub const MAX_POLICY_VERSIONS: usize = 5;

/// Default gateway port.
pub const DEFAULT_GATEWAY_PORT: u16 = 8787;

/// Default gateway bind host.
pub const DEFAULT_GATEWAY_BIND: &str = "127.0.0.1";

/// Default timeout for a single remote action (seconds).
pub const DEFAULT_ACTION_TIMEOUT_SECS: u64 = 30;

/// Prefix for environment-variable secrets.
pub const DEFAULT_SECRET_ENV_PREFIX: &str = "RECONCILER_SECRET_";

/// Page size of the in-memory platform application listing.
pub const DEFAULT_LIST_PAGE_SIZE: usize = 100;

/// Maximum accepted lifecycle event body (1 MB).
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "reconciler.json";
