// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "filterc";

/// Library tracing target
pub const LOG_TARGET: &str = "filter_compiler";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "filterc.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "FILTERC_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "FILTERC_LOG";

// =============================================================================
// Input Limits
// =============================================================================

/// Maximum size of a filter body in bytes (64KB)
pub const MAX_BODY_JSON_SIZE: usize = 64 * 1024;

/// Maximum number of `--param` pairs
pub const MAX_BODY_PARAMS: usize = 200;
