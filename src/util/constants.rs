// StockScan - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "StockScan";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "StockScan";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Scanner input
// =============================================================================

/// Default idle period in milliseconds after the last keystroke before the
/// accumulated scanner buffer is handed to the parser. Barcode scanners type
/// whole payloads in well under 100 ms, so a pause this long means the scan
/// is complete.
pub const DEFAULT_SCAN_IDLE_MS: u64 = 250;

/// Minimum user-configurable scan idle period (ms).
pub const MIN_SCAN_IDLE_MS: u64 = 50;

/// Maximum user-configurable scan idle period (ms).
pub const MAX_SCAN_IDLE_MS: u64 = 2_000;

// =============================================================================
// Record model
// =============================================================================

/// Reference prefix identifying the house brand on incoming labels.
pub const VMS_REFERENCE_PREFIX: &str = "VMS";

/// Canonical supplier name forced onto incoming records whose reference
/// carries the brand prefix.
pub const VMS_SUPPLIER_NAME: &str = "VMS";

/// Designation used for movement records when the payload carries none.
pub const MOVEMENT_DEFAULT_DESIGNATION: &str = "MOTOS";

/// Workbook/display format for the movement creation date.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Workbook/display format for the movement creation time.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Hard upper bound on records held in one working set. A working set is a
/// day's worth of scans at most; the bound exists so a runaway import cannot
/// grow the store without limit.
pub const MAX_RECORDS: usize = 100_000;

// =============================================================================
// Workbook import
// =============================================================================

/// Movement sheets sometimes carry a title row before the real header row.
/// At least this many of the expected column names must appear in a row for
/// it to be accepted as the header.
pub const HEADER_MIN_MATCHES: usize = 4;

/// Number of leading rows scanned when locating a displaced header row.
pub const HEADER_SCAN_ROWS: usize = 10;

// =============================================================================
// Client directory API
// =============================================================================

/// Vehicle lookup endpoint (chassis number appended as a path segment).
pub const DEFAULT_VEHICLE_API_URL: &str = "https://app.diardzair.com.dz/api/vehicles";

/// Client details endpoint (client id appended as a path segment).
pub const DEFAULT_DETAILS_API_URL: &str = "https://albaraka.fun/api/orders/info";

/// Paged client search endpoint.
pub const DEFAULT_SEARCH_API_URL: &str = "https://app.diardzair.com.dz/api/commandes";

/// Per-request HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Minimum user-configurable HTTP timeout (seconds).
pub const MIN_HTTP_TIMEOUT_SECS: u64 = 1;

/// Maximum user-configurable HTTP timeout (seconds).
pub const MAX_HTTP_TIMEOUT_SECS: u64 = 120;

/// Page size for manual client searches.
pub const DEFAULT_CLIENTS_PER_PAGE: usize = 200;

// =============================================================================
// Self-update
// =============================================================================

/// Maximum accepted size of a downloaded update package in bytes.
pub const MAX_UPDATE_PACKAGE_BYTES: u64 = 200 * 1024 * 1024; // 200 MB

/// File name the downloaded update package is stored under in the data dir.
pub const UPDATE_PACKAGE_FILE_NAME: &str = "update_package.zip";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Configuration / persistence
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Session persistence file name (stored in the platform data directory).
pub const SESSION_FILE_NAME: &str = "session.json";
