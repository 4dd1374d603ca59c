// StockScan - platform/config.rs
//
// Platform-specific path resolution and config.toml loading with startup
// validation. Uses the `directories` crate for XDG (Linux), AppData
// (Windows), Library (macOS) compliance.
//
// Bearer tokens for the directory services live here, not in source:
// config values are operational material and never logged.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use crate::core::store::MergePolicy;
use crate::util::constants;

/// Resolved platform paths for StockScan data and configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/stockscan/ or %APPDATA%\StockScan\)
    pub config_dir: PathBuf,

    /// Data directory for the session file and downloaded update packages.
    pub data_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to the current directory if platform dirs cannot be
    /// determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            let data_dir = proj_dirs.data_dir().to_path_buf();

            tracing::debug!(
                config = %config_dir.display(),
                data = %data_dir.display(),
                "Platform paths resolved"
            );

            Self {
                config_dir,
                data_dir,
            }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            let fallback = PathBuf::from(".");
            Self {
                config_dir: fallback.clone(),
                data_dir: fallback,
            }
        }
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility -- a newer
/// config file can be used with an older binary without crashing.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[scanner]` section.
    pub scanner: ScannerSection,
    /// `[store]` section.
    pub store: StoreSection,
    /// `[api]` section.
    pub api: ApiSection,
    /// `[update]` section.
    pub update: UpdateSection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[scanner]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ScannerSection {
    /// Idle period after the last keystroke before a scan is processed (ms).
    pub idle_ms: Option<u64>,
}

/// `[store]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Duplicate reconciliation: "reject" or "increment".
    pub merge_policy: Option<String>,
}

/// `[api]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ApiSection {
    /// Vehicle lookup endpoint.
    pub vehicle_url: Option<String>,
    /// Bearer token for the vehicle lookup endpoint.
    pub vehicle_token: Option<String>,
    /// Client details endpoint.
    pub details_url: Option<String>,
    /// Bearer token for the client details endpoint.
    pub details_token: Option<String>,
    /// Paged client search endpoint.
    pub search_url: Option<String>,
    /// Bearer token for the client search endpoint.
    pub search_token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// `[update]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct UpdateSection {
    /// URL serving the latest version string.
    pub version_url: Option<String>,
    /// URL serving the update package ZIP.
    pub package_url: Option<String>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// All values are validated against named constants at load time. Invalid
/// values produce actionable warnings and fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Scanner --
    /// Idle period before a buffered scan is processed (ms).
    pub scan_idle_ms: u64,

    // -- Store --
    /// Duplicate reconciliation policy.
    pub merge_policy: MergePolicy,

    // -- API --
    pub vehicle_url: String,
    pub vehicle_token: String,
    pub details_url: String,
    pub details_token: String,
    pub search_url: String,
    pub search_token: String,
    pub http_timeout_secs: u64,

    // -- Update --
    /// Version feed URL (empty = update checks disabled).
    pub update_version_url: String,
    /// Package URL (empty = downloads disabled).
    pub update_package_url: String,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scan_idle_ms: constants::DEFAULT_SCAN_IDLE_MS,
            merge_policy: MergePolicy::default(),
            vehicle_url: constants::DEFAULT_VEHICLE_API_URL.to_string(),
            vehicle_token: String::new(),
            details_url: constants::DEFAULT_DETAILS_API_URL.to_string(),
            details_token: String::new(),
            search_url: constants::DEFAULT_SEARCH_API_URL.to_string(),
            search_token: String::new(),
            http_timeout_secs: constants::DEFAULT_HTTP_TIMEOUT_SECS,
            update_version_url: String::new(),
            update_package_url: String::new(),
            log_level: None,
        }
    }
}

/// Load and validate `config.toml` from the given config directory.
///
/// Returns `AppConfig` with validated values and a list of non-fatal
/// warnings. If the file does not exist, returns defaults with no warnings
/// (first-run). If the file is unparseable, returns defaults with an error
/// warning — the application still starts but the user is informed.
pub fn load_config(config_dir: &Path) -> (AppConfig, Vec<String>) {
    let config_path = config_dir.join(constants::CONFIG_FILE_NAME);

    let mut warnings: Vec<String> = Vec::new();

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), warnings);
    }

    let content = match std::fs::read_to_string(&config_path) {
        Ok(c) => c,
        Err(e) => {
            let msg = format!(
                "Could not read config file '{}': {e}. Using defaults.",
                config_path.display()
            );
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    let raw: RawConfig = match toml::from_str(&content) {
        Ok(r) => r,
        Err(e) => {
            let msg = format!(
                "Failed to parse config file '{}': {e}. Using defaults.",
                config_path.display()
            );
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    tracing::info!(path = %config_path.display(), "Loaded config.toml");

    (validate(raw, &mut warnings), warnings)
}

/// Validate each field against named constants, accumulating all warnings.
fn validate(raw: RawConfig, warnings: &mut Vec<String>) -> AppConfig {
    let mut config = AppConfig::default();

    // -- Scanner: idle_ms --
    if let Some(idle) = raw.scanner.idle_ms {
        if (constants::MIN_SCAN_IDLE_MS..=constants::MAX_SCAN_IDLE_MS).contains(&idle) {
            config.scan_idle_ms = idle;
        } else {
            warnings.push(format!(
                "[scanner] idle_ms = {idle} is out of range ({}-{}). Using default ({}).",
                constants::MIN_SCAN_IDLE_MS,
                constants::MAX_SCAN_IDLE_MS,
                constants::DEFAULT_SCAN_IDLE_MS,
            ));
        }
    }

    // -- Store: merge_policy --
    if let Some(ref policy) = raw.store.merge_policy {
        match MergePolicy::from_config_str(policy) {
            Some(parsed) => config.merge_policy = parsed,
            None => warnings.push(format!(
                "[store] merge_policy = \"{policy}\" is not recognised. \
                 Expected \"reject\" or \"increment\". Using default (reject).",
            )),
        }
    }

    // -- API endpoints and tokens --
    if let Some(url) = non_empty(raw.api.vehicle_url) {
        config.vehicle_url = url;
    }
    if let Some(token) = non_empty(raw.api.vehicle_token) {
        config.vehicle_token = token;
    }
    if let Some(url) = non_empty(raw.api.details_url) {
        config.details_url = url;
    }
    if let Some(token) = non_empty(raw.api.details_token) {
        config.details_token = token;
    }
    if let Some(url) = non_empty(raw.api.search_url) {
        config.search_url = url;
    }
    if let Some(token) = non_empty(raw.api.search_token) {
        config.search_token = token;
    }

    // -- API: timeout_secs --
    if let Some(secs) = raw.api.timeout_secs {
        if (constants::MIN_HTTP_TIMEOUT_SECS..=constants::MAX_HTTP_TIMEOUT_SECS).contains(&secs) {
            config.http_timeout_secs = secs;
        } else {
            warnings.push(format!(
                "[api] timeout_secs = {secs} is out of range ({}-{}). Using default ({}).",
                constants::MIN_HTTP_TIMEOUT_SECS,
                constants::MAX_HTTP_TIMEOUT_SECS,
                constants::DEFAULT_HTTP_TIMEOUT_SECS,
            ));
        }
    }

    // -- Update feed --
    if let Some(url) = non_empty(raw.update.version_url) {
        config.update_version_url = url;
    }
    if let Some(url) = non_empty(raw.update.package_url) {
        config.update_package_url = url;
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.clone());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    if !warnings.is_empty() {
        tracing::warn!(count = warnings.len(), "Config validation produced warnings");
    }

    config
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) {
        std::fs::write(dir.path().join(constants::CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_missing_file_uses_defaults_without_warnings() {
        let dir = TempDir::new().unwrap();
        let (config, warnings) = load_config(dir.path());
        assert!(warnings.is_empty());
        assert_eq!(config.scan_idle_ms, constants::DEFAULT_SCAN_IDLE_MS);
        assert_eq!(config.merge_policy, MergePolicy::RejectDuplicate);
        assert_eq!(config.vehicle_url, constants::DEFAULT_VEHICLE_API_URL);
    }

    #[test]
    fn test_valid_values_are_applied() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
[scanner]
idle_ms = 100

[store]
merge_policy = "increment"

[api]
vehicle_token = "tok-1"
timeout_secs = 30

[logging]
level = "debug"
"#,
        );

        let (config, warnings) = load_config(dir.path());
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
        assert_eq!(config.scan_idle_ms, 100);
        assert_eq!(config.merge_policy, MergePolicy::IncrementQuantity);
        assert_eq!(config.vehicle_token, "tok-1");
        assert_eq!(config.http_timeout_secs, 30);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_out_of_range_values_warn_and_fall_back() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
[scanner]
idle_ms = 999999

[store]
merge_policy = "sometimes"

[api]
timeout_secs = 0
"#,
        );

        let (config, warnings) = load_config(dir.path());
        assert_eq!(warnings.len(), 3);
        assert_eq!(config.scan_idle_ms, constants::DEFAULT_SCAN_IDLE_MS);
        assert_eq!(config.merge_policy, MergePolicy::RejectDuplicate);
        assert_eq!(
            config.http_timeout_secs,
            constants::DEFAULT_HTTP_TIMEOUT_SECS
        );
    }

    #[test]
    fn test_malformed_toml_warns_and_uses_defaults() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "not [valid toml {{");
        let (config, warnings) = load_config(dir.path());
        assert_eq!(warnings.len(), 1);
        assert_eq!(config.scan_idle_ms, constants::DEFAULT_SCAN_IDLE_MS);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
[scanner]
idle_ms = 150
future_knob = true

[brand_new_section]
x = 1
"#,
        );
        let (config, warnings) = load_config(dir.path());
        assert!(warnings.is_empty());
        assert_eq!(config.scan_idle_ms, 150);
    }
}
