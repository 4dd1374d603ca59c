// StockScan - app/update.rs
//
// Self-update: version feed check and package download, each on a
// background thread reporting over an mpsc channel. Replacing the installed
// files and relaunching belong to the external updater stub; this module
// stops at "a newer version exists" and "the package is on disk".

use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::util::constants;
use crate::util::error::UpdateError;

// =============================================================================
// Version
// =============================================================================

/// A `major.minor.patch` version as published on the feed. A leading `v`
/// is tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The running application version from Cargo.toml.
    pub fn current() -> Self {
        Self::from_str(constants::APP_VERSION).unwrap_or(Self::new(0, 0, 0))
    }
}

impl FromStr for Version {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, UpdateError> {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(UpdateError::InvalidVersion(s.to_string()));
        }

        let parse = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| UpdateError::InvalidVersion(s.to_string()))
        };

        Ok(Self {
            major: parse(parts[0])?,
            minor: parse(parts[1])?,
            patch: parse(parts[2])?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

// =============================================================================
// Feed
// =============================================================================

/// Where the update artefacts live.
#[derive(Debug, Clone)]
pub struct UpdateFeed {
    /// URL serving the latest version string as plain text.
    pub version_url: String,
    /// URL serving the update package ZIP.
    pub package_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Progress messages from the update threads to the composing thread.
#[derive(Debug, Clone)]
pub enum UpdateProgress {
    /// The feed's latest version is not newer than the running one.
    UpToDate { current: Version },
    /// A newer version is published.
    Available { current: Version, latest: Version },
    /// The package has been fully written to disk.
    Downloaded { path: PathBuf, bytes: u64 },
    /// Check or download failed.
    Failed { message: String },
}

// =============================================================================
// Manager
// =============================================================================

/// Manages the update check and package download on background threads.
pub struct UpdateManager {
    /// Channel receiver the composing thread polls for progress.
    progress_rx: Option<mpsc::Receiver<UpdateProgress>>,
}

impl UpdateManager {
    pub fn new() -> Self {
        Self { progress_rx: None }
    }

    /// Fetch the feed's version string and compare it to `current`.
    pub fn start_check(&mut self, feed: UpdateFeed, current: Version) {
        let (tx, rx) = mpsc::channel();
        self.progress_rx = Some(rx);

        std::thread::spawn(move || {
            let message = match fetch_latest_version(&feed) {
                Ok(latest) if latest > current => UpdateProgress::Available { current, latest },
                Ok(_) => UpdateProgress::UpToDate { current },
                Err(e) => UpdateProgress::Failed {
                    message: e.to_string(),
                },
            };
            let _ = tx.send(message);
        });

        tracing::info!("Update check started");
    }

    /// Download the package into `dest_dir`.
    pub fn start_download(&mut self, feed: UpdateFeed, dest_dir: PathBuf) {
        let (tx, rx) = mpsc::channel();
        self.progress_rx = Some(rx);

        std::thread::spawn(move || {
            let message = match download_package(&feed, &dest_dir) {
                Ok((path, bytes)) => UpdateProgress::Downloaded { path, bytes },
                Err(e) => UpdateProgress::Failed {
                    message: e.to_string(),
                },
            };
            let _ = tx.send(message);
        });

        tracing::info!("Update download started");
    }

    /// Poll for progress messages without blocking.
    pub fn poll_progress(&self) -> Vec<UpdateProgress> {
        let mut messages = Vec::new();
        if let Some(ref rx) = self.progress_rx {
            while let Ok(msg) = rx.try_recv() {
                messages.push(msg);
            }
        }
        messages
    }
}

impl Default for UpdateManager {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Workers
// =============================================================================

fn http_client(timeout: Duration) -> Result<Client, UpdateError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| UpdateError::Transport {
            message: e.to_string(),
        })
}

/// GET the feed URL and parse its body as a version string.
fn fetch_latest_version(feed: &UpdateFeed) -> Result<Version, UpdateError> {
    let client = http_client(feed.timeout)?;

    let response = client
        .get(&feed.version_url)
        .send()
        .map_err(|e| UpdateError::Transport {
            message: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(UpdateError::Feed {
            status: response.status().as_u16(),
        });
    }

    let body = response.text().map_err(|e| UpdateError::Transport {
        message: e.to_string(),
    })?;

    let latest = Version::from_str(&body)?;
    tracing::debug!(latest = %latest, "Update feed answered");
    Ok(latest)
}

/// Stream the package ZIP into the data directory. Written to a temp file
/// and renamed so a failed download never leaves a plausible-looking
/// package behind.
fn download_package(feed: &UpdateFeed, dest_dir: &PathBuf) -> Result<(PathBuf, u64), UpdateError> {
    let client = http_client(feed.timeout)?;

    let response = client
        .get(&feed.package_url)
        .send()
        .map_err(|e| UpdateError::Transport {
            message: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(UpdateError::Feed {
            status: response.status().as_u16(),
        });
    }

    let max = constants::MAX_UPDATE_PACKAGE_BYTES;
    if let Some(advertised) = response.content_length() {
        if advertised > max {
            return Err(UpdateError::PackageTooLarge {
                bytes: advertised,
                max,
            });
        }
    }

    fs::create_dir_all(dest_dir).map_err(|e| UpdateError::Io {
        path: dest_dir.clone(),
        source: e,
    })?;

    let final_path = dest_dir.join(constants::UPDATE_PACKAGE_FILE_NAME);
    let tmp_path = final_path.with_extension("zip.part");

    let mut file = fs::File::create(&tmp_path).map_err(|e| UpdateError::Io {
        path: tmp_path.clone(),
        source: e,
    })?;

    // Read one byte past the cap so an endless body is detected rather than
    // trusting the advertised length.
    let mut limited = response.take(max + 1);
    let bytes = std::io::copy(&mut limited, &mut file).map_err(|e| UpdateError::Io {
        path: tmp_path.clone(),
        source: e,
    })?;

    if bytes > max {
        let _ = fs::remove_file(&tmp_path);
        return Err(UpdateError::PackageTooLarge { bytes, max });
    }

    fs::rename(&tmp_path, &final_path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        UpdateError::Io {
            path: final_path.clone(),
            source: e,
        }
    })?;

    tracing::info!(path = %final_path.display(), bytes, "Update package downloaded");
    Ok((final_path, bytes))
}
