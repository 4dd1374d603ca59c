// StockScan - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation in library code; every failure a caller
// can act on is a distinct variant. The user-facing split between "chassis
// not reserved" and every other resolution failure lives here.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all StockScan operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum StockScanError {
    /// Workbook import/export failed.
    Sheet(SheetError),

    /// Client resolution failed.
    Resolve(ResolveError),

    /// Update check or download failed.
    Update(UpdateError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for StockScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sheet(e) => write!(f, "Workbook error: {e}"),
            Self::Resolve(e) => write!(f, "Client resolution error: {e}"),
            Self::Update(e) => write!(f, "Update error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for StockScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sheet(e) => Some(e),
            Self::Resolve(e) => Some(e),
            Self::Update(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Workbook errors
// ---------------------------------------------------------------------------

/// Errors related to workbook import and export.
#[derive(Debug)]
pub enum SheetError {
    /// A required column is absent from the sheet being imported.
    MissingColumn {
        path: PathBuf,
        column: &'static str,
    },

    /// CSV encode/decode error.
    Csv { path: PathBuf, source: csv::Error },

    /// I/O error reading or writing the sheet.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn { path, column } => write!(
                f,
                "'{}': required column '{column}' not found",
                path.display()
            ),
            Self::Csv { path, source } => {
                write!(f, "'{}': {source}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "'{}': I/O error: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for SheetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Csv { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<SheetError> for StockScanError {
    fn from(e: SheetError) -> Self {
        Self::Sheet(e)
    }
}

// ---------------------------------------------------------------------------
// Client resolution errors
// ---------------------------------------------------------------------------

/// Errors raised while resolving a chassis number to a client.
///
/// `NotReserved` is deliberately separate from the generic failures: the two
/// surface different user-facing messages and conflating them changes the
/// workflow semantics (a chassis with no attached client is a business state,
/// not a fault).
#[derive(Debug)]
pub enum ResolveError {
    /// The chassis exists but has no client attached to it.
    NotReserved { chassis: String },

    /// The directory service answered with a non-success status.
    Service { status: u16, message: String },

    /// The request never completed (connectivity, TLS, timeout).
    Transport { message: String },

    /// The service answered but the body was not in the expected shape.
    Malformed { message: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReserved { chassis } => {
                write!(f, "no client is reserved for chassis '{chassis}'")
            }
            Self::Service { status, message } => {
                write!(f, "directory service returned status {status}: {message}")
            }
            Self::Transport { message } => write!(f, "request failed: {message}"),
            Self::Malformed { message } => {
                write!(f, "unexpected response from directory service: {message}")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

impl ResolveError {
    /// True for the "chassis has no client" business state, which blocks
    /// record creation with its own tailored message.
    pub fn is_not_reserved(&self) -> bool {
        matches!(self, Self::NotReserved { .. })
    }
}

impl From<ResolveError> for StockScanError {
    fn from(e: ResolveError) -> Self {
        Self::Resolve(e)
    }
}

// ---------------------------------------------------------------------------
// Update errors
// ---------------------------------------------------------------------------

/// Errors related to the update check and package download.
#[derive(Debug)]
pub enum UpdateError {
    /// The version feed content could not be parsed as a version.
    InvalidVersion(String),

    /// The feed or package endpoint answered with a non-success status.
    Feed { status: u16 },

    /// The request never completed.
    Transport { message: String },

    /// The advertised or downloaded package exceeds the accepted size.
    PackageTooLarge { bytes: u64, max: u64 },

    /// I/O error writing the downloaded package.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidVersion(raw) => {
                write!(f, "'{raw}' is not a valid version string")
            }
            Self::Feed { status } => {
                write!(f, "update feed returned status {status}")
            }
            Self::Transport { message } => write!(f, "request failed: {message}"),
            Self::PackageTooLarge { bytes, max } => write!(
                f,
                "update package is {bytes} bytes, exceeds maximum of {max}"
            ),
            Self::Io { path, source } => {
                write!(f, "'{}': I/O error: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for UpdateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<UpdateError> for StockScanError {
    fn from(e: UpdateError) -> Self {
        Self::Update(e)
    }
}

/// Convenience type alias for StockScan results.
pub type Result<T> = std::result::Result<T, StockScanError>;
