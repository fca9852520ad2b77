//! Error types for boardsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating session configuration.
///
/// All of these are fatal: they surface before any watching begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the settings file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with the offending file path.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An explicitly requested settings file does not exist.
    #[error("settings file not found at {path}")]
    NotFound { path: PathBuf },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// A required field was neither given on the command line nor in the file.
    #[error("missing required setting '{0}'")]
    Missing(&'static str),

    /// Reboot signalling was requested without a serial port to signal on.
    #[error("a serial port must be set when reboot is enabled")]
    PortRequired,

    /// A field was present but holds an unusable value.
    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors from mapping a watched source path onto the board volume.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// The source path does not lie under the watched root.
    #[error("{path} is outside the watched root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// The source path is the watched root itself; there is no file to map.
    #[error("{0} is the watched root, not a file beneath it")]
    RootItself(PathBuf),

    /// A component of the source path is not valid UTF-8 and has no
    /// unambiguous name on the volume.
    #[error("{0} contains a name that is not valid UTF-8")]
    NonUtf8(PathBuf),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
