//! Session settings: the optional YAML file, CLI overrides, and the
//! validated [`SyncConfig`] every other crate consumes.
//!
//! # Storage layout
//!
//! ```text
//! ~/.boardsync/
//!   config.yaml   (optional; every field may be omitted)
//! ```
//!
//! # API pattern
//!
//! As with the rest of the workspace, filesystem helpers come in two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{SerialPortName, VolumeId};

pub const DEFAULT_MAIN_FILE: &str = "main.py";
pub const DEFAULT_RETRIES: u32 = 4;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_WORKERS: usize = 4;

const CONFIG_DIR: &str = ".boardsync";
const CONFIG_FILE: &str = "config.yaml";

// ---------------------------------------------------------------------------
// Settings (unvalidated)
// ---------------------------------------------------------------------------

/// Console log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Raw settings as read from the YAML file or the command line.
///
/// Every field is optional so that the two sources can be layered with
/// [`Settings::merge`]; [`SyncConfig::from_settings`] applies defaults and
/// validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub root: Option<PathBuf>,
    pub volume: Option<String>,
    pub port: Option<String>,
    pub reboot: Option<bool>,
    pub verbose: Option<bool>,
    pub main_file: Option<String>,
    pub retries: Option<u32>,
    pub backoff_ms: Option<u64>,
    pub workers: Option<usize>,
    pub log_format: Option<LogFormat>,
}

impl Settings {
    /// Settings with only the two required fields filled in.
    pub fn new(root: impl Into<PathBuf>, volume: impl Into<String>) -> Self {
        Self {
            root: Some(root.into()),
            volume: Some(volume.into()),
            ..Self::default()
        }
    }

    /// Layer `overrides` on top of `self`; any field set in `overrides` wins.
    pub fn merge(self, overrides: Settings) -> Settings {
        Settings {
            root: overrides.root.or(self.root),
            volume: overrides.volume.or(self.volume),
            port: overrides.port.or(self.port),
            reboot: overrides.reboot.or(self.reboot),
            verbose: overrides.verbose.or(self.verbose),
            main_file: overrides.main_file.or(self.main_file),
            retries: overrides.retries.or(self.retries),
            backoff_ms: overrides.backoff_ms.or(self.backoff_ms),
            workers: overrides.workers.or(self.workers),
            log_format: overrides.log_format.or(self.log_format),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// `<home>/.boardsync/config.yaml`: pure, no I/O.
pub fn default_path_at(home: &Path) -> PathBuf {
    home.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Load settings from an explicit file. A missing file is an error.
pub fn load_at(path: &Path) -> Result<Settings, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(err) => return Err(io_err(path, err)),
    };
    if raw.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `<home>/.boardsync/config.yaml`, or empty settings when it is absent.
pub fn load_default_at(home: &Path) -> Result<Settings, ConfigError> {
    let path = default_path_at(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    load_at(&path)
}

/// `load_default_at` convenience wrapper.
pub fn load_default() -> Result<Settings, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    load_default_at(&home)
}

// ---------------------------------------------------------------------------
// SyncConfig (validated, immutable)
// ---------------------------------------------------------------------------

/// Validated session configuration. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    root: PathBuf,
    volume: VolumeId,
    port: Option<SerialPortName>,
    reboot: bool,
    verbose: bool,
    main_file: String,
    retries: u32,
    backoff: Duration,
    workers: usize,
    log_format: LogFormat,
}

impl SyncConfig {
    /// Apply defaults and validate.
    ///
    /// The root is canonicalised when it exists so that it prefixes the
    /// absolute paths the watcher reports.
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let root = settings.root.ok_or(ConfigError::Missing("root"))?;
        if root.as_os_str().is_empty() {
            return Err(invalid("root", "path is empty"));
        }
        let root = std::fs::canonicalize(&root).unwrap_or(root);

        let volume = settings.volume.ok_or(ConfigError::Missing("volume"))?;
        let volume = volume.trim();
        if volume.is_empty() {
            return Err(invalid("volume", "identifier is empty"));
        }

        let port = settings
            .port
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .map(SerialPortName::from);

        let reboot = settings.reboot.unwrap_or(false);
        if reboot && port.is_none() {
            return Err(ConfigError::PortRequired);
        }

        let main_file = settings
            .main_file
            .unwrap_or_else(|| DEFAULT_MAIN_FILE.to_string());
        if main_file.is_empty() {
            return Err(invalid("main_file", "name is empty"));
        }

        let workers = settings.workers.unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(invalid("workers", "must be at least 1"));
        }

        Ok(Self {
            root,
            volume: VolumeId::from(volume),
            port,
            reboot,
            verbose: settings.verbose.unwrap_or(false),
            main_file,
            retries: settings.retries.unwrap_or(DEFAULT_RETRIES),
            backoff: settings
                .backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_BACKOFF),
            workers,
            log_format: settings.log_format.unwrap_or_default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fail unless the root names an existing directory. Checked before a
    /// watch starts, not at construction, so sessions can be built over
    /// paths that exist only in tests.
    pub fn ensure_root_dir(&self) -> Result<(), ConfigError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(invalid(
                "root",
                &format!("{} is not a directory", self.root.display()),
            ))
        }
    }

    pub fn volume(&self) -> &VolumeId {
        &self.volume
    }

    pub fn port(&self) -> Option<&SerialPortName> {
        self.port.as_ref()
    }

    /// `Some(port)` when a soft reboot should follow every successful sync.
    pub fn reboot_port(&self) -> Option<&SerialPortName> {
        if self.reboot {
            self.port.as_ref()
        } else {
            None
        }
    }

    pub fn reboot(&self) -> bool {
        self.reboot
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn main_file(&self) -> &str {
        &self.main_file
    }

    /// Re-attempts allowed after the first failure of a sync action.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
