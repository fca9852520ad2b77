//! boardsync core library: domain types, path mapping, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: newtypes, filesystem events, destination paths
//! - [`mapper`]: source path → destination path on the board volume
//! - [`config`]: YAML settings file and the validated [`SyncConfig`]
//! - [`error`]: [`ConfigError`], [`MapError`]

pub mod config;
pub mod error;
pub mod mapper;
pub mod types;

pub use config::{LogFormat, Settings, SyncConfig};
pub use error::{ConfigError, MapError};
pub use mapper::destination_path;
pub use types::{DestinationPath, FsEvent, FsEventKind, SerialPortName, VolumeId};
