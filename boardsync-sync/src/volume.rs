//! The board's mounted volume as seen by the sync actions.

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

use boardsync_core::types::DestinationPath;

use crate::error::{io_err, SyncError};

/// Result of removing a file from the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    /// Nothing was there; treated the same as a successful removal.
    Absent,
}

/// File operations against the target volume.
///
/// [`HostVolume`] talks to the real mount; [`crate::mock::MockVolume`]
/// records calls and injects failures for tests.
pub trait Volume: fmt::Debug + Send + Sync + 'static {
    /// Copy `source` (contents and permissions) to `dest`, overwriting.
    /// Returns the number of bytes copied.
    fn copy_file(&self, source: &Path, dest: &DestinationPath) -> Result<u64, SyncError>;

    /// Remove `dest`. A missing file is reported as [`Removal::Absent`].
    fn remove_file(&self, dest: &DestinationPath) -> Result<Removal, SyncError>;

    /// Whether `dest` currently exists.
    fn exists(&self, dest: &DestinationPath) -> Result<bool, SyncError>;
}

/// Volume mounted on the host, addressed through [`DestinationPath::host_path`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HostVolume;

impl Volume for HostVolume {
    fn copy_file(&self, source: &Path, dest: &DestinationPath) -> Result<u64, SyncError> {
        let target = dest.host_path();
        match std::fs::copy(source, &target) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound && !source.exists() => {
                Err(SyncError::SourceMissing {
                    path: source.to_path_buf(),
                })
            }
            Err(err) => Err(io_err(target, err)),
        }
    }

    fn remove_file(&self, dest: &DestinationPath) -> Result<Removal, SyncError> {
        let target = dest.host_path();
        match std::fs::remove_file(&target) {
            Ok(()) => Ok(Removal::Removed),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Removal::Absent),
            Err(err) => Err(io_err(target, err)),
        }
    }

    fn exists(&self, dest: &DestinationPath) -> Result<bool, SyncError> {
        let target = dest.host_path();
        target.try_exists().map_err(|e| io_err(target, e))
    }
}
