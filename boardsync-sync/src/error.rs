//! Error types for boardsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use boardsync_core::error::MapError;
use boardsync_core::types::SerialPortName;

/// All errors that can arise from a single sync attempt.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The source path could not be mapped onto the volume.
    #[error("path mapping failed: {0}")]
    Map(#[from] MapError),

    /// The source file vanished before it could be copied.
    #[error("source file {path} no longer exists")]
    SourceMissing { path: PathBuf },

    /// An I/O error against the board volume, with annotated path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Opening or writing the serial port failed.
    #[error("serial error on {port}: {source}")]
    Serial {
        port: SerialPortName,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Whether another attempt after a backoff could succeed.
    ///
    /// Volume and serial failures are transient: the board may be holding
    /// the file open or may still be rebooting.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Io { .. } | SyncError::Serial { .. })
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Serial`].
pub(crate) fn serial_err(port: &SerialPortName, source: std::io::Error) -> SyncError {
    SyncError::Serial {
        port: port.clone(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn transient_classification() {
        let busy = io_err("/media/PYBFLASH/main.py", io::Error::other("busy"));
        assert!(busy.is_transient());

        let serial = serial_err(&SerialPortName::from("COM4"), io::Error::other("denied"));
        assert!(serial.is_transient());

        let missing = SyncError::SourceMissing {
            path: PathBuf::from("/src/gone.py"),
        };
        assert!(!missing.is_transient());

        let map = SyncError::from(MapError::RootItself(PathBuf::from("/src")));
        assert!(!map.is_transient());
    }
}
