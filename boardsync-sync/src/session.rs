//! The sync session: configuration plus the I/O it acts through.
//!
//! ## Upload
//!
//! 1. Map the source path onto the volume.
//! 2. If the source path contains the main-file name, remove the existing
//!    destination first so the board drops its open handle on it.
//! 3. Copy contents and permissions, overwriting.
//! 4. Soft reboot the board, when enabled.
//!
//! Steps 2–4 form one attempt; a transient failure anywhere in them reruns
//! the whole attempt after the backoff. Delete has the same shape with a
//! single removal step.

use std::path::Path;
use std::sync::Arc;

use boardsync_core::config::{Settings, SyncConfig};
use boardsync_core::error::{ConfigError, MapError};
use boardsync_core::mapper;
use boardsync_core::types::{DestinationPath, FsEvent, FsEventKind};

use crate::error::SyncError;
use crate::retry::{self, Sleeper, SyncOutcome, ThreadSleeper};
use crate::serial::{RebootSignaler, SerialPortTransport, SerialTransport};
use crate::volume::{HostVolume, Removal, Volume};

/// The side-effecting collaborators a [`Session`] acts through.
#[derive(Debug, Clone)]
pub struct SessionIo {
    pub volume: Arc<dyn Volume>,
    pub serial: Arc<dyn SerialTransport>,
    pub sleeper: Arc<dyn Sleeper>,
}

impl SessionIo {
    /// The real mount, the real serial port, and real sleeps.
    pub fn host() -> Self {
        Self {
            volume: Arc::new(HostVolume),
            serial: Arc::new(SerialPortTransport),
            sleeper: Arc::new(ThreadSleeper),
        }
    }
}

/// Process-lifetime sync state. Immutable after construction and safe to
/// share across handler threads.
#[derive(Debug)]
pub struct Session {
    config: SyncConfig,
    volume: Arc<dyn Volume>,
    sleeper: Arc<dyn Sleeper>,
    reboot: Option<RebootSignaler>,
}

impl Session {
    pub fn new(config: SyncConfig, io: SessionIo) -> Self {
        let reboot = config
            .reboot_port()
            .map(|port| RebootSignaler::new(port.clone(), io.serial.clone(), io.sleeper.clone()));
        Self {
            config,
            volume: io.volume,
            sleeper: io.sleeper,
            reboot,
        }
    }

    /// Validate `settings` and build a session. Fails before any I/O when
    /// reboot is enabled without a serial port.
    pub fn from_settings(settings: Settings, io: SessionIo) -> Result<Self, ConfigError> {
        Ok(Self::new(SyncConfig::from_settings(settings)?, io))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Where `source` lands on the volume. Recomputed on every call.
    pub fn destination(&self, source: &Path) -> Result<DestinationPath, MapError> {
        mapper::destination_path(self.config.root(), self.config.volume(), source)
    }

    /// Route one filesystem event to its sync action with a fresh budget.
    pub fn handle(&self, event: &FsEvent) -> SyncOutcome {
        let retries = self.config.retries();
        match event.kind {
            FsEventKind::Created | FsEventKind::Modified => self.upload(&event.path, retries),
            FsEventKind::Deleted => self.delete(&event.path, retries),
        }
    }

    /// Copy `source` onto the volume, retrying up to `retries` times.
    pub fn upload(&self, source: &Path, retries: u32) -> SyncOutcome {
        let dest = match self.destination(source) {
            Ok(dest) => dest,
            Err(err) => return unmappable(err),
        };
        tracing::info!(dest = %dest, "uploading file");

        retry::run("upload", retries, self.config.backoff(), &*self.sleeper, || {
            self.upload_once(source, &dest)
        })
    }

    /// Remove the destination of `source`, retrying up to `retries` times.
    pub fn delete(&self, source: &Path, retries: u32) -> SyncOutcome {
        let dest = match self.destination(source) {
            Ok(dest) => dest,
            Err(err) => return unmappable(err),
        };
        tracing::info!(dest = %dest, "deleting file");

        retry::run("delete", retries, self.config.backoff(), &*self.sleeper, || {
            self.delete_once(&dest)
        })
    }

    fn upload_once(&self, source: &Path, dest: &DestinationPath) -> Result<(), SyncError> {
        let main_file = self.config.main_file();
        if source.to_string_lossy().contains(main_file) && self.volume.exists(dest)? {
            tracing::info!(dest = %dest, "removing {main_file} before overwrite");
            self.volume.remove_file(dest)?;
        }

        let bytes = self.volume.copy_file(source, dest)?;
        tracing::debug!(dest = %dest, bytes, "copied");

        self.reboot_if_enabled()
    }

    fn delete_once(&self, dest: &DestinationPath) -> Result<(), SyncError> {
        if self.volume.remove_file(dest)? == Removal::Absent {
            tracing::debug!(dest = %dest, "already absent on volume");
        }
        self.reboot_if_enabled()
    }

    fn reboot_if_enabled(&self) -> Result<(), SyncError> {
        match &self.reboot {
            Some(signaler) => signaler.signal(),
            None => Ok(()),
        }
    }
}

fn unmappable(err: MapError) -> SyncOutcome {
    tracing::warn!(error = %err, "ignoring event");
    SyncOutcome::Skipped {
        reason: SyncError::from(err).to_string(),
    }
}
