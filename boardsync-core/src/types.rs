//! Domain types shared by every boardsync crate.
//!
//! All path fields use `PathBuf`; identifiers that are not host paths
//! (volume labels, serial port names) get their own newtypes.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of the board's mounted volume.
///
/// Either a Windows drive letter (`E`, `E:`) or the directory the volume is
/// mounted at (`/media/me/PYBFLASH`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeId(pub String);

impl VolumeId {
    /// The identifier without a trailing `:`.
    pub fn label(&self) -> &str {
        self.0.strip_suffix(':').unwrap_or(&self.0)
    }

    /// `Some(letter)` when the identifier names a drive letter. Only
    /// Windows has drive letters; elsewhere every identifier is a mount
    /// directory, however short.
    pub fn drive_letter(&self) -> Option<char> {
        if !cfg!(windows) {
            return None;
        }
        let mut chars = self.label().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Some(c.to_ascii_uppercase()),
            _ => None,
        }
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for VolumeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VolumeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Name of a serial port as the host OS knows it (`COM4`, `/dev/ttyACM0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerialPortName(pub String);

impl fmt::Display for SerialPortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SerialPortName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SerialPortName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Filesystem events
// ---------------------------------------------------------------------------

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsEventKind {
    Created,
    Modified,
    Deleted,
}

impl FsEventKind {
    /// `true` for the kinds that are synced by copying the file.
    pub fn is_upload(self) -> bool {
        matches!(self, FsEventKind::Created | FsEventKind::Modified)
    }
}

impl fmt::Display for FsEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FsEventKind::Created => "created",
            FsEventKind::Modified => "modified",
            FsEventKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// A single change notification for an absolute path under the watched root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
}

impl FsEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: FsEventKind::Created,
            path: path.into(),
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: FsEventKind::Modified,
            path: path.into(),
        }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: FsEventKind::Deleted,
            path: path.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Destination path
// ---------------------------------------------------------------------------

/// Location of a synced file on the board volume.
///
/// Stored as the volume plus root-relative components so that no host
/// separator convention leaks into it. `Display` renders the canonical
/// `<volume>:<a>/<b>/<file>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationPath {
    volume: VolumeId,
    components: Vec<String>,
}

impl DestinationPath {
    /// Separator used between components on the board volume.
    pub const SEPARATOR: &'static str = "/";

    pub fn new(volume: VolumeId, components: Vec<String>) -> Self {
        Self { volume, components }
    }

    pub fn volume(&self) -> &VolumeId {
        &self.volume
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The root-relative part, joined with [`Self::SEPARATOR`].
    pub fn relative(&self) -> String {
        self.components.join(Self::SEPARATOR)
    }

    /// The path the host OS should open to reach this file.
    ///
    /// A drive-letter volume resolves to `X:\a\b`; anything else is treated
    /// as the directory the volume is mounted at.
    pub fn host_path(&self) -> PathBuf {
        let mut path = match self.volume.drive_letter() {
            Some(letter) => PathBuf::from(format!("{letter}:\\")),
            None => PathBuf::from(&self.volume.0),
        };
        for component in &self.components {
            path.push(component);
        }
        path
    }
}

impl fmt::Display for DestinationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.volume.label(), self.relative())
    }
}
