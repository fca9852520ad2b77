//! # boardsync-sync
//!
//! Sync actions against the board volume: copy, delete, bounded retry, and
//! the serial soft-reboot handshake.
//!
//! Build a [`Session`] from a validated configuration and call
//! [`Session::handle`] for each filesystem event. Every call returns a
//! [`SyncOutcome`]; failures never propagate past the session.

pub mod error;
pub mod mock;
pub mod retry;
pub mod serial;
pub mod session;
#[cfg(test)]
mod test_log;
pub mod volume;

pub use error::SyncError;
pub use retry::{Sleeper, SyncOutcome, ThreadSleeper};
pub use serial::{RebootSignaler, SerialConnection, SerialPortTransport, SerialTransport};
pub use session::{Session, SessionIo};
pub use volume::{HostVolume, Removal, Volume};
