//! In-memory stand-ins for the volume, the serial port, and the clock.
//!
//! All three write into a shared [`Journal`] so tests can assert on the
//! exact order of file operations, serial bytes, and pauses. Failures are
//! injected per destination (volume) or per call (serial).

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use boardsync_core::types::{DestinationPath, SerialPortName};

use crate::error::{io_err, SyncError};
use crate::retry::Sleeper;
use crate::serial::{SerialConnection, SerialTransport};
use crate::volume::{Removal, Volume};

/// One observed side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Exists(String),
    Copy { source: PathBuf, dest: String },
    Remove(String),
    SerialOpen { port: String, baud: u32 },
    SerialWrite(u8),
    SerialClose,
    Sleep(Duration),
}

/// Shared, ordered record of [`Call`]s.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    pub fn record(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn copies(&self) -> Vec<String> {
        self.filter_map(|call| match call {
            Call::Copy { dest, .. } => Some(dest.clone()),
            _ => None,
        })
    }

    pub fn removes(&self) -> Vec<String> {
        self.filter_map(|call| match call {
            Call::Remove(dest) => Some(dest.clone()),
            _ => None,
        })
    }

    pub fn serial_writes(&self) -> Vec<u8> {
        self.filter_map(|call| match call {
            Call::SerialWrite(byte) => Some(*byte),
            _ => None,
        })
    }

    /// Number of serial connections opened, i.e. reboot handshakes started.
    pub fn serial_opens(&self) -> usize {
        self.count(|call| matches!(call, Call::SerialOpen { .. }))
    }

    /// Number of pauses of any length.
    pub fn sleeps(&self) -> usize {
        self.count(|call| matches!(call, Call::Sleep(_)))
    }

    /// Number of pauses of exactly `duration`.
    pub fn sleeps_of(&self, duration: Duration) -> usize {
        self.count(|call| *call == Call::Sleep(duration))
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn filter_map<T>(&self, f: impl Fn(&Call) -> Option<T>) -> Vec<T> {
        self.0.lock().unwrap().iter().filter_map(f).collect()
    }
}

// ---------------------------------------------------------------------------
// MockVolume
// ---------------------------------------------------------------------------

/// Volume that tracks which destinations exist and fails on request.
#[derive(Debug, Clone)]
pub struct MockVolume {
    journal: Journal,
    files: Arc<Mutex<HashSet<String>>>,
    copy_failures: Arc<Mutex<HashMap<String, u32>>>,
    remove_failures: Arc<Mutex<HashMap<String, u32>>>,
    copy_delay: Arc<Mutex<HashMap<String, Duration>>>,
}

impl MockVolume {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            files: Arc::default(),
            copy_failures: Arc::default(),
            remove_failures: Arc::default(),
            copy_delay: Arc::default(),
        }
    }

    /// Mark `dest` (rendered form, e.g. `E:main.py`) as present.
    pub fn add_file(&self, dest: &str) {
        self.files.lock().unwrap().insert(dest.to_string());
    }

    pub fn has_file(&self, dest: &str) -> bool {
        self.files.lock().unwrap().contains(dest)
    }

    /// Fail the next `times` copies to `dest`. `u32::MAX` fails forever.
    pub fn fail_copies(&self, dest: &str, times: u32) {
        self.copy_failures
            .lock()
            .unwrap()
            .insert(dest.to_string(), times);
    }

    /// Fail the next `times` removals of `dest`.
    pub fn fail_removes(&self, dest: &str, times: u32) {
        self.remove_failures
            .lock()
            .unwrap()
            .insert(dest.to_string(), times);
    }

    /// Block every copy to `dest` for `delay` before it completes.
    pub fn delay_copies(&self, dest: &str, delay: Duration) {
        self.copy_delay
            .lock()
            .unwrap()
            .insert(dest.to_string(), delay);
    }

    fn take_failure(table: &Mutex<HashMap<String, u32>>, dest: &str) -> bool {
        let mut table = table.lock().unwrap();
        match table.get_mut(dest) {
            Some(left) if *left > 0 => {
                if *left != u32::MAX {
                    *left -= 1;
                }
                true
            }
            _ => false,
        }
    }
}

impl Volume for MockVolume {
    fn copy_file(&self, source: &Path, dest: &DestinationPath) -> Result<u64, SyncError> {
        let key = dest.to_string();
        self.journal.record(Call::Copy {
            source: source.to_path_buf(),
            dest: key.clone(),
        });
        let delay = self.copy_delay.lock().unwrap().get(&key).copied();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if Self::take_failure(&self.copy_failures, &key) {
            return Err(io_err(dest.host_path(), io::Error::other("volume busy")));
        }
        self.files.lock().unwrap().insert(key);
        Ok(0)
    }

    fn remove_file(&self, dest: &DestinationPath) -> Result<Removal, SyncError> {
        let key = dest.to_string();
        self.journal.record(Call::Remove(key.clone()));
        if Self::take_failure(&self.remove_failures, &key) {
            return Err(io_err(dest.host_path(), io::Error::other("volume busy")));
        }
        if self.files.lock().unwrap().remove(&key) {
            Ok(Removal::Removed)
        } else {
            Ok(Removal::Absent)
        }
    }

    fn exists(&self, dest: &DestinationPath) -> Result<bool, SyncError> {
        let key = dest.to_string();
        self.journal.record(Call::Exists(key.clone()));
        Ok(self.files.lock().unwrap().contains(&key))
    }
}

// ---------------------------------------------------------------------------
// MockSerial
// ---------------------------------------------------------------------------

/// Serial transport that journals every byte instead of sending it.
#[derive(Debug, Clone)]
pub struct MockSerial {
    journal: Journal,
    open_failures: Arc<Mutex<u32>>,
    write_failures: Arc<Mutex<u32>>,
}

impl MockSerial {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            open_failures: Arc::default(),
            write_failures: Arc::default(),
        }
    }

    /// Fail the next `times` opens.
    pub fn fail_opens(&self, times: u32) {
        *self.open_failures.lock().unwrap() = times;
    }

    /// Fail the next `times` byte writes.
    pub fn fail_writes(&self, times: u32) {
        *self.write_failures.lock().unwrap() = times;
    }
}

fn take(counter: &Mutex<u32>) -> bool {
    let mut left = counter.lock().unwrap();
    if *left > 0 {
        *left -= 1;
        true
    } else {
        false
    }
}

impl SerialTransport for MockSerial {
    fn open(
        &self,
        port: &SerialPortName,
        baud: u32,
        _timeout: Duration,
    ) -> io::Result<Box<dyn SerialConnection>> {
        if take(&self.open_failures) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{port} is busy"),
            ));
        }
        self.journal.record(Call::SerialOpen {
            port: port.0.clone(),
            baud,
        });
        Ok(Box::new(MockConnection {
            journal: self.journal.clone(),
            write_failures: self.write_failures.clone(),
        }))
    }
}

struct MockConnection {
    journal: Journal,
    write_failures: Arc<Mutex<u32>>,
}

impl SerialConnection for MockConnection {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        if take(&self.write_failures) {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out"));
        }
        self.journal.record(Call::SerialWrite(byte));
        Ok(())
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        self.journal.record(Call::SerialClose);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingSleeper
// ---------------------------------------------------------------------------

/// Sleeper that journals each pause, optionally also sleeping for real.
#[derive(Debug, Clone)]
pub struct RecordingSleeper {
    journal: Journal,
    real: bool,
}

impl RecordingSleeper {
    /// Record pauses without waiting.
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            real: false,
        }
    }

    /// Record pauses and actually block for them.
    pub fn real(journal: Journal) -> Self {
        Self {
            journal,
            real: true,
        }
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.journal.record(Call::Sleep(duration));
        if self.real {
            std::thread::sleep(duration);
        }
    }
}
