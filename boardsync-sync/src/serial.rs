//! Soft reboot over the board's serial console.
//!
//! The handshake is two control bytes: Ctrl+C (ETX) interrupts whatever is
//! running and drops the board into its interactive prompt, then Ctrl+D
//! (EOT) soft-resets the interpreter so it reloads code from the volume.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use boardsync_core::types::SerialPortName;

use crate::error::{serial_err, SyncError};
use crate::retry::Sleeper;

pub const REBOOT_BAUD: u32 = 115_200;
pub const REBOOT_TIMEOUT: Duration = Duration::from_secs(1);
pub const REBOOT_PAUSE: Duration = Duration::from_millis(100);

/// ETX, Ctrl+C.
pub const INTERRUPT: u8 = 0x03;
/// EOT, Ctrl+D.
pub const SOFT_RESET: u8 = 0x04;

/// Opens serial connections by port name.
pub trait SerialTransport: fmt::Debug + Send + Sync + 'static {
    fn open(
        &self,
        port: &SerialPortName,
        baud: u32,
        timeout: Duration,
    ) -> io::Result<Box<dyn SerialConnection>>;
}

/// One open serial connection.
pub trait SerialConnection: Send {
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;

    /// Flush and release the port.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// [`SerialTransport`] backed by the `serialport` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPortTransport;

impl SerialTransport for SerialPortTransport {
    fn open(
        &self,
        port: &SerialPortName,
        baud: u32,
        timeout: Duration,
    ) -> io::Result<Box<dyn SerialConnection>> {
        let port = serialport::new(port.0.as_str(), baud)
            .timeout(timeout)
            .open()?;
        Ok(Box::new(PortConnection { port }))
    }
}

struct PortConnection {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialConnection for PortConnection {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.port.write_all(&[byte])?;
        self.port.flush()
    }

    fn close(mut self: Box<Self>) -> io::Result<()> {
        // The port handle is released on drop.
        self.port.flush()
    }
}

/// Sends the interrupt + soft-reset sequence to one port.
///
/// A fresh connection is opened per signal; nothing is held between calls.
#[derive(Debug, Clone)]
pub struct RebootSignaler {
    port: SerialPortName,
    transport: Arc<dyn SerialTransport>,
    sleeper: Arc<dyn Sleeper>,
}

impl RebootSignaler {
    pub fn new(
        port: SerialPortName,
        transport: Arc<dyn SerialTransport>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            port,
            transport,
            sleeper,
        }
    }

    pub fn port(&self) -> &SerialPortName {
        &self.port
    }

    /// Run the handshake. Open and write failures are returned, not retried.
    pub fn signal(&self) -> Result<(), SyncError> {
        let mut conn = self
            .transport
            .open(&self.port, REBOOT_BAUD, REBOOT_TIMEOUT)
            .map_err(|e| serial_err(&self.port, e))?;

        tracing::info!(port = %self.port, "soft rebooting board");

        conn.write_byte(INTERRUPT)
            .map_err(|e| serial_err(&self.port, e))?;
        self.sleeper.sleep(REBOOT_PAUSE);

        conn.write_byte(SOFT_RESET)
            .map_err(|e| serial_err(&self.port, e))?;
        self.sleeper.sleep(REBOOT_PAUSE);

        conn.close().map_err(|e| serial_err(&self.port, e))?;

        tracing::info!(port = %self.port, "soft reboot complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::mock::{Call, Journal, MockSerial, RecordingSleeper};

    use super::*;

    fn signaler(journal: &Journal, serial: MockSerial) -> RebootSignaler {
        RebootSignaler::new(
            SerialPortName::from("COM4"),
            Arc::new(serial),
            Arc::new(RecordingSleeper::new(journal.clone())),
        )
    }

    #[test]
    fn writes_interrupt_then_reset_then_closes() {
        let journal = Journal::default();
        let serial = MockSerial::new(journal.clone());
        signaler(&journal, serial).signal().unwrap();

        assert_eq!(
            journal.calls(),
            vec![
                Call::SerialOpen {
                    port: "COM4".to_string(),
                    baud: 115_200,
                },
                Call::SerialWrite(0x03),
                Call::Sleep(Duration::from_millis(100)),
                Call::SerialWrite(0x04),
                Call::Sleep(Duration::from_millis(100)),
                Call::SerialClose,
            ]
        );
    }

    #[test]
    fn open_failure_is_a_transient_serial_error() {
        let journal = Journal::default();
        let serial = MockSerial::new(journal.clone());
        serial.fail_opens(1);

        let err = signaler(&journal, serial).signal().unwrap_err();
        assert!(matches!(err, SyncError::Serial { .. }));
        assert!(err.is_transient());
        assert!(journal.serial_writes().is_empty());
    }

    #[test]
    fn write_failure_stops_the_sequence() {
        let journal = Journal::default();
        let serial = MockSerial::new(journal.clone());
        serial.fail_writes(1);

        let err = signaler(&journal, serial).signal().unwrap_err();
        assert!(matches!(err, SyncError::Serial { .. }));
        assert_eq!(journal.sleeps(), 0, "no pause after a failed write");
    }
}
