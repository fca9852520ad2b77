//! `boardsync reboot`: one soft reboot, no file sync.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use boardsync_core::config::LogFormat;
use boardsync_core::types::SerialPortName;
use boardsync_sync::{RebootSignaler, SerialPortTransport, ThreadSleeper};

#[derive(Args, Debug)]
pub struct RebootArgs {
    /// Serial port of the board (e.g. COM4, /dev/ttyACM0).
    #[arg(short, long)]
    pub port: String,

    /// Log the handshake to the console.
    #[arg(short, long)]
    pub verbose: bool,
}

impl RebootArgs {
    pub fn run(self) -> Result<()> {
        boardsync_daemon::init_tracing(self.verbose, LogFormat::Text);

        let port = SerialPortName::from(self.port);
        let signaler = RebootSignaler::new(
            port.clone(),
            Arc::new(SerialPortTransport),
            Arc::new(ThreadSleeper),
        );
        signaler
            .signal()
            .with_context(|| format!("failed to soft-reboot board on {port}"))?;

        println!("✓ soft reboot sent to {port}");
        Ok(())
    }
}
