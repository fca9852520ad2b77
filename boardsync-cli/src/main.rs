//! boardsync: mirror a source directory onto a microcontroller board's
//! volume and soft-reboot the board after each change.
//!
//! # Usage
//!
//! ```text
//! boardsync watch [PATH] [VOLUME] [-v] [-r -p <PORT>] [-m <MAIN>] [--config <FILE>]
//! boardsync reboot -p <PORT>
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{reboot::RebootArgs, watch::WatchArgs};

#[derive(Parser, Debug)]
#[command(
    name = "boardsync",
    version,
    about = "Keep a board's storage volume in sync with a local directory",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch a directory and mirror every change onto the board volume.
    Watch(WatchArgs),

    /// Send a single soft-reboot signal to the board.
    Reboot(RebootArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Watch(args) => args.run(),
        Commands::Reboot(args) => args.run(),
    }
}
