//! `boardsync watch`: mirror a directory until Ctrl-C.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use boardsync_core::config::{self, LogFormat, Settings};

/// Arguments for `boardsync watch`. Anything omitted here falls back to
/// `~/.boardsync/config.yaml` (or `--config`).
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Directory to watch.
    pub path: Option<PathBuf>,

    /// Board volume: a drive letter (e.g. `E`) or its mount directory.
    pub volume: Option<String>,

    /// Log every action to the console.
    #[arg(short, long)]
    pub verbose: bool,

    /// Soft-reboot the board after each change (requires --port).
    #[arg(short, long)]
    pub reboot: bool,

    /// Serial port of the board (e.g. COM4, /dev/ttyACM0).
    #[arg(short, long)]
    pub port: Option<String>,

    /// Entry file the board runs on boot; removed before each overwrite.
    #[arg(short, long, value_name = "FILE")]
    pub main: Option<String>,

    /// Re-attempts after a failed copy or delete.
    #[arg(long)]
    pub retries: Option<u32>,

    /// Pause between attempts, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub backoff_ms: Option<u64>,

    /// Maximum number of files synced at the same time.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,

    /// Settings file to read instead of ~/.boardsync/config.yaml.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let file = match &self.config {
            Some(path) => config::load_at(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => config::load_default().context("failed to load default settings")?,
        };
        let settings = file.merge(self.into_settings());

        let summary =
            boardsync_daemon::start_blocking(settings).context("watch session failed")?;
        println!("watch stopped: {summary}");
        Ok(())
    }

    /// Command-line values as a settings layer; unset flags stay `None` so
    /// the file can supply them.
    fn into_settings(self) -> Settings {
        Settings {
            root: self.path,
            volume: self.volume,
            port: self.port,
            reboot: self.reboot.then_some(true),
            verbose: self.verbose.then_some(true),
            main_file: self.main,
            retries: self.retries,
            backoff_ms: self.backoff_ms,
            workers: self.workers,
            log_format: self.log_json.then_some(LogFormat::Json),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        args: WatchArgs,
    }

    fn parse(argv: &[&str]) -> Settings {
        let mut full = vec!["boardsync-watch"];
        full.extend_from_slice(argv);
        Harness::parse_from(full).args.into_settings()
    }

    #[test]
    fn positional_path_and_volume() {
        let settings = parse(&["./src", "E", "-v", "-r", "-p", "COM4"]);
        assert_eq!(settings.root, Some(PathBuf::from("./src")));
        assert_eq!(settings.volume.as_deref(), Some("E"));
        assert_eq!(settings.port.as_deref(), Some("COM4"));
        assert_eq!(settings.reboot, Some(true));
        assert_eq!(settings.verbose, Some(true));
    }

    #[test]
    fn absent_flags_leave_file_values_in_place() {
        let settings = parse(&[]);
        assert_eq!(settings, Settings::default());

        let file = Settings {
            reboot: Some(true),
            port: Some("COM3".to_string()),
            ..Settings::new("/proj", "F")
        };
        let merged = file.clone().merge(settings);
        assert_eq!(merged, file);
    }

    #[test]
    fn main_file_and_tuning_flags() {
        let settings = parse(&[
            "/proj",
            "E",
            "-m",
            "app.py",
            "--retries",
            "2",
            "--backoff-ms",
            "250",
            "--workers",
            "8",
            "--log-json",
        ]);
        assert_eq!(settings.main_file.as_deref(), Some("app.py"));
        assert_eq!(settings.retries, Some(2));
        assert_eq!(settings.backoff_ms, Some(250));
        assert_eq!(settings.workers, Some(8));
        assert_eq!(settings.log_format, Some(LogFormat::Json));
    }
}
