use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use boardsync_core::config::{LogFormat, Settings, SyncConfig};
use boardsync_core::types::FsEvent;
use boardsync_sync::{Session, SessionIo, SyncOutcome};

use crate::dispatcher::{Dispatcher, SyncReport};
use crate::error::{io_err, DaemonError};
use crate::watcher::watch_task;

/// Capacity of the watcher → dispatcher queue.
const EVENT_QUEUE: usize = 256;

/// Totals for one watch run, logged on shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Synced { .. } => self.synced += 1,
            SyncOutcome::Skipped { .. } => self.skipped += 1,
            SyncOutcome::GaveUp { .. } => self.failed += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} synced, {} skipped, {} failed",
            self.synced, self.skipped, self.failed
        )
    }
}

/// Validate `settings`, initialise logging for the process, and block on the
/// watch runtime until Ctrl-C.
pub fn start_blocking(settings: Settings) -> Result<RunSummary, DaemonError> {
    let config = SyncConfig::from_settings(settings)?;
    config.ensure_root_dir()?;
    init_tracing(config.verbose(), config.log_format());
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let session = Arc::new(Session::new(config, SessionIo::host()));
    runtime.block_on(run(session))
}

/// Watch and sync until Ctrl-C.
pub async fn run(session: Arc<Session>) -> Result<RunSummary, DaemonError> {
    run_until(session, async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("received ctrl-c, stopping watch"),
            Err(err) => tracing::error!(error = %err, "ctrl-c handler failed"),
        }
    })
    .await
}

/// Watch and sync until `stop` resolves or the watcher fails.
pub async fn run_until<F>(session: Arc<Session>, stop: F) -> Result<RunSummary, DaemonError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let root = session.config().root().to_path_buf();
    tracing::info!(
        root = %root.display(),
        volume = %session.config().volume(),
        reboot = session.config().reboot(),
        "starting sync session",
    );

    let (event_tx, event_rx) = mpsc::channel::<FsEvent>(EVENT_QUEUE);
    let (report_tx, report_rx) = mpsc::unbounded_channel::<SyncReport>();
    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    // Subscribe every task before any of them runs; a receiver created after
    // a send never sees it.
    let watcher_shutdown_rx = shutdown_tx.subscribe();
    let dispatcher_shutdown_rx = shutdown_tx.subscribe();
    let mut signal_shutdown_rx = shutdown_tx.subscribe();

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = watch_task(root, event_tx, watcher_shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let dispatcher_handle = {
        let dispatcher = Dispatcher::new(session).with_reports(report_tx);
        tokio::spawn(dispatcher.run(event_rx, dispatcher_shutdown_rx))
    };

    let summary_handle = tokio::spawn(collect_reports(report_rx));

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = signal_shutdown_rx.recv() => {}
                _ = stop => {
                    let _ = shutdown.send(());
                }
            }
        })
    };

    let (watcher_result, dispatcher_result, summary_result, signal_result) = tokio::join!(
        watcher_handle,
        dispatcher_handle,
        summary_handle,
        signal_handle
    );

    handle_join("watcher", watcher_result)?;
    join_ok("dispatcher", dispatcher_result)?;
    join_ok("signal_handler", signal_result)?;
    let summary = join_ok("summary", summary_result)?;

    tracing::info!(%summary, "sync session stopped");
    Ok(summary)
}

async fn collect_reports(mut reports: mpsc::UnboundedReceiver<SyncReport>) -> RunSummary {
    let mut summary = RunSummary::default();
    while let Some(report) = reports.recv().await {
        summary.record(&report.outcome);
    }
    summary
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    join_ok(task, result)?
}

fn join_ok<T>(
    task: &'static str,
    result: Result<T, tokio::task::JoinError>,
) -> Result<T, DaemonError> {
    result.map_err(|err| DaemonError::Join {
        task,
        message: err.to_string(),
    })
}

/// Install the global tracing subscriber.
///
/// Verbose sessions log at `info`, quiet ones print nothing;
/// `RUST_LOG` overrides either.
pub fn init_tracing(verbose: bool, format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Filter directive used when `RUST_LOG` is unset.
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_each_outcome() {
        let mut summary = RunSummary::default();
        summary.record(&SyncOutcome::Synced { attempts: 1 });
        summary.record(&SyncOutcome::Synced { attempts: 3 });
        summary.record(&SyncOutcome::Skipped {
            reason: "outside root".to_string(),
        });
        summary.record(&SyncOutcome::GaveUp {
            attempts: 5,
            error: "busy".to_string(),
        });
        assert_eq!(
            summary,
            RunSummary {
                synced: 2,
                skipped: 1,
                failed: 1,
            }
        );
        assert_eq!(summary.to_string(), "2 synced, 1 skipped, 1 failed");
    }

    #[tokio::test]
    async fn reports_are_tallied_until_the_channel_closes() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(SyncReport {
            event: FsEvent::modified("/proj/a.py"),
            outcome: SyncOutcome::Synced { attempts: 1 },
        })
        .unwrap();
        drop(tx);
        let summary = collect_reports(rx).await;
        assert_eq!(summary.synced, 1);
    }

    #[test]
    fn quiet_sessions_log_nothing_by_default() {
        assert_eq!(default_filter(true), "info");
        assert_eq!(default_filter(false), "off");
    }
}
