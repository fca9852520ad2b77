//! Concurrent event dispatch.
//!
//! Every source path gets a lane: a queue drained by a single task, so
//! events for the same file apply in arrival order. Lanes for different
//! paths run side by side, bounded by a semaphore sized to the configured
//! worker count, so a retry backoff on one file never holds up another.
//! Arrival order across *different* paths is not preserved.
//!
//! A lane lives for one burst of events. When its queue runs dry it closes
//! and exits; the next event for that path opens a fresh lane, which waits
//! for its predecessor to finish before touching the volume.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::error::{SendError, TryRecvError};
use tokio::sync::{broadcast, mpsc, oneshot, Semaphore};
use tokio::task::JoinSet;

use boardsync_core::types::FsEvent;
use boardsync_sync::{Session, SyncOutcome};

/// One handled event and how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub event: FsEvent,
    pub outcome: SyncOutcome,
}

struct Lane {
    tx: mpsc::UnboundedSender<FsEvent>,
    /// Resolves (with `Err`) once the lane task has exited.
    finished: oneshot::Receiver<()>,
}

#[derive(Clone)]
struct LaneContext {
    session: Arc<Session>,
    permits: Arc<Semaphore>,
    reports: Option<mpsc::UnboundedSender<SyncReport>>,
}

/// Routes filesystem events to per-path lanes.
pub struct Dispatcher {
    ctx: LaneContext,
    lanes: HashMap<PathBuf, Lane>,
    tasks: JoinSet<()>,
}

impl Dispatcher {
    pub fn new(session: Arc<Session>) -> Self {
        let permits = Arc::new(Semaphore::new(session.config().workers()));
        Self {
            ctx: LaneContext {
                session,
                permits,
                reports: None,
            },
            lanes: HashMap::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Forward a [`SyncReport`] for every handled event to `reports`.
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<SyncReport>) -> Self {
        self.ctx.reports = Some(reports);
        self
    }

    /// Queue `event` on its path's lane, opening a new lane when needed.
    pub fn dispatch(&mut self, event: FsEvent) {
        let mut event = event;
        let mut predecessor = None;

        if let Some(lane) = self.lanes.get(&event.path) {
            match lane.tx.send(event) {
                Ok(()) => return,
                Err(SendError(returned)) => event = returned,
            }
            predecessor = self.lanes.remove(&event.path).map(|lane| lane.finished);
        }

        self.lanes.retain(|_, lane| {
            !matches!(
                lane.finished.try_recv(),
                Err(oneshot::error::TryRecvError::Closed)
            )
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let (done, finished) = oneshot::channel();
        let path = event.path.clone();
        // The receiver is alive in this scope, so the send cannot fail.
        let _ = tx.send(event);

        self.tasks
            .spawn(run_lane(self.ctx.clone(), rx, predecessor, done));
        self.lanes.insert(path, Lane { tx, finished });
    }

    /// Dispatch until `events` closes or shutdown is signalled, then let
    /// every lane work through what it has already queued.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<FsEvent>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                event = events.recv() => {
                    let Some(event) = event else { break };
                    self.dispatch(event);
                }
                Some(joined) = self.tasks.join_next() => {
                    if let Err(err) = joined {
                        tracing::error!(error = %err, "sync lane failed");
                    }
                }
            }
        }
        self.finish().await;
    }

    /// Close every lane and wait for the queued work to complete.
    pub async fn finish(mut self) {
        self.lanes.clear();
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                tracing::error!(error = %err, "sync lane failed");
            }
        }
    }
}

async fn run_lane(
    ctx: LaneContext,
    mut rx: mpsc::UnboundedReceiver<FsEvent>,
    predecessor: Option<oneshot::Receiver<()>>,
    _done: oneshot::Sender<()>,
) {
    if let Some(previous) = predecessor {
        let _ = previous.await;
    }

    let mut carried: Option<FsEvent> = None;
    loop {
        let first = match carried.take() {
            Some(event) => event,
            None => match next_event(&mut rx).await {
                Some(event) => event,
                None => break,
            },
        };
        let (event, next) = coalesce(first, &mut rx);
        carried = next;
        ctx.process(event).await;
    }
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<FsEvent>) -> Option<FsEvent> {
    match rx.try_recv() {
        Ok(event) => Some(event),
        Err(TryRecvError::Disconnected) => None,
        Err(TryRecvError::Empty) => {
            // Refuse new events, then drain anything that raced in.
            rx.close();
            rx.recv().await
        }
    }
}

/// Fold consecutive queued events of the same action into the latest one.
/// An upload copies whatever the file holds now, so one copy covers a burst.
fn coalesce(
    mut event: FsEvent,
    rx: &mut mpsc::UnboundedReceiver<FsEvent>,
) -> (FsEvent, Option<FsEvent>) {
    while let Ok(next) = rx.try_recv() {
        if next.kind.is_upload() != event.kind.is_upload() {
            return (event, Some(next));
        }
        tracing::debug!(
            path = %event.path.display(),
            kind = %event.kind,
            "coalesced with queued event",
        );
        event = next;
    }
    (event, None)
}

impl LaneContext {
    async fn process(&self, event: FsEvent) {
        let Ok(permit) = self.permits.clone().acquire_owned().await else {
            return;
        };

        let session = self.session.clone();
        let job = event.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            session.handle(&job)
        })
        .await;

        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(
                    path = %event.path.display(),
                    error = %err,
                    "sync task join error",
                );
                return;
            }
        };

        if let SyncOutcome::Synced { attempts } = &outcome {
            tracing::info!(
                kind = %event.kind,
                path = %event.path.display(),
                attempts,
                "synced",
            );
        }

        if let Some(reports) = &self.reports {
            let _ = reports.send(SyncReport { event, outcome });
        }
    }
}
