//! Recursive watch on the source root and translation of raw notify
//! events into [`FsEvent`]s.

use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use boardsync_core::types::FsEvent;

use crate::error::{io_err, DaemonError};

/// Translate one notify event into zero or more sync events.
///
/// Directory events, metadata changes and reads are dropped; renames
/// become a delete of the old name and/or a create of the new one.
pub fn classify(event: &Event) -> Vec<FsEvent> {
    match &event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => files(&event.paths, FsEvent::created),

        EventKind::Modify(ModifyKind::Name(mode)) => classify_rename(*mode, &event.paths),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => files(&event.paths, FsEvent::modified),

        EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Remove(_) => event.paths.iter().cloned().map(FsEvent::deleted).collect(),

        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn classify_rename(mode: RenameMode, paths: &[PathBuf]) -> Vec<FsEvent> {
    match mode {
        RenameMode::From => paths.iter().cloned().map(FsEvent::deleted).collect(),
        RenameMode::To => files(paths, FsEvent::created),
        RenameMode::Both => match paths {
            [from, to] if !to.is_dir() => {
                vec![FsEvent::deleted(from.clone()), FsEvent::created(to.clone())]
            }
            _ => Vec::new(),
        },
        // Backends that cannot tell which side of the rename this is.
        RenameMode::Any | RenameMode::Other => paths
            .iter()
            .filter(|path| !path.is_dir())
            .map(|path| {
                if path.exists() {
                    FsEvent::created(path.clone())
                } else {
                    FsEvent::deleted(path.clone())
                }
            })
            .collect(),
    }
}

fn files(paths: &[PathBuf], make: fn(PathBuf) -> FsEvent) -> Vec<FsEvent> {
    paths
        .iter()
        .filter(|path| !path.is_dir())
        .cloned()
        .map(make)
        .collect()
}

/// Watch `root` recursively and forward classified events until shutdown.
pub async fn watch_task(
    root: PathBuf,
    events_tx: mpsc::Sender<FsEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    ensure_root(&root)?;

    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = raw_tx.send(event);
    })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    tracing::info!(root = %root.display(), "watching files");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = raw_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                for change in classify(&event) {
                    tracing::debug!(kind = %change.kind, path = %change.path.display(), "change detected");
                    if events_tx.send(change).await.is_err() {
                        tracing::debug!("dispatcher gone; stopping watcher");
                        return Ok(());
                    }
                }
            }
        }
    }

    if let Err(err) = watcher.unwatch(&root) {
        tracing::debug!(error = %err, "unwatch on shutdown failed");
    }
    Ok(())
}

fn ensure_root(root: &Path) -> Result<(), DaemonError> {
    if root.is_dir() {
        return Ok(());
    }
    Err(io_err(
        root,
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "watched root is not a directory",
        ),
    ))
}
