use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use boardsync_core::config::Settings;
use boardsync_daemon::{run_until, RunSummary};
use boardsync_sync::mock::{Journal, MockSerial, RecordingSleeper};
use boardsync_sync::{HostVolume, Session, SessionIo};
use tempfile::TempDir;
use tokio::sync::oneshot;

async fn wait_for(what: &str, check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {what}");
}

fn session(root: &Path, mount: &Path, journal: &Journal) -> Arc<Session> {
    let settings = Settings {
        reboot: Some(true),
        port: Some("/dev/ttyTEST".to_string()),
        backoff_ms: Some(50),
        ..Settings::new(root, mount.to_string_lossy().into_owned())
    };
    let io = SessionIo {
        volume: Arc::new(HostVolume),
        serial: Arc::new(MockSerial::new(journal.clone())),
        sleeper: Arc::new(RecordingSleeper::new(journal.clone())),
    };
    Arc::new(Session::from_settings(settings, io).expect("session"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn saved_files_are_mirrored_and_removed_on_the_volume() {
    let src = TempDir::new().expect("src");
    let mount = TempDir::new().expect("mount");
    let journal = Journal::default();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(run_until(session(src.path(), mount.path(), &journal), async {
        let _ = stop_rx.await;
    }));

    // Give the watcher a moment to register before the first write.
    tokio::time::sleep(Duration::from_millis(300)).await;

    fs::write(src.path().join("main.py"), "print('hello')").expect("write main.py");
    let mirrored = mount.path().join("main.py");
    wait_for("main.py on the volume", || {
        fs::read_to_string(&mirrored).map(|s| s == "print('hello')").unwrap_or(false)
    })
    .await;
    wait_for("a soft reboot", || journal.serial_writes().len() >= 2).await;
    assert_eq!(&journal.serial_writes()[..2], &[0x03, 0x04]);

    fs::remove_file(src.path().join("main.py")).expect("remove main.py");
    wait_for("main.py gone from the volume", || !mirrored.exists()).await;

    stop_tx.send(()).expect("runtime alive");
    let summary: RunSummary = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("runtime stops")
        .expect("join")
        .expect("run ok");
    assert!(summary.synced >= 2, "summary: {summary}");
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn missing_root_is_reported_as_an_error() {
    let dir = TempDir::new().expect("dir");
    let mount = TempDir::new().expect("mount");
    let journal = Journal::default();

    let result = run_until(
        session(&dir.path().join("absent"), mount.path(), &journal),
        std::future::pending(),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn startup_failure_stops_every_task_on_a_multi_thread_runtime() {
    let dir = TempDir::new().expect("dir");
    let mount = TempDir::new().expect("mount");
    let journal = Journal::default();
    let absent = dir.path().join("absent");

    for round in 0..200 {
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            run_until(session(&absent, mount.path(), &journal), std::future::pending()),
        )
        .await
        .unwrap_or_else(|_| panic!("runtime hung after watcher failure (round {round})"));
        assert!(result.is_err());
    }
}
