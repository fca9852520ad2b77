//! Bounded retry with a fixed backoff between attempts.

use std::fmt;
use std::time::Duration;

use crate::error::SyncError;

/// Blocking pause between attempts and between serial control bytes.
pub trait Sleeper: fmt::Debug + Send + Sync + 'static {
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// How a sync action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The action succeeded after `attempts` tries (1 = first time).
    Synced { attempts: u32 },
    /// The action could not apply and was not retried.
    Skipped { reason: String },
    /// Every attempt failed; the budget is exhausted.
    GaveUp { attempts: u32, error: String },
}

impl SyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Synced { .. })
    }
}

/// Run `attempt` until it succeeds, fails permanently, or `retries`
/// re-attempts have been spent. At most `retries + 1` attempts are made,
/// with `backoff` slept after each transient failure that still has budget.
pub(crate) fn run<F>(
    action: &str,
    retries: u32,
    backoff: Duration,
    sleeper: &dyn Sleeper,
    mut attempt: F,
) -> SyncOutcome
where
    F: FnMut() -> Result<(), SyncError>,
{
    let mut remaining = retries;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match attempt() {
            Ok(()) => return SyncOutcome::Synced { attempts },
            Err(err) if !err.is_transient() => {
                tracing::debug!(action, error = %err, "skipping");
                return SyncOutcome::Skipped {
                    reason: err.to_string(),
                };
            }
            Err(err) if remaining > 0 => {
                remaining -= 1;
                tracing::info!(
                    action,
                    attempt = attempts,
                    remaining,
                    error = %err,
                    "failed to {action}, retrying in {backoff:?}",
                );
                sleeper.sleep(backoff);
            }
            Err(err) => {
                tracing::error!(
                    action,
                    attempts,
                    error = %err,
                    "maximum retries exceeded; if you have an open REPL session, \
                     close it or send Ctrl+C to continue",
                );
                return SyncOutcome::GaveUp {
                    attempts,
                    error: err.to_string(),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::PathBuf;

    use crate::error::io_err;
    use crate::mock::{Call, Journal, RecordingSleeper};

    use super::*;

    fn busy() -> SyncError {
        io_err("/media/PYBFLASH/main.py", io::Error::other("busy"))
    }

    #[test]
    fn first_success_needs_no_backoff() {
        let journal = Journal::default();
        let sleeper = RecordingSleeper::new(journal.clone());
        let outcome = run("upload", 4, Duration::from_secs(1), &sleeper, || Ok(()));
        assert_eq!(outcome, SyncOutcome::Synced { attempts: 1 });
        assert!(journal.calls().is_empty());
    }

    #[test]
    fn two_failures_then_success() {
        let journal = Journal::default();
        let sleeper = RecordingSleeper::new(journal.clone());
        let mut failures_left = 2;
        let outcome = run("upload", 4, Duration::from_secs(1), &sleeper, || {
            if failures_left > 0 {
                failures_left -= 1;
                Err(busy())
            } else {
                Ok(())
            }
        });
        assert_eq!(outcome, SyncOutcome::Synced { attempts: 3 });
        assert_eq!(
            journal.calls(),
            vec![
                Call::Sleep(Duration::from_secs(1)),
                Call::Sleep(Duration::from_secs(1)),
            ]
        );
    }

    #[test]
    fn exhaustion_makes_budget_plus_one_attempts() {
        let journal = Journal::default();
        let sleeper = RecordingSleeper::new(journal.clone());
        let mut tries = 0;
        let outcome = run("delete", 4, Duration::from_secs(1), &sleeper, || {
            tries += 1;
            Err(busy())
        });
        assert_eq!(tries, 5);
        assert!(matches!(outcome, SyncOutcome::GaveUp { attempts: 5, .. }));
        assert_eq!(journal.sleeps(), 4);
    }

    #[test]
    fn exhaustion_logs_a_terminal_failure_once() {
        let journal = Journal::default();
        let sleeper = RecordingSleeper::new(journal.clone());
        let (outcome, logs) = crate::test_log::capture(|| {
            run("upload", 2, Duration::from_secs(1), &sleeper, || Err(busy()))
        });

        assert!(matches!(outcome, SyncOutcome::GaveUp { attempts: 3, .. }));
        assert_eq!(logs.matches("maximum retries exceeded").count(), 1, "{logs}");
        assert!(logs.contains("ERROR"), "{logs}");
        assert!(logs.contains("close it or send Ctrl+C"), "{logs}");
        assert_eq!(logs.matches("retrying in").count(), 2, "{logs}");
    }

    #[test]
    fn zero_budget_means_single_attempt() {
        let journal = Journal::default();
        let sleeper = RecordingSleeper::new(journal.clone());
        let outcome = run("upload", 0, Duration::from_secs(1), &sleeper, || Err(busy()));
        assert!(matches!(outcome, SyncOutcome::GaveUp { attempts: 1, .. }));
        assert_eq!(journal.sleeps(), 0);
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let journal = Journal::default();
        let sleeper = RecordingSleeper::new(journal.clone());
        let mut tries = 0;
        let outcome = run("upload", 4, Duration::from_secs(1), &sleeper, || {
            tries += 1;
            Err(SyncError::SourceMissing {
                path: PathBuf::from("/src/tmp.py"),
            })
        });
        assert_eq!(tries, 1);
        assert!(matches!(outcome, SyncOutcome::Skipped { .. }));
        assert_eq!(journal.sleeps(), 0);
    }
}
