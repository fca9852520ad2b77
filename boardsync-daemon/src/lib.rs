//! Watch runtime: filesystem watcher + event dispatcher + Ctrl-C shutdown.

pub mod dispatcher;
mod error;
mod runtime;
pub mod watcher;

pub use dispatcher::{Dispatcher, SyncReport};
pub use error::DaemonError;
pub use runtime::{init_tracing, run, run_until, start_blocking, RunSummary};
