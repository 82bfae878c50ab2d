//! gitsync runtime: cron schedule, signal handling, and the setup/sync loop.

mod error;
mod runtime;
pub mod schedule;

pub use error::DaemonError;
pub use runtime::{init_tracing, run, run_until, shutdown_signal, start_blocking, RunOutcome};
pub use schedule::CronSchedule;
