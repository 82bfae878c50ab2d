//! # gitsync-mirror
//!
//! Repository synchronization engine: host-key trust, the
//! clone → verify → push lifecycle, and per-repo failure isolation.
//!
//! Build a [`SyncCoordinator`] from a resolved config and call
//! [`SyncCoordinator::sync_all`] once per cycle.

pub mod command;
pub mod coordinator;
pub mod error;
pub mod git;
pub mod mirror;
pub mod ssh;
pub mod trust;

pub use command::{CommandOutput, CommandRunner, Invocation, SystemRunner};
pub use coordinator::{plan, RepoOutcome, SyncCoordinator, SyncReport};
pub use error::{CommandError, MirrorError, Step, StepError, TrustError};
pub use mirror::{MirrorContext, MirrorState, RepositoryMirror};
pub use ssh::SshOptions;
pub use trust::HostKeyTrustStore;
