//! Host collaborators: notification policy, persisted flag, foreground mode
//!
//! Each facility is a trait so the service takes explicit handles instead
//! of reaching for ambient global state.

mod filter;
mod foreground;
mod store;

pub use filter::{FileNotificationPolicy, InterruptionFilter, NotificationPolicy};
pub use foreground::{ForegroundHost, ForegroundNotice, LogForeground};
pub use store::{FileRunningFlag, RunningFlagStore};

/// Errors from reading or writing host state
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("host I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("host state is malformed: {0}")]
    Decode(#[from] serde_json::Error),
}
