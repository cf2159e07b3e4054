//! Interruption filter port and its file-backed adapter

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::HostError;

/// Host-wide notification suppression level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionFilter {
    /// Every notification gets through
    #[default]
    All,
    /// Suppress virtually everything (do not disturb)
    None,
    /// Only priority notifications
    Priority,
    /// Only alarms
    Alarms,
}

impl std::fmt::Display for InterruptionFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterruptionFilter::All => write!(f, "ALL"),
            InterruptionFilter::None => write!(f, "NONE"),
            InterruptionFilter::Priority => write!(f, "PRIORITY"),
            InterruptionFilter::Alarms => write!(f, "ALARMS"),
        }
    }
}

/// Access to the host notification policy
pub trait NotificationPolicy: Send + Sync {
    fn current_filter(&self) -> Result<InterruptionFilter, HostError>;

    fn set_filter(&self, filter: InterruptionFilter) -> Result<(), HostError>;

    /// Whether this process may change the filter at all
    fn is_policy_access_granted(&self) -> bool;
}

/// Keeps the filter in a JSON file other desktop components can watch
#[derive(Debug, Clone)]
pub struct FileNotificationPolicy {
    path: PathBuf,
}

impl FileNotificationPolicy {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl NotificationPolicy for FileNotificationPolicy {
    fn current_filter(&self) -> Result<InterruptionFilter, HostError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(InterruptionFilter::All),
            Err(e) => Err(e.into()),
        }
    }

    fn set_filter(&self, filter: InterruptionFilter) -> Result<(), HostError> {
        let bytes = serde_json::to_vec(&filter)?;
        // Write then rename so readers never observe a partial file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        debug!(%filter, path = %self.path.display(), "interruption filter written");
        Ok(())
    }

    fn is_policy_access_granted(&self) -> bool {
        let Some(dir) = self.path.parent() else {
            return false;
        };
        fs::metadata(dir)
            .map(|meta| meta.is_dir() && !meta.permissions().readonly())
            .unwrap_or(false)
    }
}
