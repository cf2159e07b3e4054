//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Default sampling cadence, matching a "normal" sensor delay
const DEFAULT_POLL_MS: u64 = 200;

/// Raw proximity reading at or above which the sensor counts as covered.
/// Ambient reflectance on common IIO proximity sensors reads well below
/// this; a reading of 1 is plain noise.
const DEFAULT_PROXIMITY_NEAR: f64 = 100.0;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// File holding the persisted running flag
    pub running_flag_path: PathBuf,

    /// File holding the host interruption filter
    pub filter_path: PathBuf,

    /// Root of the Industrial I/O device tree
    pub iio_root: PathBuf,

    /// Interval between two sensor reads
    pub poll_interval: Duration,

    /// Raw proximity value at or above which the sensor counts as covered
    pub proximity_near_threshold: f64,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = match lookup("QUIET_MODE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = lookup("HOME").context("HOME is not set")?;
                PathBuf::from(home)
                    .join(".local")
                    .join("share")
                    .join("quiet-mode")
            }
        };

        let socket_path = lookup("QUIET_MODE_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("daemon.sock"));

        let iio_root = lookup("QUIET_MODE_IIO_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/sys/bus/iio/devices"));

        let poll_ms = match lookup("QUIET_MODE_POLL_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid QUIET_MODE_POLL_MS: {raw}"))?,
            None => DEFAULT_POLL_MS,
        };

        let proximity_near_threshold = match lookup("QUIET_MODE_PROXIMITY_NEAR") {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .with_context(|| format!("invalid QUIET_MODE_PROXIMITY_NEAR: {raw}"))?,
            None => DEFAULT_PROXIMITY_NEAR,
        };

        Ok(Self {
            socket_path,
            running_flag_path: data_dir.join("running"),
            filter_path: data_dir.join("interruption_filter.json"),
            data_dir,
            iio_root,
            poll_interval: Duration::from_millis(poll_ms),
            proximity_near_threshold,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}
