//! Persisted running flag

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::HostError;

/// Boolean that survives process restarts
pub trait RunningFlagStore: Send + Sync {
    fn get(&self) -> Result<bool, HostError>;

    fn set(&self, running: bool) -> Result<(), HostError>;
}

/// Stores the flag as `true`/`false` in a small text file
#[derive(Debug, Clone)]
pub struct FileRunningFlag {
    path: PathBuf,
}

impl FileRunningFlag {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl RunningFlagStore for FileRunningFlag {
    fn get(&self) -> Result<bool, HostError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text.trim() == "true"),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, running: bool) -> Result<(), HostError> {
        fs::write(&self.path, if running { "true\n" } else { "false\n" })?;
        Ok(())
    }
}
