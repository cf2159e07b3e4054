//! Sensor sampler: owns the listener registrations for one service run

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::reading::{SensorEvent, SensorKind};
use super::source::{ListenerHandle, SensorSource, SensorSourceError};

/// The two sensors the face-down heuristic needs
pub const REQUIRED_SENSORS: [SensorKind; 2] = [SensorKind::Accelerometer, SensorKind::Proximity];

/// Registers the accelerometer and proximity listeners against a source
pub struct SensorSampler {
    source: Arc<dyn SensorSource>,
    handles: Vec<ListenerHandle>,
}

impl SensorSampler {
    pub fn new(source: Arc<dyn SensorSource>) -> Self {
        Self {
            source,
            handles: Vec::new(),
        }
    }

    /// First required sensor the device lacks, if any
    pub fn missing_sensor(&self) -> Option<SensorKind> {
        REQUIRED_SENSORS
            .into_iter()
            .find(|kind| !self.source.has_sensor(*kind))
    }

    /// Register both listeners, all feeding the same inbox
    ///
    /// On failure every listener registered so far is removed again.
    pub fn register(&mut self, inbox: mpsc::Sender<SensorEvent>) -> Result<(), SensorSourceError> {
        for kind in REQUIRED_SENSORS {
            match self.source.subscribe(kind, inbox.clone()) {
                Ok(handle) => {
                    debug!(id = handle.id, %kind, "sensor listener registered");
                    self.handles.push(handle);
                }
                Err(e) => {
                    self.unregister();
                    return Err(e);
                }
            }
        }

        info!(listeners = self.handles.len(), "sensor listeners registered");
        Ok(())
    }

    /// Remove every registered listener
    pub fn unregister(&mut self) {
        if self.handles.is_empty() {
            return;
        }

        for handle in self.handles.drain(..) {
            self.source.unsubscribe(handle);
        }
        info!("sensor listeners unregistered");
    }

    #[cfg(test)]
    pub fn is_registered(&self) -> bool {
        !self.handles.is_empty()
    }
}
