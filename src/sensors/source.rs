//! Sensor subscription port

use tokio::sync::mpsc;

use super::reading::{SensorEvent, SensorKind};

/// Identifies one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    pub id: u64,
    pub kind: SensorKind,
}

/// Errors that can occur while subscribing to a sensor
#[derive(Debug, thiserror::Error)]
pub enum SensorSourceError {
    #[error("no {0} sensor present")]
    NotPresent(SensorKind),

    #[error("failed to spawn sampling thread: {0}")]
    ThreadSpawn(String),
}

/// A host facility delivering sensor events
///
/// Implementations push every event for a subscription into the given inbox
/// until the handle is unsubscribed or the inbox is closed.
pub trait SensorSource: Send + Sync {
    /// Whether a sensor of this kind exists on the device
    fn has_sensor(&self, kind: SensorKind) -> bool;

    /// Start continuous delivery of `kind` events into `inbox`
    fn subscribe(
        &self,
        kind: SensorKind,
        inbox: mpsc::Sender<SensorEvent>,
    ) -> Result<ListenerHandle, SensorSourceError>;

    /// Stop delivery for a handle. Unknown handles are ignored.
    fn unsubscribe(&self, handle: ListenerHandle);
}
