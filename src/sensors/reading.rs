//! Sensor event types and classification
//!
//! Raw events carry a sensor-type tag and a value array, the way a host
//! sensor framework delivers them. Classification turns them into typed
//! readings and the two boolean conditions the mute decision uses.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Index of the z component in an accelerometer value array
const Z_INDEX: usize = 2;

/// Lower bound of the face-down z range, in m/s^2
pub const FACE_DOWN_MIN_Z: f32 = -10.0;

/// Upper bound of the face-down z range, in m/s^2
pub const FACE_DOWN_MAX_Z: f32 = -9.0;

/// Sensor types a source may deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Accelerometer,
    Proximity,
    /// Any sensor type this daemon does not listen for
    Other(u32),
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorKind::Accelerometer => write!(f, "accelerometer"),
            SensorKind::Proximity => write!(f, "proximity"),
            SensorKind::Other(id) => write!(f, "sensor#{id}"),
        }
    }
}

/// A raw event as delivered by a sensor source
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub kind: SensorKind,
    pub values: Vec<f32>,
}

impl SensorEvent {
    pub fn new(kind: SensorKind, values: impl Into<Vec<f32>>) -> Self {
        Self {
            kind,
            values: values.into(),
        }
    }

    /// Accelerometer event with the given z component
    #[cfg(test)]
    pub fn accelerometer(z: f32) -> Self {
        Self::new(SensorKind::Accelerometer, [0.0, 0.0, z])
    }

    /// Proximity event with the given distance
    pub fn proximity(distance: f32) -> Self {
        Self::new(SensorKind::Proximity, [distance])
    }
}

/// A classified reading, consumed immediately and never retained
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorReading {
    /// z-axis acceleration
    Accelerometer(f32),
    /// Distance to the nearest object; zero means covered
    Proximity(f32),
}

impl SensorReading {
    /// Classify a raw event. Returns `None` for events that must be discarded.
    pub fn classify(event: &SensorEvent) -> Option<Self> {
        match event.kind {
            SensorKind::Accelerometer => match event.values.get(Z_INDEX) {
                Some(&z) => Some(SensorReading::Accelerometer(z)),
                None => {
                    warn!(len = event.values.len(), "accelerometer event without z component");
                    None
                }
            },
            SensorKind::Proximity => match event.values.first() {
                Some(&distance) => Some(SensorReading::Proximity(distance)),
                None => {
                    warn!("proximity event without a distance");
                    None
                }
            },
            SensorKind::Other(_) => {
                warn!(kind = %event.kind, "unexpected sensor event, not listening to this type");
                None
            }
        }
    }
}

/// Face-down heuristic: z lies in [-10, -9]
pub fn is_face_down(z: f32) -> bool {
    (FACE_DOWN_MIN_Z..=FACE_DOWN_MAX_Z).contains(&z)
}

/// Proximity heuristic: something touches the sensor
pub fn is_covered(distance: f32) -> bool {
    distance == 0.0
}
