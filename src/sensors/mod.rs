//! Sensor module for accelerometer and proximity sampling
//!
//! Sources deliver raw events into an inbox; the sampler manages the
//! listener registrations and readings are classified on the consumer side.

mod iio;
mod reading;
mod sampler;
mod source;

pub use iio::{IioSensorSource, IioSettings};
pub use reading::{is_covered, is_face_down, SensorEvent, SensorKind, SensorReading};
pub use sampler::SensorSampler;
pub use source::{SensorSource, SensorSourceError};

#[cfg(test)]
pub use source::ListenerHandle;
