//! Linux Industrial I/O sensor source
//!
//! Discovers accelerometer and proximity channels under the IIO sysfs tree
//! and polls them on dedicated threads, one per subscription.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::reading::{SensorEvent, SensorKind};
use super::source::{ListenerHandle, SensorSource, SensorSourceError};

/// Distance reported while nothing covers the proximity sensor
const FAR_DISTANCE: f32 = 5.0;

/// Sampling parameters for IIO polling
#[derive(Debug, Clone, Copy)]
pub struct IioSettings {
    pub poll_interval: Duration,
    pub proximity_near_threshold: f64,
}

/// One scaled sysfs channel
#[derive(Debug, Clone)]
struct IioChannel {
    raw: PathBuf,
    scale: f64,
    offset: f64,
}

impl IioChannel {
    fn read(&self) -> std::io::Result<f64> {
        let raw = read_number(&self.raw)?;
        Ok((raw + self.offset) * self.scale)
    }
}

/// Channels backing one sensor kind
#[derive(Debug, Clone)]
enum IioDevice {
    Accelerometer { axes: [Option<IioChannel>; 3] },
    Proximity { channel: IioChannel },
}

impl IioDevice {
    fn sample(&self, settings: &IioSettings) -> std::io::Result<SensorEvent> {
        match self {
            IioDevice::Accelerometer { axes } => {
                let mut values = [0.0f32; 3];
                for (value, axis) in values.iter_mut().zip(axes) {
                    if let Some(channel) = axis {
                        *value = channel.read()? as f32;
                    }
                }
                Ok(SensorEvent::new(SensorKind::Accelerometer, values))
            }
            IioDevice::Proximity { channel } => {
                let raw = channel.read()?;
                let distance = if raw >= settings.proximity_near_threshold {
                    0.0
                } else {
                    FAR_DISTANCE
                };
                Ok(SensorEvent::proximity(distance))
            }
        }
    }
}

/// Sensor source reading from `/sys/bus/iio/devices`
pub struct IioSensorSource {
    accelerometer: Option<IioDevice>,
    proximity: Option<IioDevice>,
    settings: IioSettings,
    next_id: AtomicU64,
    /// Running flags of the polling threads, by listener id
    listeners: Mutex<HashMap<u64, Arc<AtomicBool>>>,
}

impl IioSensorSource {
    /// Scan the IIO root for usable devices
    ///
    /// A missing root is not an error: the source then reports no sensors and
    /// starting the service fails with a missing-hardware error.
    pub fn discover(root: &Path, settings: IioSettings) -> Self {
        let mut accelerometer = None;
        let mut proximity = None;

        match fs::read_dir(root) {
            Ok(entries) => {
                let mut dirs: Vec<PathBuf> = entries
                    .filter_map(|e| e.ok().map(|e| e.path()))
                    .collect();
                dirs.sort();

                for dir in dirs {
                    if accelerometer.is_none() {
                        if let Some(device) = probe_accelerometer(&dir) {
                            info!(device = %dir.display(), "found accelerometer");
                            accelerometer = Some(device);
                        }
                    }
                    if proximity.is_none() {
                        if let Some(device) = probe_proximity(&dir) {
                            info!(device = %dir.display(), "found proximity sensor");
                            proximity = Some(device);
                        }
                    }
                }
            }
            Err(e) => {
                warn!(root = %root.display(), ?e, "cannot read IIO device tree");
            }
        }

        Self {
            accelerometer,
            proximity,
            settings,
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    fn device(&self, kind: SensorKind) -> Option<&IioDevice> {
        match kind {
            SensorKind::Accelerometer => self.accelerometer.as_ref(),
            SensorKind::Proximity => self.proximity.as_ref(),
            SensorKind::Other(_) => None,
        }
    }
}

impl SensorSource for IioSensorSource {
    fn has_sensor(&self, kind: SensorKind) -> bool {
        self.device(kind).is_some()
    }

    fn subscribe(
        &self,
        kind: SensorKind,
        inbox: mpsc::Sender<SensorEvent>,
    ) -> Result<ListenerHandle, SensorSourceError> {
        let device = self
            .device(kind)
            .cloned()
            .ok_or(SensorSourceError::NotPresent(kind))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let running = Arc::new(AtomicBool::new(true));
        let settings = self.settings;
        let thread_running = Arc::clone(&running);

        thread::Builder::new()
            .name(format!("iio-{kind}"))
            .spawn(move || {
                debug!(%kind, id, "sampling thread started");
                poll_loop(device, settings, inbox, &thread_running);
                thread_running.store(false, Ordering::SeqCst);
                debug!(%kind, id, "sampling thread stopped");
            })
            .map_err(|e| SensorSourceError::ThreadSpawn(e.to_string()))?;

        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.insert(id, running);
        }

        Ok(ListenerHandle { id, kind })
    }

    fn unsubscribe(&self, handle: ListenerHandle) {
        let running = self
            .listeners
            .lock()
            .ok()
            .and_then(|mut listeners| listeners.remove(&handle.id));

        match running {
            Some(running) => {
                debug!(id = handle.id, kind = %handle.kind, "stopping sampling thread");
                running.store(false, Ordering::SeqCst);
            }
            None => debug!(id = handle.id, "unsubscribe for unknown listener"),
        }
    }
}

/// Read one device at the configured cadence until stopped
fn poll_loop(
    device: IioDevice,
    settings: IioSettings,
    inbox: mpsc::Sender<SensorEvent>,
    running: &AtomicBool,
) {
    while running.load(Ordering::SeqCst) {
        match device.sample(&settings) {
            Ok(event) => {
                // Sampling threads live outside the runtime
                if inbox.blocking_send(event).is_err() {
                    debug!("sensor inbox closed");
                    break;
                }
            }
            Err(e) => {
                warn!(?e, "failed to read IIO channel");
            }
        }

        thread::sleep(settings.poll_interval);
    }
}

fn probe_accelerometer(dir: &Path) -> Option<IioDevice> {
    let z = dir.join("in_accel_z_raw");
    if !z.exists() {
        return None;
    }

    let shared_scale = read_optional(&dir.join("in_accel_scale")).unwrap_or(1.0);
    let shared_offset = read_optional(&dir.join("in_accel_offset")).unwrap_or(0.0);

    let axes = ["x", "y", "z"].map(|axis| {
        let raw = dir.join(format!("in_accel_{axis}_raw"));
        raw.exists().then(|| IioChannel {
            raw,
            scale: read_optional(&dir.join(format!("in_accel_{axis}_scale")))
                .unwrap_or(shared_scale),
            offset: read_optional(&dir.join(format!("in_accel_{axis}_offset")))
                .unwrap_or(shared_offset),
        })
    });

    Some(IioDevice::Accelerometer { axes })
}

fn probe_proximity(dir: &Path) -> Option<IioDevice> {
    ["in_proximity_raw", "in_proximity0_raw"]
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
        .map(|raw| IioDevice::Proximity {
            channel: IioChannel {
                raw,
                scale: 1.0,
                offset: 0.0,
            },
        })
}

fn read_number(path: &Path) -> std::io::Result<f64> {
    let text = fs::read_to_string(path)?;
    text.trim().parse::<f64>().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{}: {e}", path.display()),
        )
    })
}

fn read_optional(path: &Path) -> Option<f64> {
    read_number(path).ok()
}
