//! In-memory host fakes shared by the unit tests

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::host::{
    ForegroundHost, ForegroundNotice, HostError, InterruptionFilter, NotificationPolicy,
    RunningFlagStore,
};
use crate::sensors::{ListenerHandle, SensorEvent, SensorKind, SensorSource, SensorSourceError};

fn injected(what: &str) -> HostError {
    HostError::Io(io::Error::new(io::ErrorKind::Other, format!("injected {what} failure")))
}

/// Notification policy held in memory, recording every write
pub struct MemoryPolicy {
    filter: Mutex<InterruptionFilter>,
    writes: Mutex<Vec<InterruptionFilter>>,
    granted: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryPolicy {
    pub fn new(filter: InterruptionFilter) -> Self {
        Self {
            filter: Mutex::new(filter),
            writes: Mutex::new(Vec::new()),
            granted: AtomicBool::new(true),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn denied() -> Self {
        let policy = Self::new(InterruptionFilter::All);
        policy.granted.store(false, Ordering::SeqCst);
        policy
    }

    pub fn filter(&self) -> InterruptionFilter {
        *self.filter.lock().unwrap()
    }

    /// Change the filter the way a user would, without recording a write
    pub fn set_external(&self, filter: InterruptionFilter) {
        *self.filter.lock().unwrap() = filter;
    }

    pub fn writes(&self) -> Vec<InterruptionFilter> {
        self.writes.lock().unwrap().clone()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl NotificationPolicy for MemoryPolicy {
    fn current_filter(&self) -> Result<InterruptionFilter, HostError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("read"));
        }
        Ok(self.filter())
    }

    fn set_filter(&self, filter: InterruptionFilter) -> Result<(), HostError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected("write"));
        }
        *self.filter.lock().unwrap() = filter;
        self.writes.lock().unwrap().push(filter);
        Ok(())
    }

    fn is_policy_access_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}

/// Running flag held in memory
#[derive(Default)]
pub struct MemoryFlag {
    value: Mutex<bool>,
    writes: Mutex<Vec<bool>>,
}

impl MemoryFlag {
    pub fn value(&self) -> bool {
        *self.value.lock().unwrap()
    }

    pub fn writes(&self) -> Vec<bool> {
        self.writes.lock().unwrap().clone()
    }
}

impl RunningFlagStore for MemoryFlag {
    fn get(&self) -> Result<bool, HostError> {
        Ok(self.value())
    }

    fn set(&self, running: bool) -> Result<(), HostError> {
        *self.value.lock().unwrap() = running;
        self.writes.lock().unwrap().push(running);
        Ok(())
    }
}

/// Sensor source whose events are pushed by the test
pub struct FakeSensors {
    present: Vec<SensorKind>,
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, (SensorKind, mpsc::Sender<SensorEvent>)>>,
}

impl FakeSensors {
    pub fn with(present: &[SensorKind]) -> Self {
        Self {
            present: present.to_vec(),
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    pub fn full() -> Self {
        Self::with(&[SensorKind::Accelerometer, SensorKind::Proximity])
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Deliver an event to every listener of its kind
    pub async fn emit(&self, event: SensorEvent) {
        let targets: Vec<_> = self
            .listeners
            .lock()
            .unwrap()
            .values()
            .filter(|(kind, _)| *kind == event.kind)
            .map(|(_, tx)| tx.clone())
            .collect();

        for tx in targets {
            let _ = tx.send(event.clone()).await;
        }
    }
}

impl SensorSource for FakeSensors {
    fn has_sensor(&self, kind: SensorKind) -> bool {
        self.present.contains(&kind)
    }

    fn subscribe(
        &self,
        kind: SensorKind,
        inbox: mpsc::Sender<SensorEvent>,
    ) -> Result<ListenerHandle, SensorSourceError> {
        if !self.has_sensor(kind) {
            return Err(SensorSourceError::NotPresent(kind));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().unwrap().insert(id, (kind, inbox));
        Ok(ListenerHandle { id, kind })
    }

    fn unsubscribe(&self, handle: ListenerHandle) {
        self.listeners.lock().unwrap().remove(&handle.id);
    }
}

/// Counts foreground enter/exit calls
#[derive(Default)]
pub struct RecordingForeground {
    pub entered: AtomicUsize,
    pub exited: AtomicUsize,
}

impl RecordingForeground {
    pub fn is_foreground(&self) -> bool {
        self.entered.load(Ordering::SeqCst) > self.exited.load(Ordering::SeqCst)
    }
}

impl ForegroundHost for RecordingForeground {
    fn enter(&self, _notice: &ForegroundNotice) {
        self.entered.fetch_add(1, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.exited.fetch_add(1, Ordering::SeqCst);
    }
}
