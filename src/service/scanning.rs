//! Scanning service lifecycle
//!
//! Owns the sensor listeners and the task running the mute state machine for
//! one start/stop cycle, and keeps the persisted running flag in step.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::events::ServiceEvent;
use crate::host::{
    ForegroundHost, ForegroundNotice, HostError, InterruptionFilter, NotificationPolicy,
    RunningFlagStore,
};
use crate::sensors::{SensorKind, SensorSampler, SensorSource, SensorSourceError};
use crate::state::{MuteStateMachine, RememberedFilter};

use super::ControlCommand;

/// Capacity of the sensor event inbox
const INBOX_CAPACITY: usize = 64;

/// Lifecycle state of the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    #[default]
    Stopped,
    Starting,
    Running,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Stopped => write!(f, "Stopped"),
            ServiceState::Starting => write!(f, "Starting"),
            ServiceState::Running => write!(f, "Running"),
        }
    }
}

/// Errors reported by the scanning service
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("required {0} sensor is not present")]
    MissingHardware(SensorKind),

    #[error("notification policy access has not been granted")]
    PermissionDenied,

    #[error("host query failed: {0}")]
    HostQueryFailure(#[from] HostError),

    #[error("failed to register sensor listeners: {0}")]
    Registration(SensorSourceError),
}

impl ServiceError {
    /// Stable code reported to control surfaces
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::MissingHardware(_) => "missing_hardware",
            ServiceError::PermissionDenied => "permission_denied",
            ServiceError::HostQueryFailure(_) => "host_query_failure",
            ServiceError::Registration(_) => "registration_failed",
        }
    }
}

impl From<SensorSourceError> for ServiceError {
    fn from(e: SensorSourceError) -> Self {
        match e {
            SensorSourceError::NotPresent(kind) => ServiceError::MissingHardware(kind),
            other => ServiceError::Registration(other),
        }
    }
}

/// Host facilities the service is built from
#[derive(Clone)]
pub struct ServiceHandles {
    pub sensors: Arc<dyn SensorSource>,
    pub policy: Arc<dyn NotificationPolicy>,
    pub running_flag: Arc<dyn RunningFlagStore>,
    pub foreground: Arc<dyn ForegroundHost>,
}

/// The service that watches the sensors while scanning is on
pub struct ScanningService {
    state: ServiceState,
    sampler: SensorSampler,
    policy: Arc<dyn NotificationPolicy>,
    running_flag: Arc<dyn RunningFlagStore>,
    foreground: Arc<dyn ForegroundHost>,
    /// Channel for UI updates and mute transitions
    event_tx: broadcast::Sender<ServiceEvent>,
    /// Task draining the sensor inbox
    worker: Option<JoinHandle<()>>,
    /// Filter captured before the last mute; kept across stop and start
    remembered: RememberedFilter,
}

impl ScanningService {
    /// Create a stopped service
    pub fn new(handles: ServiceHandles, event_tx: broadcast::Sender<ServiceEvent>) -> Self {
        Self {
            state: ServiceState::Stopped,
            sampler: SensorSampler::new(handles.sensors),
            policy: handles.policy,
            running_flag: handles.running_flag,
            foreground: handles.foreground,
            event_tx,
            worker: None,
            remembered: RememberedFilter::default(),
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Persisted running flag, as a control surface would read it
    pub fn running_flag(&self) -> Result<bool, ServiceError> {
        Ok(self.running_flag.get()?)
    }

    /// Whether the host filter is currently NONE
    pub fn is_muted(&self) -> Result<bool, ServiceError> {
        Ok(self.policy.current_filter()? == InterruptionFilter::None)
    }

    /// Apply a control command
    pub fn handle_command(&mut self, command: ControlCommand) -> Result<(), ServiceError> {
        match command {
            ControlCommand::Start => self.start(),
            ControlCommand::Stop => {
                self.stop();
                Ok(())
            }
        }
    }

    /// Start scanning
    ///
    /// Fails without touching the running flag when a sensor is missing or
    /// notification policy access has not been granted. Must be called from
    /// within a tokio runtime.
    pub fn start(&mut self) -> Result<(), ServiceError> {
        if self.state == ServiceState::Running {
            info!("scanning already running");
            return Ok(());
        }

        self.state = ServiceState::Starting;

        if let Some(kind) = self.sampler.missing_sensor() {
            error!(%kind, "necessary hardware is not supported");
            self.state = ServiceState::Stopped;
            return Err(ServiceError::MissingHardware(kind));
        }

        if !self.policy.is_policy_access_granted() {
            warn!("notification policy access not granted");
            self.state = ServiceState::Stopped;
            return Err(ServiceError::PermissionDenied);
        }

        self.foreground.enter(&ForegroundNotice::default());
        self.persist_running(true);

        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let mut machine = MuteStateMachine::new(
            Arc::clone(&self.policy),
            Arc::clone(&self.remembered),
            self.event_tx.clone(),
        );
        let worker = tokio::spawn(async move {
            machine.run(inbox_rx).await;
        });

        if let Err(e) = self.sampler.register(inbox_tx) {
            error!(?e, "failed to register sensor listeners");
            worker.abort();
            self.foreground.exit();
            self.persist_running(false);
            self.state = ServiceState::Stopped;
            return Err(e.into());
        }

        self.worker = Some(worker);
        self.state = ServiceState::Running;

        info!(state = %self.state, "scanning started");
        let _ = self.event_tx.send(ServiceEvent::UiUpdate { is_stopped: false });

        Ok(())
    }

    /// Stop scanning on explicit request
    pub fn stop(&mut self) {
        info!(state = %self.state, "stopping scanning");

        self.persist_running(false);
        let _ = self.event_tx.send(ServiceEvent::UiUpdate { is_stopped: true });

        self.sampler.unregister();
        self.stop_worker();

        if self.state != ServiceState::Stopped {
            self.foreground.exit();
        }
        self.state = ServiceState::Stopped;
    }

    /// Best-effort cleanup when the process is being torn down
    ///
    /// Clears the running flag and unregisters listeners. The interruption
    /// filter is left as it is, so a mute active at this point stays on.
    pub fn destroy(&mut self) {
        if self.state == ServiceState::Stopped {
            return;
        }

        info!("scanning service destroyed");
        self.persist_running(false);
        self.sampler.unregister();
        self.stop_worker();
        self.state = ServiceState::Stopped;
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }

    fn persist_running(&self, running: bool) {
        if let Err(e) = self.running_flag.set(running) {
            warn!(?e, running, "failed to persist running flag");
        }
    }
}

impl Drop for ScanningService {
    fn drop(&mut self) {
        self.destroy();
    }
}
