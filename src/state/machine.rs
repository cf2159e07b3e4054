//! Core mute state machine implementation
//!
//! Combines the face-down and covered conditions into a mute decision and
//! drives the host interruption filter between NONE and the filter that was
//! active before muting.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::events::ServiceEvent;
use crate::host::{InterruptionFilter, NotificationPolicy};
use crate::sensors::{is_covered, is_face_down, SensorEvent, SensorReading};

/// The two sensor-derived conditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditionState {
    /// Device lies face-down
    pub accelerometer: bool,
    /// Something covers the proximity sensor
    pub proximity: bool,
}

impl ConditionState {
    /// Update the condition matching the reading
    pub fn apply(&mut self, reading: SensorReading) {
        match reading {
            SensorReading::Accelerometer(z) => self.accelerometer = is_face_down(z),
            SensorReading::Proximity(distance) => self.proximity = is_covered(distance),
        }
    }

    pub fn should_mute(&self) -> bool {
        self.accelerometer && self.proximity
    }
}

/// Whether this machine currently holds the device muted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MuteState {
    #[default]
    Unmuted,
    /// Muted; holds the filter to restore
    Muted(InterruptionFilter),
}

impl std::fmt::Display for MuteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MuteState::Unmuted => write!(f, "Unmuted"),
            MuteState::Muted(filter) => write!(f, "Muted({})", filter),
        }
    }
}

/// Filter to restore on unmute, shared by every run of one service
///
/// Outlives a single machine so a mute that spans a stop and a restart is
/// released back to the filter captured before it.
pub type RememberedFilter = Arc<Mutex<InterruptionFilter>>;

/// The state machine that owns the conditions for one service run
pub struct MuteStateMachine {
    conditions: ConditionState,
    state: MuteState,
    /// Filter to restore on unmute; ALL until the first mute
    remembered: RememberedFilter,
    /// Time when the current mute began
    muted_at: Option<Instant>,
    policy: Arc<dyn NotificationPolicy>,
    /// Channel for emitting mute transitions
    event_tx: broadcast::Sender<ServiceEvent>,
}

impl MuteStateMachine {
    /// Create a new state machine
    pub fn new(
        policy: Arc<dyn NotificationPolicy>,
        remembered: RememberedFilter,
        event_tx: broadcast::Sender<ServiceEvent>,
    ) -> Self {
        Self {
            conditions: ConditionState::default(),
            state: MuteState::Unmuted,
            remembered,
            muted_at: None,
            policy,
            event_tx,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> MuteState {
        self.state
    }

    #[cfg(test)]
    pub fn conditions(&self) -> ConditionState {
        self.conditions
    }

    pub fn remembered(&self) -> InterruptionFilter {
        *self.remembered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the state machine, processing sensor events one at a time
    pub async fn run(&mut self, mut inbox: mpsc::Receiver<SensorEvent>) {
        info!("mute state machine started");

        while let Some(event) = inbox.recv().await {
            self.handle_event(&event);
        }

        info!(state = %self.state, "mute state machine stopped");
    }

    /// Classify one event, update its condition and re-evaluate
    pub fn handle_event(&mut self, event: &SensorEvent) {
        let Some(reading) = SensorReading::classify(event) else {
            return;
        };

        self.conditions.apply(reading);
        debug!(
            accelerometer = self.conditions.accelerometer,
            proximity = self.conditions.proximity,
            "conditions updated"
        );

        self.evaluate();
    }

    /// Compare the conditions against the host filter and transition
    ///
    /// The muted check reads the host rather than `self.state`, so a fresh
    /// machine picks up a mute left behind by a previous process.
    fn evaluate(&mut self) {
        let current = match self.policy.current_filter() {
            Ok(filter) => filter,
            Err(e) => {
                warn!(?e, "failed to read interruption filter, skipping transition");
                return;
            }
        };

        if self.conditions.should_mute() {
            if current != InterruptionFilter::None {
                self.mute(current);
            }
        } else if current == InterruptionFilter::None {
            self.unmute();
        }
    }

    fn mute(&mut self, previous: InterruptionFilter) {
        info!(%previous, "turning on mute mode");

        if let Err(e) = self.policy.set_filter(InterruptionFilter::None) {
            warn!(?e, "failed to set interruption filter, skipping transition");
            return;
        }

        *self.remembered.lock().unwrap_or_else(PoisonError::into_inner) = previous;
        self.state = MuteState::Muted(previous);
        self.muted_at = Some(Instant::now());

        let _ = self.event_tx.send(ServiceEvent::MuteEngaged { previous });
    }

    fn unmute(&mut self) {
        let restored = self.remembered();
        let duration_ms = self
            .muted_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        info!(%restored, duration_ms, "turning off mute mode");

        if let Err(e) = self.policy.set_filter(restored) {
            warn!(?e, "failed to restore interruption filter, skipping transition");
            return;
        }

        self.state = MuteState::Unmuted;
        self.muted_at = None;

        let _ = self.event_tx.send(ServiceEvent::MuteReleased { restored });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryPolicy;
    use proptest::prelude::*;

    fn create_state_machine(
        filter: InterruptionFilter,
    ) -> (MuteStateMachine, Arc<MemoryPolicy>, broadcast::Receiver<ServiceEvent>) {
        let policy = Arc::new(MemoryPolicy::new(filter));
        let (tx, rx) = broadcast::channel(16);
        let remembered = RememberedFilter::default();
        (MuteStateMachine::new(policy.clone(), remembered, tx), policy, rx)
    }

    fn face_down_and_covered(sm: &mut MuteStateMachine) {
        sm.handle_event(&SensorEvent::accelerometer(-9.5));
        sm.handle_event(&SensorEvent::proximity(0.0));
    }

    #[test]
    fn test_initial_state() {
        let (sm, _, _) = create_state_machine(InterruptionFilter::All);
        assert_eq!(sm.state(), MuteState::Unmuted);
        assert_eq!(sm.conditions(), ConditionState::default());
        assert_eq!(sm.remembered(), InterruptionFilter::All);
    }

    #[test]
    fn test_single_condition_does_not_mute() {
        let (mut sm, policy, _) = create_state_machine(InterruptionFilter::All);

        sm.handle_event(&SensorEvent::accelerometer(-9.5));
        assert_eq!(policy.filter(), InterruptionFilter::All);

        sm.handle_event(&SensorEvent::accelerometer(9.8));
        sm.handle_event(&SensorEvent::proximity(0.0));
        assert_eq!(policy.filter(), InterruptionFilter::All);
        assert!(policy.writes().is_empty());
    }

    #[test]
    fn test_face_down_and_covered_mutes() {
        let (mut sm, policy, mut rx) = create_state_machine(InterruptionFilter::All);

        face_down_and_covered(&mut sm);

        assert_eq!(policy.filter(), InterruptionFilter::None);
        assert_eq!(sm.state(), MuteState::Muted(InterruptionFilter::All));
        assert_eq!(sm.remembered(), InterruptionFilter::All);
        assert_eq!(
            rx.try_recv().unwrap(),
            ServiceEvent::MuteEngaged {
                previous: InterruptionFilter::All
            }
        );
    }

    #[test]
    fn test_uncovering_restores_previous_filter() {
        let (mut sm, policy, _) = create_state_machine(InterruptionFilter::All);

        face_down_and_covered(&mut sm);
        sm.handle_event(&SensorEvent::accelerometer(-9.5));
        sm.handle_event(&SensorEvent::proximity(5.0));

        assert_eq!(policy.filter(), InterruptionFilter::All);
        assert_eq!(sm.state(), MuteState::Unmuted);
        assert_eq!(
            policy.writes(),
            vec![InterruptionFilter::None, InterruptionFilter::All]
        );
    }

    #[test]
    fn test_restores_exact_non_default_filter() {
        let (mut sm, policy, mut rx) = create_state_machine(InterruptionFilter::Alarms);

        face_down_and_covered(&mut sm);
        sm.handle_event(&SensorEvent::accelerometer(0.0));

        assert_eq!(policy.filter(), InterruptionFilter::Alarms);
        let _engaged = rx.try_recv().unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            ServiceEvent::MuteReleased {
                restored: InterruptionFilter::Alarms
            }
        );
    }

    #[test]
    fn test_repeated_trigger_is_idempotent() {
        let (mut sm, policy, _) = create_state_machine(InterruptionFilter::Priority);

        face_down_and_covered(&mut sm);
        face_down_and_covered(&mut sm);
        sm.handle_event(&SensorEvent::proximity(0.0));

        assert_eq!(policy.writes(), vec![InterruptionFilter::None]);
        assert_eq!(sm.remembered(), InterruptionFilter::Priority);
    }

    #[test]
    fn test_recovers_mute_left_by_previous_process() {
        // A new machine finds the host muted with nothing remembered.
        let (mut sm, policy, _) = create_state_machine(InterruptionFilter::None);

        sm.handle_event(&SensorEvent::proximity(5.0));

        assert_eq!(policy.filter(), InterruptionFilter::All);
    }

    #[test]
    fn test_next_machine_releases_to_shared_remembered_filter() {
        let policy = Arc::new(MemoryPolicy::new(InterruptionFilter::Priority));
        let (tx, _rx) = broadcast::channel(16);
        let remembered = RememberedFilter::default();

        let mut first = MuteStateMachine::new(policy.clone(), remembered.clone(), tx.clone());
        face_down_and_covered(&mut first);
        assert_eq!(policy.filter(), InterruptionFilter::None);
        drop(first);

        let mut second = MuteStateMachine::new(policy.clone(), remembered, tx);
        assert_eq!(second.remembered(), InterruptionFilter::Priority);
        second.handle_event(&SensorEvent::proximity(5.0));

        assert_eq!(policy.filter(), InterruptionFilter::Priority);
        assert_eq!(second.state(), MuteState::Unmuted);
    }

    #[test]
    fn test_ignores_unknown_sensor() {
        let (mut sm, policy, _) = create_state_machine(InterruptionFilter::None);

        sm.handle_event(&SensorEvent::new(crate::sensors::SensorKind::Other(9), [0.0]));

        assert_eq!(policy.filter(), InterruptionFilter::None);
        assert!(policy.writes().is_empty());
    }

    #[test]
    fn test_read_failure_skips_transition() {
        let (mut sm, policy, _) = create_state_machine(InterruptionFilter::All);
        policy.fail_reads(true);

        face_down_and_covered(&mut sm);
        assert!(policy.writes().is_empty());
        assert_eq!(sm.state(), MuteState::Unmuted);

        // The next event after recovery re-evaluates.
        policy.fail_reads(false);
        sm.handle_event(&SensorEvent::proximity(0.0));
        assert_eq!(policy.filter(), InterruptionFilter::None);
    }

    #[test]
    fn test_write_failure_keeps_remembered_filter() {
        let (mut sm, policy, _) = create_state_machine(InterruptionFilter::Priority);
        face_down_and_covered(&mut sm);

        policy.set_external(InterruptionFilter::Alarms);
        policy.fail_writes(true);
        sm.handle_event(&SensorEvent::proximity(5.0));
        sm.handle_event(&SensorEvent::proximity(0.0));

        assert_eq!(sm.remembered(), InterruptionFilter::Priority);
        assert_eq!(sm.state(), MuteState::Muted(InterruptionFilter::Priority));
    }

    #[tokio::test]
    async fn test_run_drains_inbox() {
        let (mut sm, policy, _) = create_state_machine(InterruptionFilter::All);
        let (tx, rx) = mpsc::channel(8);

        tx.send(SensorEvent::accelerometer(-9.2)).await.unwrap();
        tx.send(SensorEvent::proximity(0.0)).await.unwrap();
        drop(tx);

        sm.run(rx).await;
        assert_eq!(policy.filter(), InterruptionFilter::None);
    }

    fn any_filter() -> impl Strategy<Value = InterruptionFilter> {
        prop_oneof![
            Just(InterruptionFilter::All),
            Just(InterruptionFilter::Priority),
            Just(InterruptionFilter::Alarms),
        ]
    }

    proptest! {
        #[test]
        fn mute_then_release_restores_prior(
            prior in any_filter(),
            z in -10.0f32..=-9.0,
            release_distance in 0.5f32..10.0,
        ) {
            let (mut sm, policy, _) = create_state_machine(prior);

            sm.handle_event(&SensorEvent::accelerometer(z));
            sm.handle_event(&SensorEvent::proximity(0.0));
            prop_assert_eq!(policy.filter(), InterruptionFilter::None);
            prop_assert_eq!(sm.remembered(), prior);

            sm.handle_event(&SensorEvent::proximity(release_distance));
            prop_assert_eq!(policy.filter(), prior);
        }
    }
}
