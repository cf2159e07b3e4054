//! Events module for the UI broadcast channel
//!
//! Carries lifecycle updates for control surfaces and the mute transitions
//! applied by the state machine.

use serde::{Deserialize, Serialize};

use crate::host::InterruptionFilter;

/// Events broadcast by the service and the state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServiceEvent {
    /// Scanning started or stopped; control surfaces refresh their toggle
    UiUpdate {
        #[serde(rename = "isStopped")]
        is_stopped: bool,
    },

    /// Filter switched to NONE
    MuteEngaged {
        /// Filter active right before muting
        previous: InterruptionFilter,
    },

    /// Filter restored after the device was picked up
    MuteReleased {
        restored: InterruptionFilter,
    },
}

impl std::fmt::Display for ServiceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceEvent::UiUpdate { is_stopped } => {
                write!(f, "UI_UPDATE (stopped={})", is_stopped)
            }
            ServiceEvent::MuteEngaged { previous } => {
                write!(f, "MUTE_ENGAGED (was {})", previous)
            }
            ServiceEvent::MuteReleased { restored } => {
                write!(f, "MUTE_RELEASED (back to {})", restored)
            }
        }
    }
}
