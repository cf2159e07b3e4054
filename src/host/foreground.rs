//! Foreground mode: the persistent notice shown while scanning

use tracing::info;

use crate::service::ControlCommand;

/// Contents of the ongoing notice posted in foreground mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundNotice {
    pub title: String,
    pub text: String,
    /// Label of the notice's action button
    pub action_label: String,
    /// Command sent when the action is taken
    pub action: ControlCommand,
}

impl Default for ForegroundNotice {
    fn default() -> Self {
        Self {
            title: "Proximity Scanner".to_string(),
            text: "Quiet mode turns on while the device lies face-down".to_string(),
            action_label: "Turn off".to_string(),
            action: ControlCommand::Stop,
        }
    }
}

/// Host facility keeping the service alive while it scans
pub trait ForegroundHost: Send + Sync {
    fn enter(&self, notice: &ForegroundNotice);

    fn exit(&self);
}

/// Posts the notice to the log; a daemon has no process killer to appease
#[derive(Debug, Default)]
pub struct LogForeground;

impl ForegroundHost for LogForeground {
    fn enter(&self, notice: &ForegroundNotice) {
        info!(
            title = %notice.title,
            text = %notice.text,
            action = %notice.action,
            action_label = %notice.action_label,
            "entered foreground mode"
        );
    }

    fn exit(&self) {
        info!("left foreground mode");
    }
}
