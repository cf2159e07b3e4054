//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::ServiceEvent;
use crate::service::{ControlCommand, ServiceState};

/// Requests from a control surface to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Start or stop scanning
    Command { command: ControlCommand },

    /// Ping to check connectivity
    Ping,

    /// Subscribe to service event notifications
    Subscribe,
}

/// Responses from daemon to a control surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Command applied
    CommandAccepted { running: bool },

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    ServiceEvent(ServiceEvent),
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Lifecycle state of the scanning service
    pub state: ServiceState,

    /// Persisted running flag, used to initialise a toggle
    pub running: bool,

    /// Whether the host filter is NONE; absent when it could not be read
    pub muted: Option<bool>,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: ServiceState::default(),
            running: false,
            muted: None,
            uptime_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::Command {
            command: ControlCommand::Start,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"type":"command","command":"start-scanning"}"#);
    }

    #[test]
    fn test_request_deserialization() {
        let req: Request = serde_json::from_str(r#"{"type":"get_status"}"#).unwrap();
        assert!(matches!(req, Request::GetStatus));
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"type\":\"status\""));
        assert!(json.contains("\"state\":\"stopped\""));
    }

    #[test]
    fn test_notification_wraps_event() {
        let note = Notification::ServiceEvent(ServiceEvent::UiUpdate { is_stopped: true });
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["type"], "service_event");
    }
}
