//! Control commands accepted by the scanning service

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The two commands a control surface can send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlCommand {
    #[serde(rename = "start-scanning")]
    Start,
    #[serde(rename = "stop-scanning")]
    Stop,
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlCommand::Start => write!(f, "start-scanning"),
            ControlCommand::Stop => write!(f, "stop-scanning"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown command {0:?}, expected start-scanning or stop-scanning")]
pub struct UnknownCommand(pub String);

impl FromStr for ControlCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "start-scanning" => Ok(ControlCommand::Start),
            "stop-scanning" => Ok(ControlCommand::Stop),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}
