//! State machine module for mute management
//!
//! Provides an explicit two-state machine:
//! - Unmuted: the host filter is left alone
//! - Muted: the host filter is NONE and the previous filter is remembered

mod machine;

pub use machine::{MuteStateMachine, RememberedFilter};
