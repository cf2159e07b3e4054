//! IPC module for daemon-control surface communication

mod protocol;
mod server;

pub use server::Server;
