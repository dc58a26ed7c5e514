//! IPC module for front-end communication

mod protocol;
mod server;

pub use protocol::{AssistantStatus, Menu, MenuEntry, Notification, Request, Response};
pub use server::Server;
