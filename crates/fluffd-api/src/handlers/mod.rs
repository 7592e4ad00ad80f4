//! Request handlers.

pub mod basic;
pub mod commands;
pub mod devices;

pub use crate::server::ServerState;
