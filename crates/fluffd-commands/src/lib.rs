//! Furby command system.
//!
//! Provides:
//! - Tagged request parameters and their coercion rules
//! - Typed commands and their frame encodings
//! - The command registry with categories and shortcuts
//! - Action dispatch against a single connection
//! - DLC file transfer
//! - Targeted and broadcast routing across connected devices

pub mod catalog;
pub mod command;
pub mod dispatcher;
pub mod error;
pub mod flash;
pub mod params;
pub mod registry;
pub mod router;

pub use catalog::OTHER_CATEGORY;
pub use command::{CommandKind, DirectCommand, Effect, Frame};
pub use dispatcher::ActionDispatcher;
pub use error::{CommandError, Result};
pub use flash::{flash_dlc, prepare_frame, FlashReport};
pub use params::{ParamValue, Params};
pub use registry::{
    Category, Command, CommandRegistry, CommandSpec, ParamSchema, Resolved, Shortcut,
};
pub use router::{BroadcastSummary, CommandRouter, DispatchError, DispatchOutcome};
