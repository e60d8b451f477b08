//! Application layer: command, checkpoint, view and query handlers.

pub mod checkpoint_handlers;
pub mod command_handlers;
pub mod query_handlers;
pub mod view_handlers;
