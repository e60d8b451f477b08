//! Authstream Core: event-sourcing abstractions.
//!
//! Defines the event envelope, the aggregate fold, the event and document
//! store traits, the checkpoint protocol and the command pipeline that ties
//! them together. It contains no infrastructure code.

pub mod aggregate;
pub mod checkpoint;
pub mod clock;
pub mod command;
pub mod container;
pub mod error;
pub mod event;
pub mod notify;
pub mod pipeline;
pub mod repository;

#[cfg(test)]
mod test_doubles;
