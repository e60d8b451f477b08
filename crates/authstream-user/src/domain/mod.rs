//! Domain layer: events, aggregate state, commands and read records.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod records;
