//! Authstream: User identity bounded context.
//!
//! Responsible for creating users, recording sign-ins and sign-outs, and
//! keeping the user checkpoint and by-email view in step with the event log.

pub mod application;
pub mod domain;
