//! Domain events for the User identity context.

use authstream_core::error::DomainError;
use authstream_core::event::EventPayload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate kind and stream id prefix for users.
pub const USER_STREAM_TYPE: &str = "User";

/// Emitted once, at sequence 0, when a user is first seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreated {
    /// The user identifier.
    pub id: Uuid,
    /// Email address as supplied.
    pub email: String,
}

/// Emitted on every successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLoggedIn {
    /// Time of the sign-in.
    pub last_login_utc: DateTime<Utc>,
}

/// Emitted when a user signs out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLoggedOut {
    /// Time of the sign-out.
    pub last_logout_utc: DateTime<Utc>,
}

/// Event payload variants for the User identity context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEventKind {
    /// A user was created.
    Created(UserCreated),
    /// A user signed in.
    LoggedIn(UserLoggedIn),
    /// A user signed out.
    LoggedOut(UserLoggedOut),
}

const CREATED: &str = "user.created";
const LOGGED_IN: &str = "user.logged_in";
const LOGGED_OUT: &str = "user.logged_out";

impl EventPayload for UserEventKind {
    fn payload_type(&self) -> &'static str {
        match self {
            Self::Created(_) => CREATED,
            Self::LoggedIn(_) => LOGGED_IN,
            Self::LoggedOut(_) => LOGGED_OUT,
        }
    }

    fn encode(&self) -> Result<serde_json::Value, DomainError> {
        let value = match self {
            Self::Created(payload) => serde_json::to_value(payload)?,
            Self::LoggedIn(payload) => serde_json::to_value(payload)?,
            Self::LoggedOut(payload) => serde_json::to_value(payload)?,
        };
        Ok(value)
    }

    fn decode(payload_type: &str, payload: serde_json::Value) -> Result<Self, DomainError> {
        match payload_type {
            CREATED => Ok(Self::Created(serde_json::from_value(payload)?)),
            LOGGED_IN => Ok(Self::LoggedIn(serde_json::from_value(payload)?)),
            LOGGED_OUT => Ok(Self::LoggedOut(serde_json::from_value(payload)?)),
            other => Err(DomainError::UnrecognizedEvent {
                stream_type: USER_STREAM_TYPE.to_owned(),
                payload_type: other.to_owned(),
            }),
        }
    }
}
