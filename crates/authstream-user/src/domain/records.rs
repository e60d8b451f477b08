//! Read records for the User identity context.

use authstream_core::container::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregates::UserEntity;

/// Field the view store is searched on.
pub const NORMALIZED_EMAIL_FIELD: &str = "normalizedEmail";

/// Read-only view of a user aggregate, as returned by handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// The user identifier.
    pub id: Uuid,
    /// Email address as supplied.
    pub email: String,
    /// Normalized email.
    pub normalized_email: String,
    /// Most recent sign-in.
    pub last_login: Option<DateTime<Utc>>,
    /// Most recent sign-out.
    pub last_logout: Option<DateTime<Utc>>,
    /// Sequence number the record reflects.
    pub at_sequence: i64,
    /// Actor of the creation event.
    pub created_by: String,
    /// Actor of the most recent event.
    pub updated_by: String,
    /// Timestamp of the creation event.
    pub created_utc: Option<DateTime<Utc>>,
    /// Timestamp of the most recent event.
    pub updated_utc: Option<DateTime<Utc>>,
}

impl From<&UserEntity> for UserRecord {
    fn from(user: &UserEntity) -> Self {
        let state = user.state();
        Self {
            id: user.id(),
            email: state.email().to_owned(),
            normalized_email: state.normalized_email().to_owned(),
            last_login: state.last_login(),
            last_logout: state.last_logout(),
            at_sequence: user.at_sequence(),
            created_by: user.created_by().to_owned(),
            updated_by: user.updated_by().to_owned(),
            created_utc: user.created_utc(),
            updated_utc: user.updated_utc(),
        }
    }
}

/// Denormalized by-email projection of a user checkpoint.
///
/// Never authoritative: when it disagrees with the checkpoint, the
/// checkpoint wins and the next view refresh overwrites this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserViewRecord {
    /// The user identifier.
    pub id: Uuid,
    /// Email address as supplied.
    pub email: String,
    /// Upper-cased, trimmed email for exact-match lookups.
    pub normalized_email: String,
    /// Most recent sign-in.
    pub last_login: Option<DateTime<Utc>>,
    /// Most recent sign-out.
    pub last_logout: Option<DateTime<Utc>>,
    /// Sequence number of the checkpoint this record was projected from.
    pub at_sequence: i64,
}

impl From<&UserEntity> for UserViewRecord {
    fn from(user: &UserEntity) -> Self {
        let state = user.state();
        Self {
            id: user.id(),
            email: state.email().to_owned(),
            normalized_email: state.normalized_email().to_owned(),
            last_login: state.last_login(),
            last_logout: state.last_logout(),
            at_sequence: user.at_sequence(),
        }
    }
}

impl Document for UserViewRecord {
    fn document_id(&self) -> Uuid {
        self.id
    }

    fn document_version(&self) -> i64 {
        self.at_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::new_user;
    use authstream_test_support::FixedClock;

    #[test]
    fn test_view_record_carries_normalized_email_field() {
        let user = new_user(Uuid::new_v4(), "Someone@Example.com", "", &FixedClock::default())
            .unwrap();

        let view = UserViewRecord::from(&user);
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json[NORMALIZED_EMAIL_FIELD], "SOMEONE@EXAMPLE.COM");
        assert_eq!(view.document_id(), user.id());
        assert_eq!(view.document_version(), 0);
    }

    #[test]
    fn test_user_record_copies_audit_fields() {
        let clock = FixedClock::default();
        let user = new_user(Uuid::new_v4(), "a@b.com", "signin", &clock).unwrap();

        let record = UserRecord::from(&user);

        assert_eq!(record.id, user.id());
        assert_eq!(record.created_by, "signin");
        assert_eq!(record.created_utc, Some(clock.0));
        assert_eq!(record.at_sequence, 0);
    }
}
