//! Aggregate roots for the User identity context.

use authstream_core::aggregate::{Aggregate, AggregateState};
use authstream_core::clock::Clock;
use authstream_core::error::DomainError;
use authstream_core::event::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{USER_STREAM_TYPE, UserCreated, UserEventKind, UserLoggedIn, UserLoggedOut};

/// Folded state of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Email address as supplied at creation.
    pub(crate) email: String,
    /// Trimmed, upper-cased email used for exact-match lookups.
    pub(crate) normalized_email: String,
    /// Most recent sign-in.
    pub(crate) last_login: Option<DateTime<Utc>>,
    /// Most recent sign-out.
    pub(crate) last_logout: Option<DateTime<Utc>>,
}

/// A user aggregate: [`User`] state plus stream bookkeeping.
pub type UserEntity = Aggregate<User>;

impl User {
    /// Email address as supplied at creation.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Normalized email.
    #[must_use]
    pub fn normalized_email(&self) -> &str {
        &self.normalized_email
    }

    /// Most recent sign-in.
    #[must_use]
    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.last_login
    }

    /// Most recent sign-out.
    #[must_use]
    pub fn last_logout(&self) -> Option<DateTime<Utc>> {
        self.last_logout
    }
}

impl AggregateState for User {
    type Payload = UserEventKind;
    const STREAM_TYPE: &'static str = USER_STREAM_TYPE;

    fn creation_id(payload: &Self::Payload) -> Option<Uuid> {
        match payload {
            UserEventKind::Created(created) => Some(created.id),
            UserEventKind::LoggedIn(_) | UserEventKind::LoggedOut(_) => None,
        }
    }

    fn when(&mut self, event: &Event<Self::Payload>) {
        match &event.payload {
            UserEventKind::Created(created) => {
                self.email.clone_from(&created.email);
                self.normalized_email = normalize_email(&created.email);
                self.last_login = Some(event.metadata.created_utc);
            }
            UserEventKind::LoggedIn(logged_in) => {
                self.last_login = Some(logged_in.last_login_utc);
            }
            UserEventKind::LoggedOut(logged_out) => {
                self.last_logout = Some(logged_out.last_logout_utc);
            }
        }
    }
}

/// Canonical lookup form of an email address: trimmed and upper-cased.
///
/// Applied when a user is created and to every email lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_uppercase()
}

/// Builds a new user aggregate by synthesizing its creation event.
///
/// # Errors
///
/// Returns `DomainError::InvalidTransition` if `id` is nil.
pub fn new_user(
    id: Uuid,
    email: &str,
    created_by: &str,
    clock: &dyn Clock,
) -> Result<UserEntity, DomainError> {
    if id.is_nil() {
        return Err(DomainError::InvalidTransition(
            "a user cannot be created with a nil id".to_owned(),
        ));
    }
    let mut user = UserEntity::new();
    user.apply(
        UserEventKind::Created(UserCreated {
            id,
            email: email.to_owned(),
        }),
        created_by,
        clock,
    )?;
    Ok(user)
}

/// Payload recording a sign-in at the clock's current time.
#[must_use]
pub fn login(clock: &dyn Clock) -> UserEventKind {
    UserEventKind::LoggedIn(UserLoggedIn {
        last_login_utc: clock.now(),
    })
}

/// Payload recording a sign-out at the clock's current time.
#[must_use]
pub fn logout(clock: &dyn Clock) -> UserEventKind {
    UserEventKind::LoggedOut(UserLoggedOut {
        last_logout_utc: clock.now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use authstream_core::event::EventStream;
    use authstream_test_support::{FixedClock, fixed_time};
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_new_user_produces_creation_event_at_sequence_zero() {
        // Arrange
        let id = Uuid::new_v4();
        let clock = FixedClock::default();

        // Act
        let user = new_user(id, "a@b.com", "signin", &clock).unwrap();

        // Assert
        assert_eq!(user.id(), id);
        assert_eq!(user.stream_id(), format!("User-{id}"));
        assert_eq!(user.at_sequence(), 0);
        assert_eq!(user.events_count(), 1);
        assert_eq!(user.state().email(), "a@b.com");
        assert_eq!(user.state().normalized_email(), "A@B.COM");
        assert_eq!(user.state().last_login(), Some(fixed_time()));
        assert_eq!(user.state().last_logout(), None);
        assert_eq!(user.created_by(), "signin");
        assert_eq!(user.updated_utc(), Some(fixed_time()));
    }

    #[test]
    fn test_new_user_rejects_nil_id() {
        let result = new_user(Uuid::nil(), "a@b.com", "", &FixedClock::default());

        assert!(matches!(result, Err(DomainError::InvalidTransition(_))));
    }

    #[test]
    fn test_login_then_logout_updates_only_owned_fields() {
        // Arrange
        let created_at = fixed_time();
        let mut user = new_user(Uuid::new_v4(), "x@y.org", "", &FixedClock(created_at)).unwrap();
        let login_clock = FixedClock(created_at + Duration::minutes(5));
        let logout_clock = FixedClock(created_at + Duration::minutes(30));

        // Act
        user.apply(login(&login_clock), "api", &login_clock).unwrap();
        user.apply(logout(&logout_clock), "api", &logout_clock).unwrap();

        // Assert
        assert_eq!(user.at_sequence(), 2);
        assert_eq!(user.state().last_login(), Some(login_clock.0));
        assert_eq!(user.state().last_logout(), Some(logout_clock.0));
        assert_eq!(user.state().email(), "x@y.org");
        assert_eq!(user.updated_by(), "api");
        assert_eq!(user.created_utc(), Some(created_at));
        assert_eq!(user.updated_utc(), Some(logout_clock.0));
    }

    #[test]
    fn test_login_before_creation_is_rejected() {
        let clock = FixedClock::default();
        let mut user = UserEntity::new();

        let result = user.apply(login(&clock), "", &clock);

        assert!(matches!(result, Err(DomainError::InvalidTransition(_))));
        assert!(user.id().is_nil());
    }

    #[test]
    fn test_replay_from_checkpoint_snapshot_matches_full_replay() {
        // Arrange
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap());
        let mut user = new_user(Uuid::new_v4(), " Mixed@Case.io ", "", &clock).unwrap();
        user.apply(login(&clock), "", &clock).unwrap();
        let stored = user.stored_events_from(0).unwrap();

        // Act
        let replayed = UserEntity::from_stream(&EventStream::new(user.stream_id(), stored)).unwrap();
        let snapshot: UserEntity =
            serde_json::from_value(serde_json::to_value(&replayed).unwrap()).unwrap();

        // Assert
        assert_eq!(replayed.state(), user.state());
        assert_eq!(snapshot.state(), user.state());
        assert_eq!(snapshot.at_sequence(), 1);
        assert_eq!(snapshot.state().normalized_email(), "MIXED@CASE.IO");
    }

    #[test]
    fn test_normalize_email_trims_and_uppercases() {
        assert_eq!(normalize_email("  a@b.com\t"), "A@B.COM");
        assert_eq!(normalize_email("A@B.COM"), "A@B.COM");
    }
}
