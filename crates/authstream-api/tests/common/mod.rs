//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use authstream_core::clock::Clock;
use authstream_core::repository::EventRepository;
use authstream_test_support::{
    FixedClock, InMemoryCheckpointRepository, InMemoryContainerRepository,
    InMemoryEventRepository, RecordingNotifier,
};
use authstream_user::domain::aggregates::User;
use authstream_user::domain::records::UserViewRecord;
use tower::ServiceExt;

use authstream_api::config::JwtConfig;
use authstream_api::directory::{DirectoryAuthenticator, DirectoryOutcome, DisabledDirectory};
use authstream_api::state::AppState;
use authstream_api::token::{Claims, JwtTokenProvider};

/// Directory that accepts every credential.
pub struct AcceptingDirectory;

#[async_trait]
impl DirectoryAuthenticator for AcceptingDirectory {
    async fn check(&self, _email: &str, _secret: &str) -> DirectoryOutcome {
        DirectoryOutcome::Success
    }
}

/// In-memory application with handles on every store.
pub struct TestApp {
    pub state: AppState,
    pub events: Arc<InMemoryEventRepository>,
    pub checkpoints: Arc<InMemoryCheckpointRepository<User>>,
    pub views: Arc<InMemoryContainerRepository<UserViewRecord>>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_directory(Arc::new(DisabledDirectory))
    }

    pub fn with_directory(directory: Arc<dyn DirectoryAuthenticator>) -> Self {
        let events = Arc::new(InMemoryEventRepository::new());
        Self::build(events.clone(), events, directory)
    }

    /// Builds an app whose health probe and reads go to `event_repository`.
    pub fn with_event_repository(event_repository: Arc<dyn EventRepository>) -> Self {
        let events = Arc::new(InMemoryEventRepository::new());
        Self::build(events, event_repository, Arc::new(DisabledDirectory))
    }

    fn build(
        events: Arc<InMemoryEventRepository>,
        event_repository: Arc<dyn EventRepository>,
        directory: Arc<dyn DirectoryAuthenticator>,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::default());
        let checkpoints = Arc::new(InMemoryCheckpointRepository::<User>::new(
            event_repository.clone(),
        ));
        let views = Arc::new(InMemoryContainerRepository::<UserViewRecord>::new(
            "User-view",
        ));
        let notifier = Arc::new(RecordingNotifier::default());
        let tokens = Arc::new(JwtTokenProvider::new(&jwt_config(), clock.clone()));

        let state = AppState::new(
            clock,
            event_repository,
            checkpoints.clone(),
            views.clone(),
            notifier.clone(),
            tokens,
            directory,
        );

        Self {
            state,
            events,
            checkpoints,
            views,
            notifier,
        }
    }

    pub fn router(&self) -> Router {
        authstream_api::app(self.state.clone())
    }

    /// Signs in as a shopper and returns the token and its claims.
    pub async fn sign_in(&self, email: &str) -> (String, Claims) {
        let (status, json) = send(
            self.router(),
            post_json(
                "/api/v1/auth/shopper/signin",
                &serde_json::json!({ "email": email }),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "sign-in failed: {json}");
        let token = json["access_token"].as_str().unwrap().to_owned();
        let claims = self.state.tokens.validate(&token).unwrap();
        (token, claims)
    }
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        key: "0123456789abcdef0123456789abcdef".to_owned(),
        issuer: "authstream".to_owned(),
        audience: "authstream-clients".to_owned(),
        ttl_minutes: 60,
    }
}

/// Build a POST request with a JSON body and an optional bearer token.
pub fn post_json(uri: &str, body: &serde_json::Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Build a GET request with an optional bearer token.
pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Send a request and return the status with the JSON body (`Null` when empty).
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}
