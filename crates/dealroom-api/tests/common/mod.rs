#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, header};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use dealroom_api::notifier::Notifier;
use dealroom_api::router::build_router;
use dealroom_api::{AppState, AppStateInner};
use dealroom_core::{ManualClock, Workflow, WorkflowConfig};
use dealroom_db::Database;
use dealroom_types::api::Claims;
use dealroom_types::models::Role;

pub const SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
}

pub fn build_test_app() -> TestApp {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
    ));
    let state: AppState = Arc::new(AppStateInner {
        workflow: Workflow::new(db, clock.clone(), WorkflowConfig::default()),
        notifier: Notifier::new(),
        jwt_secret: SECRET.to_string(),
    });
    TestApp {
        router: build_router(state.clone()),
        state,
        clock,
    }
}

pub fn token_for(user_id: Uuid, role: Role) -> String {
    let claims = Claims {
        sub: user_id,
        role,
        exp: 4_102_444_800,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

/// A user id together with a token for it.
#[derive(Clone)]
pub struct User {
    pub id: Uuid,
    pub token: String,
}

impl User {
    pub fn new(role: Role) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            token: token_for(id, role),
        }
    }
}

pub async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    user: Option<&User>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", user.token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
