//! End-to-end session tests: file store, real HTTP client, local token
//! endpoint.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Form, Json, Router};
use clinic_session_application::{SessionManager, SessionSettings};
use clinic_session_domain::{SessionEvent, SessionPhase};
use clinic_session_infrastructure::{FileTokenStore, ReqwestIdentityClient, SystemClock};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;
use url::Url;

type Grants = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn issue(
    State(grants): State<Grants>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let n = {
        let mut grants = grants.lock().unwrap();
        grants.push(form);
        grants.len()
    };
    Json(json!({
        "access_token": format!("access-{n}"),
        "refresh_token": format!("refresh-{n}"),
        "expires_in": 300,
        "refresh_expires_in": 1800
    }))
}

async fn token_endpoint() -> (Url, Grants) {
    let grants = Grants::default();
    let router = Router::new()
        .route("/token", post(issue))
        .with_state(Arc::clone(&grants));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (Url::parse(&format!("http://{addr}/token")).unwrap(), grants)
}

async fn start(url: &Url, dir: &Path) -> SessionManager {
    SessionManager::start(
        Arc::new(FileTokenStore::new(dir)),
        Arc::new(
            ReqwestIdentityClient::new(url.clone(), "dashboard", "s3cret", Duration::from_secs(5))
                .unwrap(),
        ),
        Arc::new(SystemClock::new()),
        SessionSettings::default(),
    )
    .await
}

#[tokio::test]
async fn session_survives_restart() {
    let (url, grants) = token_endpoint().await;
    let dir = tempdir().unwrap();

    let first = start(&url, dir.path()).await;
    assert_eq!(first.phase(), SessionPhase::LoggedOut);
    assert_eq!(first.ensure_authenticated().await.unwrap(), "access-1");
    drop(first);

    let second = start(&url, dir.path()).await;
    assert_eq!(second.phase(), SessionPhase::RefreshScheduled);
    assert!(!second.is_token_expired());
    assert_eq!(second.ensure_authenticated().await.unwrap(), "access-1");
    assert_eq!(
        second.bearer_header().await.unwrap(),
        "Bearer access-1"
    );
    assert_eq!(grants.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn logout_clears_disk_for_the_next_start() {
    let (url, _grants) = token_endpoint().await;
    let dir = tempdir().unwrap();

    let manager = start(&url, dir.path()).await;
    manager.authenticate().await.unwrap();
    manager
        .cache_profile(&json!({"roles": ["receptionist"]}))
        .await
        .unwrap();
    assert!(dir.path().join("session.json").exists());
    assert!(dir.path().join("profile.json").exists());

    manager.logout().await;
    assert!(manager.get_token().is_none());
    assert!(!dir.path().join("session.json").exists());
    assert!(!dir.path().join("profile.json").exists());

    let restarted = start(&url, dir.path()).await;
    assert_eq!(restarted.phase(), SessionPhase::LoggedOut);
    assert!(restarted.get_token().is_none());
}

#[tokio::test]
async fn session_without_expiry_is_refreshed_on_start() {
    let (url, grants) = token_endpoint().await;
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("session.json"),
        r#"{"access_token": "legacy-access", "refresh_token": "legacy-refresh"}"#,
    )
    .unwrap();

    let manager = start(&url, dir.path()).await;
    let mut events = manager.subscribe();
    assert!(manager.is_token_expired());

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("refresh should complete")
        .unwrap();

    assert!(matches!(event, SessionEvent::Refreshed { .. }));
    assert_eq!(manager.ensure_authenticated().await.unwrap(), "access-1");
    let grants = grants.lock().unwrap();
    assert_eq!(grants[0]["grant_type"], "refresh_token");
    assert_eq!(grants[0]["refresh_token"], "legacy-refresh");
}
