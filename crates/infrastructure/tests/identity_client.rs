//! `ReqwestIdentityClient` against a local token endpoint.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Form, Json, Router};
use clinic_session_application::ports::IdentityClient;
use clinic_session_domain::{Credential, ExchangeFailure, TokenGrant};
use clinic_session_infrastructure::{ReqwestIdentityClient, SessionConfig};
use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;

type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn serve(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/token")).unwrap()
}

fn client(url: Url, timeout: Duration) -> ReqwestIdentityClient {
    ReqwestIdentityClient::new(url, "dashboard", "s3cret", timeout).unwrap()
}

async fn issue(
    State(seen): State<Seen>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    seen.lock().unwrap().push(form);
    Json(json!({
        "access_token": "issued-access",
        "refresh_token": "issued-refresh",
        "token_type": "Bearer",
        "expires_in": 300,
        "refresh_expires_in": 1800,
        "scope": "openid"
    }))
}

#[tokio::test]
async fn client_credentials_grant_succeeds() {
    let seen = Seen::default();
    let url = serve(
        Router::new()
            .route("/token", post(issue))
            .with_state(Arc::clone(&seen)),
    )
    .await;

    let issued = client(url, Duration::from_secs(5))
        .exchange(&TokenGrant::ClientCredentials)
        .await
        .unwrap();

    assert_eq!(
        issued.credential,
        Credential::new("issued-access", "issued-refresh")
    );
    assert_eq!(issued.expires_in, 300);
    assert_eq!(issued.refresh_expires_in, 1800);

    let requests = seen.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["grant_type"], "client_credentials");
    assert_eq!(requests[0]["client_id"], "dashboard");
    assert_eq!(requests[0]["client_secret"], "s3cret");
}

#[tokio::test]
async fn refresh_grant_sends_refresh_token() {
    let seen = Seen::default();
    let url = serve(
        Router::new()
            .route("/token", post(issue))
            .with_state(Arc::clone(&seen)),
    )
    .await;

    client(url, Duration::from_secs(5))
        .exchange(&TokenGrant::RefreshToken("old-refresh".to_string()))
        .await
        .unwrap();

    let requests = seen.lock().unwrap();
    assert_eq!(requests[0]["grant_type"], "refresh_token");
    assert_eq!(requests[0]["refresh_token"], "old-refresh");
}

#[tokio::test]
async fn rejected_grant_reports_status_and_description() {
    let url = serve(Router::new().route(
        "/token",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "invalid_grant",
                    "error_description": "Token is not active"
                })),
            )
        }),
    ))
    .await;

    let err = client(url, Duration::from_secs(5))
        .exchange(&TokenGrant::RefreshToken("stale".to_string()))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ExchangeFailure::Status {
            status: 400,
            message: "Token is not active".to_string(),
        }
    );
}

#[tokio::test]
async fn success_without_tokens_is_malformed() {
    let url = serve(Router::new().route(
        "/token",
        post(|| async { Json(json!({"token_type": "Bearer", "expires_in": 300})) }),
    ))
    .await;

    let err = client(url, Duration::from_secs(5))
        .exchange(&TokenGrant::ClientCredentials)
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeFailure::MalformedResponse(_)));
}

#[tokio::test]
async fn non_json_success_is_malformed() {
    let url = serve(Router::new().route(
        "/token",
        post(|| async { "<html>maintenance</html>".into_response() }),
    ))
    .await;

    let err = client(url, Duration::from_secs(5))
        .exchange(&TokenGrant::ClientCredentials)
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeFailure::MalformedResponse(_)));
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let url = serve(Router::new().route(
        "/token",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK
        }),
    ))
    .await;

    let err = client(url, Duration::from_millis(200))
        .exchange(&TokenGrant::ClientCredentials)
        .await
        .unwrap_err();

    assert_eq!(err, ExchangeFailure::Timeout);
}

#[tokio::test]
async fn configured_client_keeps_exchange_timeout() {
    let token_endpoint = serve(Router::new().route(
        "/token",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK
        }),
    ))
    .await;
    let config = SessionConfig {
        token_endpoint,
        client_id: "dashboard".to_string(),
        client_secret: "s3cret".to_string(),
        storage_dir: std::env::temp_dir(),
        refresh_lead_secs: 30,
        exchange_timeout_secs: 1,
    };

    let started = std::time::Instant::now();
    let err = ReqwestIdentityClient::from_config(&config)
        .unwrap()
        .exchange(&TokenGrant::ClientCredentials)
        .await
        .unwrap_err();

    assert_eq!(err, ExchangeFailure::Timeout);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let url = Url::parse(&format!("http://{addr}/token")).unwrap();

    let err = client(url, Duration::from_secs(5))
        .exchange(&TokenGrant::ClientCredentials)
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeFailure::Transport(_)));
}
