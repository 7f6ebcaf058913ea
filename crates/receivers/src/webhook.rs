//! Webhook receiver: hosts one HTTP endpoint per configured
//! [`WebhookRoute`]. Every inbound request becomes a [`crate::TriggerEvent`]
//! carrying its method, headers, and body; the response is `2xx` once the
//! event has been durably published, `5xx` otherwise, so the caller's own
//! retry behaviour covers redelivery.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::any;
use axum::Router;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio_util::sync::CancellationToken;

use crate::error::ReceiverError;
use crate::{Emit, Receiver, TriggerEvent};

type HmacSha256 = Hmac<Sha256>;

/// One configured webhook endpoint.
#[derive(Debug, Clone)]
pub struct WebhookRoute {
    /// URL path this route is mounted at, e.g. `/hooks/github`. Also
    /// used verbatim as the emitted event's `source_id`.
    pub path: String,
    pub provider_id: String,
    /// When set, inbound requests must carry an `X-Signature` header
    /// matching the hex-encoded HMAC-SHA256 of the raw body under this
    /// secret; mismatches are rejected with `401` before anything is
    /// emitted.
    pub hmac_secret: Option<String>,
}

struct SharedState {
    routes: HashMap<String, WebhookRoute>,
    emit: Arc<dyn Emit>,
}

/// A receiver hosting every configured [`WebhookRoute`] on one port.
pub struct WebhookReceiver {
    port: u16,
    routes: Vec<WebhookRoute>,
}

impl WebhookReceiver {
    pub fn new(port: u16, routes: Vec<WebhookRoute>) -> Self {
        Self { port, routes }
    }
}

#[async_trait]
impl Receiver for WebhookReceiver {
    async fn start(&self, cancellation: CancellationToken, emit: Arc<dyn Emit>) -> Result<(), ReceiverError> {
        let routes = self.routes.iter().map(|r| (r.path.clone(), r.clone())).collect();
        let state = Arc::new(SharedState { routes, emit });

        let app = Router::new().route("/{*path}", any(handle)).with_state(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ReceiverError::Transport(format!("failed to bind {addr}: {e}")))?;

        tracing::info!(port = self.port, "webhook receiver listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancellation.cancelled().await })
            .await
            .map_err(|e| ReceiverError::Transport(e.to_string()))
    }
}

async fn handle(
    State(state): State<Arc<SharedState>>,
    Path(path): Path<String>,
    method: axum::http::Method,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let full_path = format!("/{path}");
    let Some(route) = state.routes.get(&full_path) else {
        return StatusCode::NOT_FOUND;
    };

    if let Some(secret) = &route.hmac_secret {
        let Some(signature) = headers.get("x-signature").and_then(|v| v.to_str().ok()) else {
            return StatusCode::UNAUTHORIZED;
        };
        if !verify_signature(secret, &body, signature) {
            return StatusCode::UNAUTHORIZED;
        }
    }

    let header_map: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), serde_json::Value::String(v.to_str().unwrap_or_default().to_string())))
        .collect();

    let body_value =
        serde_json::from_slice::<serde_json::Value>(&body).unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&body).into_owned()));

    let event = TriggerEvent {
        id: uuid::Uuid::new_v4().to_string(),
        source_id: full_path,
        provider_id: route.provider_id.clone(),
        event_type: method.as_str().to_lowercase(),
        data: serde_json::json!({ "method": method.as_str(), "headers": header_map, "body": body_value }),
        emitted_at: Utc::now(),
    };

    match state.emit.emit(event).await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            tracing::warn!(error = %err, "failed to publish webhook trigger event");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else { return false };
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());
    expected.eq_ignore_ascii_case(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingEmitter;

    #[tokio::test]
    async fn accepts_and_emits_unsigned_webhook() {
        let state = Arc::new(SharedState {
            routes: HashMap::from([(
                "/hooks/test".to_string(),
                WebhookRoute { path: "/hooks/test".to_string(), provider_id: "test".to_string(), hmac_secret: None },
            )]),
            emit: Arc::new(RecordingEmitter::default()),
        });

        let status = handle(
            State(state.clone()),
            Path("hooks/test".to_string()),
            axum::http::Method::POST,
            HeaderMap::new(),
            Bytes::from_static(b"{\"hello\":\"world\"}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let state = Arc::new(SharedState { routes: HashMap::new(), emit: Arc::new(RecordingEmitter::default()) });
        let status =
            handle(State(state), Path("nope".to_string()), axum::http::Method::GET, HeaderMap::new(), Bytes::new())
                .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let state = Arc::new(SharedState {
            routes: HashMap::from([(
                "/hooks/secure".to_string(),
                WebhookRoute {
                    path: "/hooks/secure".to_string(),
                    provider_id: "secure".to_string(),
                    hmac_secret: Some("shh".to_string()),
                },
            )]),
            emit: Arc::new(RecordingEmitter::default()),
        });
        let status = handle(
            State(state),
            Path("hooks/secure".to_string()),
            axum::http::Method::POST,
            HeaderMap::new(),
            Bytes::from_static(b"body"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_signature_is_accepted() {
        let secret = "shh";
        let body = b"payload";
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let signature = hex::encode(mac.finalize().into_bytes());

        let state = Arc::new(SharedState {
            routes: HashMap::from([(
                "/hooks/secure".to_string(),
                WebhookRoute {
                    path: "/hooks/secure".to_string(),
                    provider_id: "secure".to_string(),
                    hmac_secret: Some(secret.to_string()),
                },
            )]),
            emit: Arc::new(RecordingEmitter::default()),
        });

        let mut headers = HeaderMap::new();
        headers.insert("x-signature", signature.parse().unwrap());

        let status = handle(
            State(state),
            Path("hooks/secure".to_string()),
            axum::http::Method::POST,
            headers,
            Bytes::copy_from_slice(body),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
