// Ephemeral bootstrap rendezvous: publish a short-lived v3 onion that
// accepts a single `POST /bs/<address>` from a peer, then hand back the
// address it posted. Grounded on `bootstrapservice.py`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Router, middleware, middleware::Next};
use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::oneshot;
use tracing::info;
use uuid::Uuid;

use crate::block::{Block, BlockCache, BlockStore, NewBlock};
use crate::config::ConfigStore;
use crate::crypto::CryptoEngine;
use crate::error::{CoreError, CoreResult};
use crate::net::NetController;
use crate::net::control::ControlClient;
use crate::net::get_open_port;

/// Default rendezvous timeout, matching `bootstrap_timeout=300` in the
/// source's `bootstrap_client_service` signature.
pub const DEFAULT_BOOTSTRAP_TIMEOUT_SECS: u64 = 300;

/// Process-wide slot store the rendezvous result lands in, keyed by a random
/// session id, a narrow stand-in for the source's shared `core.keyStore`.
#[derive(Default, Clone)]
pub struct BootstrapKeyStore {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl BootstrapKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<String> {
        self.slots.lock().get(id).cloned()
    }

    fn set(&self, id: &str, value: &str) {
        self.slots.lock().insert(id.to_string(), value.to_string());
    }
}

fn onion_id_regex() -> &'static Regex {
    // v3 onion addresses are 56 base32 characters followed by ".onion".
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z2-7]{56}\.onion$").expect("static pattern is valid"))
}

/// Validates `<candidate>.onion` as a syntactically well-formed v3 onion id.
pub fn validate_onion_id(candidate: &str) -> bool {
    onion_id_regex().is_match(&format!("{candidate}.onion"))
}

#[derive(Clone)]
struct RendezvousState {
    keystore: BootstrapKeyStore,
    session_id: String,
    shutdown: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

async fn ping() -> &'static str {
    "pong!"
}

async fn accept_bootstrap(
    State(state): State<RendezvousState>,
    Path(address): Path<String>,
) -> (StatusCode, &'static str) {
    if !validate_onion_id(&address) {
        return (StatusCode::OK, "");
    }
    state.keystore.set(&state.session_id, &format!("{address}.onion"));
    if let Some(tx) = state.shutdown.lock().take() {
        let _ = tx.send(());
    }
    (StatusCode::OK, "success")
}

async fn harden_headers(request: axum::extract::Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    response
        .headers_mut()
        .insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    response
}

/// Runs the one-shot rendezvous HTTP server: binds an ephemeral loopback
/// port, serves `/ping` and `/bs/<address>`, and returns as soon as the
/// first valid post arrives or `timeout` elapses.
async fn serve_rendezvous(
    keystore: BootstrapKeyStore,
    session_id: String,
    timeout: Duration,
) -> CoreResult<Option<String>> {
    let port = get_open_port()?;
    let (tx, rx) = oneshot::channel();
    let state = RendezvousState {
        keystore: keystore.clone(),
        session_id: session_id.clone(),
        shutdown: Arc::new(Mutex::new(Some(tx))),
    };

    let app = Router::new()
        .route("/ping", get(ping))
        .route("/bs/{address}", post(accept_bootstrap))
        .layer(middleware::from_fn(harden_headers))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!(port, "bootstrap rendezvous listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = rx.await;
    });

    tokio::select! {
        result = server => {
            result.map_err(|e| CoreError::NetworkStartup(e.to_string()))?;
        }
        _ = tokio::time::sleep(timeout) => {
            info!("bootstrap rendezvous timed out waiting for peer");
        }
    }

    Ok(keystore.get(&session_id))
}

/// Given a peer's public key, publishes a short-lived onion accepting a
/// single `POST /bs/<address>`, publishes a signed+encrypted `con` block
/// advertising the ephemeral service, and returns the address the peer
/// ultimately posts back (or `None` on timeout).
pub async fn bootstrap_client_service(
    peer_pub_b64: &str,
    engine: &CryptoEngine,
    store: &dyn BlockStore,
    cache: &BlockCache,
    controller: &mut NetController,
    timeout_secs: u64,
) -> CoreResult<Option<String>> {
    crate::keypair::decode_x25519_public(peer_pub_b64)?;

    let local_port = get_open_port()?;
    let session_id = Uuid::new_v4().to_string();
    let keystore = BootstrapKeyStore::new();

    let mut control = ControlClient::connect(controller.control_port).await?;
    control.authenticate(controller.control_password()).await?;
    let service_id = control.add_ephemeral_onion(80, local_port).await?;

    let expire = now_epoch() + timeout_secs as i64;
    let block = Block::build(
        NewBlock {
            block_type: "con".to_string(),
            parent: None,
            content: service_id.clone().into_bytes(),
            sign: true,
            encrypt_to: Some(peer_pub_b64.to_string()),
            forward_enc: false,
            rply: Some(now_epoch().to_string()),
            time: expire,
        },
        engine,
    )?;
    block.save(store, cache);

    serve_rendezvous(keystore, session_id, Duration::from_secs(timeout_secs)).await
}

fn now_epoch() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_well_formed_v3_onion_id() {
        let id = "a".repeat(56);
        assert!(validate_onion_id(&id));
    }

    #[test]
    fn rejects_malformed_onion_id() {
        assert!(!validate_onion_id("too-short"));
        assert!(!validate_onion_id(&"A".repeat(56))); // uppercase not base32
    }

    #[tokio::test]
    async fn rendezvous_times_out_when_nobody_posts() {
        let keystore = BootstrapKeyStore::new();
        let result = serve_rendezvous(keystore, "empty-session".into(), Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn rendezvous_returns_posted_address() {
        let port = get_open_port().unwrap();
        let session_id = "live-session".to_string();
        let keystore = BootstrapKeyStore::new();
        let id = "b".repeat(56);

        let (tx, rx) = oneshot::channel();
        let state = RendezvousState {
            keystore: keystore.clone(),
            session_id: session_id.clone(),
            shutdown: Arc::new(Mutex::new(Some(tx))),
        };
        let app = Router::new()
            .route("/ping", get(ping))
            .route("/bs/{address}", post(accept_bootstrap))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let server = tokio::spawn(
            axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = rx.await;
            }),
        );

        let client = reqwest_stub_post(port, &id).await;
        assert_eq!(client, "success");
        let _ = server.await;
        assert_eq!(keystore.get(&session_id), Some(format!("{id}.onion")));
    }

    /// Minimal one-off HTTP POST over a raw TCP stream, avoiding a new HTTP
    /// client dependency just for this test.
    async fn reqwest_stub_post(port: u16, address: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let request = format!(
            "POST /bs/{address} HTTP/1.1\r\nHost: 127.0.0.1\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf);
        text.lines().last().unwrap_or("").to_string()
    }
}
