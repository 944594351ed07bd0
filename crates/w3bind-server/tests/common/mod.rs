#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, Method, Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt; // for oneshot
use w3bind_binding::BindingClient;
use w3bind_registry::{RegistryClient, RegistryConfig};
use w3bind_server::{app, AppState};
use w3bind_session::{MemorySessionStore, SessionManager};
use w3bind_types::VerificationResult;
use w3bind_vault::VaultClient;
use w3bind_verify::SignatureVerifier;

pub const PUBLIC_URL: &str = "https://platform.test";

/// Accepts `"good"` against a bound key and `"legacy"` without one.
pub struct StubVerifier;

#[async_trait]
impl SignatureVerifier for StubVerifier {
    async fn verify(&self, identifier: &str, signature: &str, _payload: &str) -> VerificationResult {
        if signature == "good" {
            VerificationResult::verified(format!("zkey-of-{identifier}"))
        } else if signature == "legacy" {
            VerificationResult::unenforced()
        } else {
            VerificationResult::invalid("signature verification failed")
        }
    }
}

/// Binding documents keyed by vault owner: `(id, parsed)` pairs.
pub type VaultDocs = Arc<Mutex<HashMap<String, Vec<(String, Value)>>>>;

pub struct TestServer {
    pub router: Router,
    pub docs: VaultDocs,
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn graphql(
    State(docs): State<VaultDocs>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let owner = headers
        .get("x-ename")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let query = body["query"].as_str().unwrap_or_default();
    let vars = &body["variables"];
    let mut docs = docs.lock().unwrap();
    let owned = docs.entry(owner).or_default();

    if query.contains("createBindingDocumentSignature") {
        let id = vars["input"]["bindingDocumentId"].as_str().unwrap_or_default();
        return match owned.iter_mut().find(|(doc_id, _)| doc_id == id) {
            Some((_, doc)) => {
                doc["signatures"]
                    .as_array_mut()
                    .unwrap()
                    .push(vars["input"]["signature"].clone());
                Json(json!({ "data": { "createBindingDocumentSignature": { "errors": [] } } }))
            }
            None => Json(json!({ "data": { "createBindingDocumentSignature": {
                "errors": [{ "message": "document not found" }]
            } } })),
        };
    }
    if query.contains("createBindingDocument") {
        let input = &vars["input"];
        let id = format!("env-{}", owned.len() + 1);
        owned.push((
            id.clone(),
            json!({
                "subject": input["subject"],
                "type": input["type"],
                "data": input["data"],
                "signatures": [input["ownerSignature"]],
            }),
        ));
        return Json(json!({ "data": { "createBindingDocument": {
            "metaEnvelopeId": id, "errors": []
        } } }));
    }
    if query.contains("deleteMetaEnvelope") {
        let id = vars["id"].as_str().unwrap_or_default().to_string();
        owned.retain(|(doc_id, _)| *doc_id != id);
        return Json(json!({ "data": { "deleteMetaEnvelope": { "id": id } } }));
    }
    let edges: Vec<Value> = owned
        .iter()
        .map(|(id, doc)| json!({ "node": { "id": id, "parsed": doc } }))
        .collect();
    Json(json!({ "data": { "bindingDocuments": { "edges": edges } } }))
}

/// Router wired to an in-memory session store, a stub verifier, and fake
/// registry and vault servers. `@ghost` has no vault.
pub async fn test_server() -> TestServer {
    test_server_with(false).await
}

pub async fn test_server_with(allow_unenforced_writes: bool) -> TestServer {
    let docs: VaultDocs = Arc::default();
    let vault_addr = serve(
        Router::new()
            .route("/graphql", post(graphql))
            .with_state(docs.clone()),
    )
    .await;

    let vault_uri = format!("http://{vault_addr}");
    let registry_addr = serve(
        Router::new()
            .route(
                "/platforms/certification",
                post(|| async { Json(json!({ "token": "svc-token" })) }),
            )
            .route(
                "/resolve",
                get(move |Query(params): Query<HashMap<String, String>>| {
                    let uri = vault_uri.clone();
                    async move {
                        match params.get("w3id").map(String::as_str) {
                            Some("@ghost") => StatusCode::NOT_FOUND.into_response(),
                            _ => Json(json!({ "uri": uri })).into_response(),
                        }
                    }
                }),
            ),
    )
    .await;

    let mut config = RegistryConfig::new(format!("http://{registry_addr}"), "test");
    config.timeout = Duration::from_secs(5);
    let registry = RegistryClient::new(config).unwrap();

    let state = AppState {
        sessions: SessionManager::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(StubVerifier),
            Duration::from_secs(900),
        ),
        bindings: BindingClient::new(VaultClient::new(Arc::new(registry))),
        public_url: PUBLIC_URL.to_string(),
        allow_unenforced_writes,
    };
    TestServer {
        router: app(state),
        docs,
    }
}

/// Sends one request and returns the status and JSON body (`Null` when the
/// body is empty).
pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Creates a session and returns its id.
pub async fn create_session(router: &Router, body: Value) -> String {
    let (status, json) = send(router, Method::POST, "/api/signing/sessions", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["sessionId"].as_str().unwrap().to_string()
}

/// Posts a wallet callback signing the session id itself.
pub async fn callback(router: &Router, session_id: &str, w3id: &str, signature: &str) -> Value {
    let (status, json) = send(
        router,
        Method::POST,
        "/api/signing/callback",
        Some(json!({
            "sessionId": session_id,
            "signature": signature,
            "w3id": w3id,
            "message": session_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json
}
