use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use w3bind_registry::{RegistryClient, RegistryConfig, VaultEndpoint};
use w3bind_types::Ename;
use w3bind_vault::{VaultClient, VaultError};

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn whois(headers: HeaderMap) -> impl IntoResponse {
    match headers.get("x-ename").and_then(|v| v.to_str().ok()) {
        Some("@alice") => Json(json!({ "keyBindingCertificates": ["a.b.c", "d.e.f"] })).into_response(),
        Some("@empty") => Json(json!({})).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn graphql(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let owner = headers
        .get("x-ename")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if body["query"].as_str().unwrap_or_default().contains("fail") {
        return Json(json!({
            "data": null,
            "errors": [{ "message": "first problem" }, { "message": "second problem" }]
        }));
    }
    Json(json!({ "data": { "echo": { "auth": auth, "owner": owner, "vars": body["variables"] } } }))
}

async fn setup() -> (VaultClient, VaultEndpoint) {
    let registry_app = Router::new().route(
        "/platforms/certification",
        post(|| async { Json(json!({ "token": "svc-token" })) }),
    );
    let registry_addr = serve(registry_app).await;

    let vault_app = Router::new()
        .route("/whois", get(whois))
        .route("/graphql", post(graphql));
    let vault_addr = serve(vault_app).await;

    let registry =
        RegistryClient::new(RegistryConfig::new(format!("http://{registry_addr}"), "test")).unwrap();
    let endpoint = VaultEndpoint::parse(&format!("http://{vault_addr}")).unwrap();
    (VaultClient::new(Arc::new(registry)), endpoint)
}

#[tokio::test]
async fn whois_returns_certificates_in_order() {
    let (vault, endpoint) = setup().await;
    let certs = vault
        .whois(&endpoint, &Ename::normalize("alice").unwrap())
        .await
        .unwrap();
    assert_eq!(certs, vec!["a.b.c".to_string(), "d.e.f".to_string()]);
}

#[tokio::test]
async fn whois_without_field_is_empty() {
    let (vault, endpoint) = setup().await;
    let certs = vault
        .whois(&endpoint, &Ename::normalize("@empty").unwrap())
        .await
        .unwrap();
    assert!(certs.is_empty());
}

#[tokio::test]
async fn whois_status_error_is_typed() {
    let (vault, endpoint) = setup().await;
    let err = vault
        .whois(&endpoint, &Ename::normalize("@ghost").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Status { status: 404, .. }));
}

#[derive(Debug, Deserialize)]
struct Echo {
    echo: EchoInner,
}

#[derive(Debug, Deserialize)]
struct EchoInner {
    auth: String,
    owner: String,
    vars: Value,
}

#[tokio::test]
async fn graphql_sends_bearer_token_and_owner_scope() {
    let (vault, endpoint) = setup().await;
    let out: Echo = vault
        .graphql(
            &endpoint,
            &Ename::normalize("bob").unwrap(),
            "query { echo }",
            json!({ "id": "doc-1" }),
        )
        .await
        .unwrap();
    assert_eq!(out.echo.auth, "Bearer svc-token");
    assert_eq!(out.echo.owner, "@bob");
    assert_eq!(out.echo.vars["id"], "doc-1");
}

#[tokio::test]
async fn graphql_errors_are_joined() {
    let (vault, endpoint) = setup().await;
    let err = vault
        .graphql::<Value>(
            &endpoint,
            &Ename::normalize("bob").unwrap(),
            "mutation { fail }",
            json!({}),
        )
        .await
        .unwrap_err();
    match err {
        VaultError::GraphQl(msg) => assert_eq!(msg, "first problem; second problem"),
        other => panic!("expected GraphQl error, got {other:?}"),
    }
}
