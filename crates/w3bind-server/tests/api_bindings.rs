mod common;

use axum::http::{Method, StatusCode};
use common::{callback, create_session, send, test_server, test_server_with, TestServer};
use serde_json::json;

/// Bob vouches for Alice: a completed session signed by Bob becomes a claim
/// in Alice's vault. Returns the document id.
async fn bob_vouches_for_alice(server: &TestServer) -> String {
    let session = create_session(
        &server.router,
        json!({ "target": "alice", "expectedSigner": "bob" }),
    )
    .await;
    assert_eq!(callback(&server.router, &session, "@bob", "good").await["success"], true);

    let (status, json) = send(
        &server.router,
        Method::POST,
        "/api/bindings/alice/documents",
        Some(json!({ "sessionId": session, "data": { "name": "Alice" } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["documentId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn claim_appears_as_pending_for_subject() {
    let server = test_server().await;
    let document_id = bob_vouches_for_alice(&server).await;

    let (status, json) = send(&server.router, Method::GET, "/api/bindings/@alice/pending", None).await;
    assert_eq!(status, StatusCode::OK);
    let docs = json["documents"].as_array().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["id"], document_id);
    assert_eq!(docs[0]["subject"], "@alice");
    assert_eq!(docs[0]["type"], "social_connection");
    assert_eq!(docs[0]["data"]["kind"], "social_connection");
    assert_eq!(docs[0]["signatures"][0]["signer"], "@bob");
    assert_eq!(docs[0]["signatures"][0]["signature"], "good");

    let (_, json) = send(&server.router, Method::GET, "/api/bindings/alice/connections", None).await;
    assert_eq!(json["connections"], json!([]));
}

#[tokio::test]
async fn binding_intent_countersigns_on_completion() {
    let server = test_server().await;
    let document_id = bob_vouches_for_alice(&server).await;

    let session = create_session(
        &server.router,
        json!({
            "target": "alice",
            "expectedSigner": "alice",
            "binding": { "vaultOwner": "alice", "documentId": document_id }
        }),
    )
    .await;
    let json = callback(&server.router, &session, "alice", "good").await;
    assert_eq!(json, json!({ "success": true, "status": "completed" }));

    let (_, json) = send(&server.router, Method::GET, "/api/bindings/alice/pending", None).await;
    assert_eq!(json["documents"], json!([]));

    let (status, json) =
        send(&server.router, Method::GET, "/api/bindings/alice/connections", None).await;
    assert_eq!(status, StatusCode::OK);
    let connections = json["connections"].as_array().unwrap();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0]["counterparty"], "@bob");
    assert_eq!(connections[0]["document"]["id"], document_id);
    assert_eq!(
        connections[0]["document"]["signatures"].as_array().unwrap().len(),
        2
    );
}

#[tokio::test]
async fn failed_countersign_still_completes_session() {
    let server = test_server().await;
    let session = create_session(
        &server.router,
        json!({
            "target": "alice",
            "expectedSigner": "alice",
            "binding": { "vaultOwner": "alice", "documentId": "missing" }
        }),
    )
    .await;

    let json = callback(&server.router, &session, "alice", "good").await;
    assert_eq!(json["success"], true);
    assert!(server.docs.lock().unwrap()["@alice"].is_empty());
}

#[tokio::test]
async fn declined_claim_is_deleted() {
    let server = test_server().await;
    let document_id = bob_vouches_for_alice(&server).await;

    let (status, _) = send(
        &server.router,
        Method::DELETE,
        &format!("/api/bindings/alice/documents/{document_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = send(&server.router, Method::GET, "/api/bindings/alice/pending", None).await;
    assert_eq!(json["documents"], json!([]));
}

#[tokio::test]
async fn claim_requires_completed_session() {
    let server = test_server().await;
    let session = create_session(&server.router, json!({ "target": "alice" })).await;

    let (status, json) = send(
        &server.router,
        Method::POST,
        "/api/bindings/alice/documents",
        Some(json!({ "sessionId": session, "data": { "name": "Alice" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("not completed"));
}

#[tokio::test]
async fn self_vouching_is_rejected() {
    let server = test_server().await;
    let session = create_session(&server.router, json!({ "target": "alice" })).await;
    callback(&server.router, &session, "alice", "good").await;

    let (status, _) = send(
        &server.router,
        Method::POST,
        "/api/bindings/alice/documents",
        Some(json!({ "sessionId": session, "data": { "name": "Alice" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn claim_without_name_is_rejected() {
    let server = test_server().await;
    let session = create_session(&server.router, json!({ "target": "alice" })).await;
    callback(&server.router, &session, "bob", "good").await;

    let (status, json) = send(
        &server.router,
        Method::POST,
        "/api/bindings/alice/documents",
        Some(json!({ "sessionId": session, "data": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn unresolvable_identity_is_404() {
    let server = test_server().await;
    let (status, json) = send(&server.router, Method::GET, "/api/bindings/ghost/pending", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("@ghost"));
}

fn claim(session: &str) -> Option<serde_json::Value> {
    Some(json!({ "sessionId": session, "data": { "name": "Alice" } }))
}

#[tokio::test]
async fn session_cannot_vouch_for_a_different_identity() {
    let server = test_server().await;
    let session = create_session(
        &server.router,
        json!({ "target": "alice", "expectedSigner": "bob" }),
    )
    .await;
    callback(&server.router, &session, "@bob", "good").await;

    let (status, json) = send(
        &server.router,
        Method::POST,
        "/api/bindings/mallory/documents",
        claim(&session),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("@mallory"));
    assert!(!server.docs.lock().unwrap().contains_key("@mallory"));
}

#[tokio::test]
async fn session_creates_at_most_one_claim() {
    let server = test_server().await;
    let session = create_session(&server.router, json!({ "target": "alice" })).await;
    callback(&server.router, &session, "@bob", "good").await;

    let (status, _) =
        send(&server.router, Method::POST, "/api/bindings/alice/documents", claim(&session)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) =
        send(&server.router, Method::POST, "/api/bindings/alice/documents", claim(&session)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("already been used"));
    assert_eq!(server.docs.lock().unwrap()["@alice"].len(), 1);
}

#[tokio::test]
async fn rejected_claim_leaves_session_usable() {
    let server = test_server().await;
    let session = create_session(&server.router, json!({ "target": "alice" })).await;
    callback(&server.router, &session, "@bob", "good").await;

    let (status, _) = send(
        &server.router,
        Method::POST,
        "/api/bindings/alice/documents",
        Some(json!({ "sessionId": session, "data": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        send(&server.router, Method::POST, "/api/bindings/alice/documents", claim(&session)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn binding_intent_needs_vault_owner_as_expected_signer() {
    let server = test_server().await;
    for body in [
        json!({ "target": "alice", "binding": { "vaultOwner": "alice", "documentId": "d" } }),
        json!({
            "target": "alice",
            "expectedSigner": "mallory",
            "binding": { "vaultOwner": "alice", "documentId": "d" }
        }),
    ] {
        let (status, json) =
            send(&server.router, Method::POST, "/api/signing/sessions", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("expectedSigner"));
    }
}

#[tokio::test]
async fn countersigned_claim_is_not_signed_twice() {
    let server = test_server().await;
    let document_id = bob_vouches_for_alice(&server).await;
    let intent = json!({
        "target": "alice",
        "expectedSigner": "alice",
        "binding": { "vaultOwner": "alice", "documentId": document_id }
    });

    let first = create_session(&server.router, intent.clone()).await;
    callback(&server.router, &first, "alice", "good").await;
    let second = create_session(&server.router, intent).await;
    assert_eq!(callback(&server.router, &second, "alice", "good").await["success"], true);

    let docs = server.docs.lock().unwrap();
    let (_, doc) = docs["@alice"].iter().find(|(id, _)| *id == document_id).unwrap();
    assert_eq!(doc["signatures"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unenforced_signature_cannot_write_to_vaults() {
    let server = test_server().await;
    let session = create_session(&server.router, json!({ "target": "alice" })).await;
    let json = callback(&server.router, &session, "@bob", "legacy").await;
    assert_eq!(json["status"], "completed");

    let (status, json) =
        send(&server.router, Method::POST, "/api/bindings/alice/documents", claim(&session)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(json["error"].as_str().unwrap().contains("bound key"));

    let document_id = bob_vouches_for_alice(&server).await;
    let countersign = create_session(
        &server.router,
        json!({
            "target": "alice",
            "expectedSigner": "alice",
            "binding": { "vaultOwner": "alice", "documentId": document_id }
        }),
    )
    .await;
    assert_eq!(callback(&server.router, &countersign, "alice", "legacy").await["success"], true);

    let (_, json) = send(&server.router, Method::GET, "/api/bindings/alice/pending", None).await;
    assert_eq!(json["documents"].as_array().unwrap().len(), 1);
    let (_, json) = send(&server.router, Method::GET, "/api/bindings/alice/connections", None).await;
    assert_eq!(json["connections"], json!([]));
}

#[tokio::test]
async fn unenforced_writes_can_be_allowed() {
    let server = test_server_with(true).await;
    let session = create_session(&server.router, json!({ "target": "alice" })).await;
    callback(&server.router, &session, "@bob", "legacy").await;

    let (status, _) =
        send(&server.router, Method::POST, "/api/bindings/alice/documents", claim(&session)).await;
    assert_eq!(status, StatusCode::CREATED);
}
