//! End-to-end scenarios for the ingestion endpoint.

use serde_json::{json, Value};
use uuid::Uuid;

mod common;

use common::{post_signed, sign, spawn_gateway, test_config, ACTIVE_SECRET, NEXT_SECRET};

#[tokio::test]
async fn valid_create_succeeds_and_audits() {
    let gateway = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();

    let body = json!({
        "table": "found_updates",
        "action": "create",
        "patch": {
            "request_id": Uuid::new_v4().to_string(),
            "message_from_found_party": "safe"
        }
    })
    .to_string();

    let response = post_signed(&client, &gateway.url, &body, ACTIVE_SECRET).await;
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-ratelimit-limit"));
    assert!(response.headers().contains_key("x-ratelimit-remaining"));

    let parsed: Value = response.json().await.unwrap();
    assert_eq!(parsed["success"], true);
    assert!(parsed["data"]["id"].is_string());
    assert!(parsed["meta"]["auditEventId"].is_string());

    assert_eq!(gateway.store.count("found_updates"), 1);
    let events = gateway.audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, "create");
    assert_eq!(events[0].table, "found_updates");
    assert!(events[0].record_id.is_some());
}

#[tokio::test]
async fn missing_signature_is_authentication_required() {
    let gateway = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(&gateway.url)
        .header("content-type", "application/json")
        .body(r#"{"table":"requests","action":"read"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let parsed: Value = response.json().await.unwrap();
    assert_eq!(parsed["error"], "Authentication required");
}

#[tokio::test]
async fn invalid_and_malformed_signatures_are_indistinguishable() {
    let gateway = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();
    let body = r#"{"table":"requests","action":"read"}"#;

    // Wrong secret.
    let response = post_signed(&client, &gateway.url, body, "wrong-secret").await;
    assert_eq!(response.status(), 401);
    let wrong: Value = response.json().await.unwrap();

    // Not even hex.
    let response = client
        .post(&gateway.url)
        .header("content-type", "application/json")
        .header("x-signature", "not-a-signature")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    let malformed: Value = response.json().await.unwrap();

    assert_eq!(wrong, malformed);
    assert_eq!(wrong["error"], "Invalid signature");
}

#[tokio::test]
async fn next_secret_authenticates_during_rotation() {
    let mut config = test_config();
    config.api.next_secret = Some(NEXT_SECRET.to_string());
    let gateway = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    let body = r#"{"table":"requests","action":"read"}"#;
    let response = post_signed(&client, &gateway.url, body, NEXT_SECRET).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn sixty_first_request_is_rate_limited() {
    let mut config = test_config();
    // Slow refill so the loop itself cannot earn a token back.
    config.rate_limit.refill_per_second = 0.01;
    let gateway = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    let body = r#"{"table":"requests","action":"read","filters":{}}"#;
    for i in 0..60 {
        let response = post_signed(&client, &gateway.url, body, ACTIVE_SECRET).await;
        assert_eq!(response.status(), 200, "request {} should pass", i + 1);
    }

    let response = post_signed(&client, &gateway.url, body, ACTIVE_SECRET).await;
    assert_eq!(response.status(), 429);
    assert!(response.headers().contains_key("retry-after"));
    let parsed: Value = response.json().await.unwrap();
    assert_eq!(parsed["error"], "Rate limit exceeded");
}

#[tokio::test]
async fn idempotent_replay_is_byte_identical_and_writes_once() {
    let gateway = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();

    let body = json!({
        "table": "found_updates",
        "action": "create",
        "patch": {
            "request_id": Uuid::new_v4().to_string(),
            "message_from_found_party": "made it to the shelter"
        }
    })
    .to_string();

    let send = |idempotency_key: &'static str, body: String| {
        let client = client.clone();
        let url = gateway.url.clone();
        async move {
            client
                .post(&url)
                .header("content-type", "application/json")
                .header("x-signature", sign(&body, ACTIVE_SECRET))
                .header("idempotency-key", idempotency_key)
                .body(body)
                .send()
                .await
                .unwrap()
        }
    };

    let first = send("retry-abc_123", body.clone()).await;
    assert_eq!(first.status(), 200);
    assert!(first.headers().get("x-idempotency-replay").is_none());
    let first_bytes = first.bytes().await.unwrap();

    let second = send("retry-abc_123", body.clone()).await;
    assert_eq!(second.status(), 200);
    assert_eq!(
        second.headers().get("x-idempotency-replay").unwrap(),
        "true"
    );
    let second_bytes = second.bytes().await.unwrap();

    assert_eq!(first_bytes, second_bytes);
    // The underlying write happened exactly once.
    assert_eq!(gateway.store.count("found_updates"), 1);
    assert_eq!(gateway.audit.events().len(), 1);
}

#[tokio::test]
async fn reused_key_with_different_body_conflicts() {
    let gateway = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();

    let make_body = |message: &str| {
        json!({
            "table": "found_updates",
            "action": "create",
            "patch": {
                "request_id": Uuid::new_v4().to_string(),
                "message_from_found_party": message
            }
        })
        .to_string()
    };

    let first_body = make_body("first");
    let response = client
        .post(&gateway.url)
        .header("content-type", "application/json")
        .header("x-signature", sign(&first_body, ACTIVE_SECRET))
        .header("idempotency-key", "shared-key")
        .body(first_body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let second_body = make_body("second");
    let response = client
        .post(&gateway.url)
        .header("content-type", "application/json")
        .header("x-signature", sign(&second_body, ACTIVE_SECRET))
        .header("idempotency-key", "shared-key")
        .body(second_body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let parsed: Value = response.json().await.unwrap();
    assert_eq!(parsed["error"], "Idempotency key conflict");

    // The conflicting request performed no write.
    assert_eq!(gateway.store.count("found_updates"), 1);
}

#[tokio::test]
async fn malformed_idempotency_key_is_rejected() {
    let gateway = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();

    let body = json!({
        "table": "found_updates",
        "action": "create",
        "patch": {
            "request_id": Uuid::new_v4().to_string(),
            "message_from_found_party": "safe"
        }
    })
    .to_string();

    let response = client
        .post(&gateway.url)
        .header("content-type", "application/json")
        .header("x-signature", sign(&body, ACTIVE_SECRET))
        .header("idempotency-key", "has spaces!")
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let parsed: Value = response.json().await.unwrap();
    assert_eq!(parsed["error"], "Invalid idempotency key");
    assert_eq!(gateway.store.count("found_updates"), 0);
}

#[tokio::test]
async fn restricted_field_update_rejects_everything() {
    let gateway = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();

    let body = json!({
        "table": "requests",
        "action": "update",
        "id": Uuid::new_v4().to_string(),
        "patch": {"requester_email": "x@example.com"}
    })
    .to_string();

    let response = post_signed(&client, &gateway.url, &body, ACTIVE_SECRET).await;
    assert_eq!(response.status(), 400);
    let parsed: Value = response.json().await.unwrap();
    assert_eq!(parsed["error"], "No valid fields to update");
    assert_eq!(parsed["fields"][0], "requester_email");
}

#[tokio::test]
async fn update_of_missing_record_is_not_found() {
    let gateway = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();

    let body = json!({
        "table": "requests",
        "action": "update",
        "id": Uuid::new_v4().to_string(),
        "patch": {"status": "found"}
    })
    .to_string();

    let response = post_signed(&client, &gateway.url, &body, ACTIVE_SECRET).await;
    assert_eq!(response.status(), 404);
    let parsed: Value = response.json().await.unwrap();
    assert_eq!(parsed["error"], "Record not found");
}

#[tokio::test]
async fn create_then_update_then_read_round_trip() {
    let gateway = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();

    let create = json!({
        "table": "requests",
        "action": "create",
        "patch": {
            "target_first_name": "John",
            "target_last_name": "Brown",
            "parish": "St. Andrew",
            "status": "missing",
            // Stripped by the allowlist, reported in rejectedFields.
            "requester_email": "caller@example.com"
        }
    })
    .to_string();

    let response = post_signed(&client, &gateway.url, &create, ACTIVE_SECRET).await;
    assert_eq!(response.status(), 200);
    let parsed: Value = response.json().await.unwrap();
    assert_eq!(parsed["rejectedFields"][0], "requester_email");
    let id = parsed["data"]["id"].as_str().unwrap().to_string();

    let update = json!({
        "table": "requests",
        "action": "update",
        "id": id,
        "patch": {"status": "found"}
    })
    .to_string();
    let response = post_signed(&client, &gateway.url, &update, ACTIVE_SECRET).await;
    assert_eq!(response.status(), 200);

    let read = json!({
        "table": "requests",
        "action": "read",
        "id": id
    })
    .to_string();
    let response = post_signed(&client, &gateway.url, &read, ACTIVE_SECRET).await;
    assert_eq!(response.status(), 200);
    let parsed: Value = response.json().await.unwrap();
    assert_eq!(parsed["data"]["status"], "found");
    assert_eq!(parsed["data"]["target_first_name"], "John");

    assert_eq!(gateway.audit.events().len(), 3);
}

#[tokio::test]
async fn read_with_empty_filters_is_audited() {
    let gateway = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();

    let body = r#"{"table":"requests","action":"read","filters":{}}"#;
    let response = post_signed(&client, &gateway.url, body, ACTIVE_SECRET).await;
    assert_eq!(response.status(), 200);
    let parsed: Value = response.json().await.unwrap();
    assert!(parsed["data"].as_array().unwrap().is_empty());

    let events = gateway.audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, "read");
}

#[tokio::test]
async fn missing_required_fields_are_listed() {
    let gateway = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();

    let body = json!({
        "table": "requests",
        "action": "create",
        "patch": {"target_first_name": "John"}
    })
    .to_string();

    let response = post_signed(&client, &gateway.url, &body, ACTIVE_SECRET).await;
    assert_eq!(response.status(), 400);
    let parsed: Value = response.json().await.unwrap();
    assert_eq!(parsed["error"], "Missing required fields");
    let fields: Vec<&str> = parsed["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_str().unwrap())
        .collect();
    assert!(fields.contains(&"target_last_name"));
    assert!(fields.contains(&"parish"));
}

#[tokio::test]
async fn schema_errors_name_the_path_without_echoing_values() {
    let gateway = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();

    let body = r#"{"table":"requests","action":"obliterate"}"#;
    let response = post_signed(&client, &gateway.url, body, ACTIVE_SECRET).await;
    assert_eq!(response.status(), 400);
    let parsed: Value = response.json().await.unwrap();
    assert_eq!(parsed["error"], "Invalid request envelope");
    let message = parsed["message"].as_str().unwrap();
    assert!(message.starts_with("action"));
    assert!(!message.contains("obliterate"));
}

#[tokio::test]
async fn wrong_content_type_is_rejected() {
    let gateway = spawn_gateway(test_config()).await;
    let client = reqwest::Client::new();

    let body = r#"{"table":"requests","action":"read"}"#;
    let response = client
        .post(&gateway.url)
        .header("content-type", "text/plain")
        .header("x-signature", sign(body, ACTIVE_SECRET))
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let parsed: Value = response.json().await.unwrap();
    assert_eq!(parsed["error"], "Content-Type must be application/json");
}

#[tokio::test]
async fn disabled_endpoint_returns_503_with_retry_after() {
    let mut config = test_config();
    config.api.enabled = false;
    let gateway = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    let body = r#"{"table":"requests","action":"read"}"#;
    let response = post_signed(&client, &gateway.url, body, ACTIVE_SECRET).await;

    assert_eq!(response.status(), 503);
    assert!(response.headers().contains_key("retry-after"));
    let parsed: Value = response.json().await.unwrap();
    assert_eq!(parsed["error"], "Service unavailable");
}

#[tokio::test]
async fn missing_secret_is_a_server_error() {
    let mut config = test_config();
    config.api.active_secret = String::new();
    let gateway = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    let body = r#"{"table":"requests","action":"read"}"#;
    let response = post_signed(&client, &gateway.url, body, "anything").await;

    assert_eq!(response.status(), 500);
    let parsed: Value = response.json().await.unwrap();
    assert_eq!(parsed["error"], "Server misconfigured");
}
