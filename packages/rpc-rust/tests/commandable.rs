//! Commandable service and commandable client over loopback.

mod dummy;

use serde_json::{json, Value};
use svcwire_core::{ErrorCategory, FilterParams};
use svcwire_rpc::{
    CommandableHttpService, Openable, RestClientConfig, RestService, RestServiceConfig,
};

use dummy::{free_port, Dummy, DummyCommandableClient, DummyController};

async fn start() -> (CommandableHttpService, DummyCommandableClient, u16) {
    let port = free_port();
    let controller = DummyController::new();
    let service = RestService::commandable(
        "dummy",
        RestServiceConfig::new("", "http", "127.0.0.1", port),
        "dummy",
        &controller,
    );
    service.open(None).await.unwrap();

    let client = DummyCommandableClient::new(RestClientConfig::new("http", "127.0.0.1", port));
    client.client.open(None).await.unwrap();
    (service, client, port)
}

#[tokio::test]
async fn crud_through_commands() {
    let (service, client, _) = start().await;

    let created = client
        .create_dummy(None, &Dummy::new("Key 1", "Content 1"))
        .await
        .unwrap()
        .unwrap();
    let id = created.id.clone().unwrap();
    client
        .create_dummy(None, &Dummy::new("Key 2", "Content 2"))
        .await
        .unwrap();

    let page = client.get_dummies(None, None, None).await.unwrap();
    assert_eq!(page.data.len(), 2);
    let filter = FilterParams::from_tuples([("key", "Key 1")]);
    let page = client.get_dummies(None, Some(&filter), None).await.unwrap();
    assert_eq!(page.data, [created.clone()]);

    let mut changed = created.clone();
    changed.content = "Updated".to_string();
    let updated = client.update_dummy(None, &changed).await.unwrap().unwrap();
    assert_eq!(updated.content, "Updated");

    let fetched = client.get_dummy_by_id(None, &id).await.unwrap().unwrap();
    assert_eq!(fetched, updated);

    client.delete_dummy(None, &id).await.unwrap().unwrap();
    // Null results come back as 204 and decode to nothing.
    assert!(client.get_dummy_by_id(None, &id).await.unwrap().is_none());

    client.client.close(None).await.unwrap();
    service.close(None).await.unwrap();
}

#[tokio::test]
async fn correlation_id_travels_in_the_body() {
    let (service, _client, port) = start().await;
    let http = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{port}/dummy/check_correlation_id");

    let body: Value = http
        .post(&url)
        .json(&json!({ "correlation_id": "X" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["correlation_id"], "X");

    // Without one anywhere, the service generates an id.
    let body: Value = http
        .post(&url)
        .json(&json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let generated = body["correlation_id"].as_str().unwrap();
    assert_eq!(generated.len(), 32);

    // The query string is used when the body has none.
    let body: Value = http
        .post(format!("{url}?correlation_id=Q"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["correlation_id"], "Q");

    service.close(None).await.unwrap();
}

#[tokio::test]
async fn invalid_arguments_are_rejected() {
    let (service, client, port) = start().await;

    let err = client
        .client
        .call_command::<Value>("get_dummy_by_id", Some("v-1"), json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::BadRequest);
    assert_eq!(err.code, "INVALID_DATA");
    assert_eq!(err.status, 400);
    assert_eq!(err.correlation_id.as_deref(), Some("v-1"));

    let err = client
        .client
        .call_command::<Value>("raise_exception", Some("e-1"), json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.code, "TEST_ERROR");
    assert_eq!(err.status, 500);

    // Only POST is routed.
    let resp = reqwest::get(format!("http://127.0.0.1:{port}/dummy/get_dummies"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);

    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/dummy/no_such_command"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    client.client.close(None).await.unwrap();
    service.close(None).await.unwrap();
}
