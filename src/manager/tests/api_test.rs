use std::sync::Arc;
use std::time::Duration;

use flow::NoopResources;
use manager::{admin_router, StreamManager};

async fn serve(streams_mode: bool) -> (String, Arc<StreamManager>) {
    let manager = Arc::new(StreamManager::new(
        NoopResources::shared(),
        Duration::from_secs(2),
    ));
    let router = admin_router(manager.clone(), streams_mode);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind admin listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve admin api");
    });
    (format!("http://{addr}"), manager)
}

const STREAM_BODY: &str = r#"
input:
  type: generate
  payload: from_api
  interval: 50ms
output:
  type: drop
"#;

#[tokio::test]
async fn ping_version_and_ready() {
    let (base, _manager) = serve(false).await;
    let client = reqwest::Client::new();

    let ping = client.get(format!("{base}/ping")).send().await.expect("ping");
    assert_eq!(ping.status().as_u16(), 200);
    assert_eq!(ping.text().await.expect("body"), "pong");

    let version = client
        .get(format!("{base}/version"))
        .send()
        .await
        .expect("version");
    let body: serde_json::Value = version.json().await.expect("version json");
    assert!(body["version"].is_string());

    let ready = client
        .get(format!("{base}/ready"))
        .send()
        .await
        .expect("ready");
    assert_eq!(ready.status().as_u16(), 200, "no streams means ready");
}

#[tokio::test]
async fn streams_endpoints_absent_outside_streams_mode() {
    let (base, _manager) = serve(false).await;
    let status = reqwest::get(format!("{base}/streams"))
        .await
        .expect("request")
        .status()
        .as_u16();
    assert_eq!(status, 404);
}

#[tokio::test]
async fn stream_crud_over_http() {
    let (base, manager) = serve(true).await;
    let client = reqwest::Client::new();

    // Create.
    let created = client
        .post(format!("{base}/streams/api_stream"))
        .body(STREAM_BODY)
        .send()
        .await
        .expect("create");
    assert_eq!(created.status().as_u16(), 200);

    // Duplicate create conflicts.
    let duplicate = client
        .post(format!("{base}/streams/api_stream"))
        .body(STREAM_BODY)
        .send()
        .await
        .expect("duplicate create");
    assert_eq!(duplicate.status().as_u16(), 409);

    // Read back a sanitised config.
    let fetched: serde_json::Value = client
        .get(format!("{base}/streams/api_stream"))
        .send()
        .await
        .expect("get stream")
        .json()
        .await
        .expect("stream json");
    assert_eq!(fetched["input"]["type"], "generate");

    // List includes it.
    let listing: serde_json::Value = client
        .get(format!("{base}/streams"))
        .send()
        .await
        .expect("list")
        .json()
        .await
        .expect("list json");
    assert!(listing.get("api_stream").is_some());

    // Update with a broken config is a 400 and leaves the stream alone.
    let bad = client
        .put(format!("{base}/streams/api_stream"))
        .body("input:\n  type: nonsense\noutput:\n  type: drop\n")
        .send()
        .await
        .expect("bad update");
    assert_eq!(bad.status().as_u16(), 400);
    assert_eq!(manager.stream_count(), 1);

    // Delete.
    let deleted = client
        .delete(format!("{base}/streams/api_stream"))
        .send()
        .await
        .expect("delete");
    assert_eq!(deleted.status().as_u16(), 200);

    let missing = client
        .get(format!("{base}/streams/api_stream"))
        .send()
        .await
        .expect("get missing");
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let (base, _manager) = serve(true).await;
    let status = reqwest::Client::new()
        .post(format!("{base}/streams/broken"))
        .body("{not yaml or json")
        .send()
        .await
        .expect("create")
        .status()
        .as_u16();
    assert_eq!(status, 400);
}
