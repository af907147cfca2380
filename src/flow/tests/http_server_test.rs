use std::time::Duration;

use flow::input::{http_server::HttpServerConfig, HttpServerInput, Input};
use flow::transaction::Response;
use tokio::time::timeout;

fn server_config(address: &str) -> HttpServerConfig {
    serde_json::from_value(serde_json::json!({
        "address": address,
        "path": "/testpost",
    }))
    .expect("http server config")
}

#[tokio::test]
async fn single_part_round_trip_with_sync_response() {
    let mut input = HttpServerInput::new(server_config("localhost:1243")).expect("start input");
    let mut transactions = input.take_transactions().expect("claim stream");
    tokio::time::sleep(Duration::from_millis(200)).await;

    let client = tokio::spawn(async {
        let res = reqwest::Client::new()
            .post("http://localhost:1243/testpost")
            .header("Content-Type", "application/octet-stream")
            .body("test0")
            .send()
            .await
            .expect("post");
        (res.status().as_u16(), res.text().await.expect("body"))
    });

    let transaction = timeout(Duration::from_secs(1), transactions.recv())
        .await
        .expect("transaction within timeout")
        .expect("transaction present");
    let (mut message, reply) = transaction.into_parts();
    assert_eq!(message.len(), 1);
    assert_eq!(message.get(0).expect("part").as_bytes(), b"test0");

    message
        .get_mut(0)
        .expect("part")
        .set_bytes(&b"response0"[..]);
    message.set_as_response();
    reply.send(Response::Ack);

    let (status, body) = client.await.expect("client task");
    assert_eq!(status, 200);
    assert_eq!(body, "response0", "sync response body must be returned");

    input.close_async();
    input
        .wait_for_close(Duration::from_secs(5))
        .await
        .expect("close within deadline");
}

#[tokio::test]
async fn multipart_round_trip() {
    let mut input = HttpServerInput::new(server_config("localhost:1244")).expect("start input");
    let mut transactions = input.take_transactions().expect("claim stream");
    tokio::time::sleep(Duration::from_millis(200)).await;

    let body = "--foo\r\n\
        Content-Type: application/octet-stream\r\n\r\n\
        test0 part one\r\n\
        --foo\r\n\
        Content-Type: application/octet-stream\r\n\r\n\
        test0 part two\r\n\
        --foo--\r\n";

    let client = tokio::spawn(async move {
        reqwest::Client::new()
            .post("http://localhost:1244/testpost")
            .header("Content-Type", "multipart/mixed; boundary=foo")
            .body(body)
            .send()
            .await
            .expect("post")
            .status()
            .as_u16()
    });

    let transaction = timeout(Duration::from_secs(1), transactions.recv())
        .await
        .expect("transaction within timeout")
        .expect("transaction present");
    assert_eq!(transaction.message.len(), 2, "two multipart sections");
    assert_eq!(
        transaction.message.get(0).expect("part").as_bytes(),
        b"test0 part one"
    );
    assert_eq!(
        transaction.message.get(1).expect("part").as_bytes(),
        b"test0 part two"
    );
    transaction.ack();

    assert_eq!(client.await.expect("client task"), 200);

    input.close_async();
    input
        .wait_for_close(Duration::from_secs(5))
        .await
        .expect("close within deadline");
}

#[tokio::test]
async fn non_post_method_is_rejected() {
    let input = HttpServerInput::new(server_config("localhost:1233")).expect("start input");
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = reqwest::get("http://localhost:1233/testpost")
        .await
        .expect("get")
        .status()
        .as_u16();
    assert_eq!(status, 405);

    input.close_async();
    input
        .wait_for_close(Duration::from_secs(5))
        .await
        .expect("close within deadline");
}

#[tokio::test]
async fn unanswered_transaction_times_out_with_408() {
    let config: HttpServerConfig = serde_json::from_value(serde_json::json!({
        "address": "localhost:1232",
        "path": "/testpost",
        "timeout": "1ms",
    }))
    .expect("http server config");
    let mut input = HttpServerInput::new(config).expect("start input");
    let mut transactions = input.take_transactions().expect("claim stream");
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = reqwest::Client::new()
        .post("http://localhost:1232/testpost")
        .header("Content-Type", "application/octet-stream")
        .body("hello world")
        .send()
        .await
        .expect("post")
        .status()
        .as_u16();
    assert_eq!(status, 408, "unanswered transaction must time out");

    // The transaction was still emitted; its late response is dropped
    // harmlessly.
    let transaction = timeout(Duration::from_secs(1), transactions.recv())
        .await
        .expect("transaction within timeout")
        .expect("transaction present");
    transaction.ack();

    input.close_async();
    input
        .wait_for_close(Duration::from_secs(5))
        .await
        .expect("close within deadline");
}
