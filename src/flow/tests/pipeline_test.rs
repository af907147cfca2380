use std::sync::Arc;
use std::time::Duration;

use flow::pipeline::Pipeline;
use flow::processor::{NoopProcessor, Processor, SplitProcessor};
use flow::transaction::{ErrorKind, Response, Transaction};
use flow::Message;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn recv_one(
    rx: &mut mpsc::Receiver<Transaction>,
) -> Transaction {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("downstream transaction within timeout")
        .expect("downstream channel open")
}

#[tokio::test]
async fn identity_chain_preserves_message_and_forwards_ack() {
    let processors: Vec<Arc<dyn Processor>> = vec![Arc::new(NoopProcessor::new())];
    let mut pipeline = Pipeline::from_processors(processors, 1);

    let (tx, rx) = mpsc::channel(4);
    let mut out = pipeline.start(rx).expect("start pipeline");

    let mut message = Message::from_bytes(["alpha".as_bytes().to_vec(), "beta".into()]);
    message.get_mut(0).expect("part").set_metadata("k", "v");

    let (transaction, response) = Transaction::new(message);
    tx.send(transaction).await.expect("send upstream");

    let downstream = recv_one(&mut out).await;
    assert_eq!(
        downstream.message.get_all_bytes(),
        vec![&b"alpha"[..], &b"beta"[..]],
        "identity chain must be byte-for-byte"
    );
    assert_eq!(
        downstream.message.get(0).expect("part").metadata("k"),
        Some("v"),
        "metadata preserved"
    );
    downstream.ack();

    assert_eq!(response.wait().await, Response::Ack);
}

#[tokio::test]
async fn fan_out_acks_only_when_every_branch_acks() {
    let processors: Vec<Arc<dyn Processor>> = vec![Arc::new(SplitProcessor::new())];
    let mut pipeline = Pipeline::from_processors(processors, 1);

    let (tx, rx) = mpsc::channel(4);
    let mut out = pipeline.start(rx).expect("start pipeline");

    // All branches ack: upstream sees Ack.
    let (transaction, response) =
        Transaction::new(Message::from_bytes(["a".as_bytes().to_vec(), "b".into()]));
    tx.send(transaction).await.expect("send upstream");
    recv_one(&mut out).await.ack();
    recv_one(&mut out).await.ack();
    assert_eq!(response.wait().await, Response::Ack);

    // One branch errors: the first non-ack wins.
    let (transaction, response) =
        Transaction::new(Message::from_bytes(["a".as_bytes().to_vec(), "b".into()]));
    tx.send(transaction).await.expect("send upstream");
    let first = recv_one(&mut out).await;
    let second = recv_one(&mut out).await;
    first.respond(Response::Error(ErrorKind::Processing, "boom".into()));
    second.ack();
    assert_eq!(
        response.wait().await,
        Response::Error(ErrorKind::Processing, "boom".into())
    );
}

#[tokio::test]
async fn dropped_message_acks_immediately_without_downstream() {
    let conf: flow::ComponentConfig = serde_json::from_value(serde_json::json!({
        "type": "filter",
        "condition": {"type": "static", "value": false},
    }))
    .expect("filter config");
    let filter =
        flow::registry::new_processor(&conf, &flow::NoopResources::shared()).expect("filter");
    let mut pipeline = Pipeline::from_processors(vec![filter], 1);

    let (tx, rx) = mpsc::channel(4);
    let mut out = pipeline.start(rx).expect("start pipeline");

    let (transaction, response) =
        Transaction::new(Message::from_bytes(["dropped".as_bytes().to_vec()]));
    tx.send(transaction).await.expect("send upstream");

    assert_eq!(
        response.wait().await,
        Response::Ack,
        "filtered messages are handled, not failed"
    );
    drop(tx);
    assert!(
        timeout(Duration::from_millis(200), out.recv())
            .await
            .expect("channel closes")
            .is_none(),
        "nothing reaches downstream for a dropped message"
    );
}

#[tokio::test]
async fn workers_drain_on_upstream_close() {
    let processors: Vec<Arc<dyn Processor>> = vec![Arc::new(NoopProcessor::new())];
    let mut pipeline = Pipeline::from_processors(processors, 4);

    let (tx, rx) = mpsc::channel(16);
    let mut out = pipeline.start(rx).expect("start pipeline");

    let mut responses = Vec::new();
    for i in 0..8 {
        let (transaction, response) =
            Transaction::new(Message::from_bytes([format!("m{i}").into_bytes()]));
        tx.send(transaction).await.expect("send upstream");
        responses.push(response);
    }
    drop(tx);

    for _ in 0..8 {
        recv_one(&mut out).await.ack();
    }
    for response in responses {
        assert_eq!(response.wait().await, Response::Ack);
    }

    pipeline
        .wait_for_close(Duration::from_secs(1))
        .await
        .expect("pipeline drains once upstream closes");
    assert!(
        timeout(Duration::from_millis(200), out.recv())
            .await
            .expect("closed")
            .is_none(),
        "downstream channel closes when drained"
    );
}
