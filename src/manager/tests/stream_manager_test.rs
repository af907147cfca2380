use std::io::Write;
use std::time::Duration;

use flow::stream::StreamConfig;
use flow::NoopResources;
use manager::{load_stream_configs_from_directory, StreamManager, StreamManagerError};
use serde_json::json;

fn drop_stream_config() -> StreamConfig {
    serde_json::from_value(json!({
        "input": {"type": "generate", "payload": "x", "interval": "50ms"},
        "output": {"type": "drop"},
    }))
    .expect("stream config")
}

fn new_manager() -> StreamManager {
    StreamManager::new(NoopResources::shared(), Duration::from_secs(2))
}

#[tokio::test]
async fn create_read_delete_lifecycle() {
    let manager = new_manager();
    manager
        .create("main", drop_stream_config())
        .expect("create stream");
    assert_eq!(manager.stream_count(), 1);
    assert!(manager.all_healthy());

    let config = manager.read("main").expect("read stream");
    assert_eq!(config["input"]["type"], json!("generate"));
    assert_eq!(config["output"]["type"], json!("drop"));

    manager.delete("main").await.expect("delete stream");
    assert_eq!(manager.stream_count(), 0);
    assert!(matches!(
        manager.read("main"),
        Err(StreamManagerError::NotFound(_))
    ));
}

#[tokio::test]
async fn duplicate_create_is_rejected() {
    let manager = new_manager();
    manager
        .create("dup", drop_stream_config())
        .expect("first create");
    let err = manager
        .create("dup", drop_stream_config())
        .expect_err("second create must fail");
    assert!(matches!(err, StreamManagerError::AlreadyExists(_)));
    manager.stop_all(Duration::from_secs(2)).await.expect("stop all");
}

#[tokio::test]
async fn update_swaps_configuration_atomically() {
    let manager = new_manager();
    manager
        .create("swap", drop_stream_config())
        .expect("create stream");

    let replacement: StreamConfig = serde_json::from_value(json!({
        "input": {"type": "generate", "payload": "y", "interval": "25ms"},
        "pipeline": {"processors": [{"type": "noop"}]},
        "output": {"type": "drop"},
    }))
    .expect("stream config");
    manager.update("swap", replacement).await.expect("update");

    let config = manager.read("swap").expect("read after update");
    assert_eq!(
        config["pipeline"]["processors"][0]["type"],
        json!("noop"),
        "replacement config visible after swap"
    );
    manager.stop_all(Duration::from_secs(2)).await.expect("stop all");
}

#[tokio::test]
async fn update_rolls_back_on_start_failure() {
    let manager = new_manager();
    manager
        .create("rollback", drop_stream_config())
        .expect("create stream");

    let broken: StreamConfig = serde_json::from_value(json!({
        "input": {"type": "no_such_input"},
        "output": {"type": "drop"},
    }))
    .expect("stream config parses; construction fails");
    let err = manager
        .update("rollback", broken)
        .await
        .expect_err("broken update must fail");
    assert!(matches!(err, StreamManagerError::StartFailed { .. }));

    // The original stream keeps running.
    assert!(manager.all_healthy());
    assert_eq!(manager.stream_count(), 1);
    manager.stop_all(Duration::from_secs(2)).await.expect("stop all");
}

#[tokio::test]
async fn update_of_missing_stream_is_not_found() {
    let manager = new_manager();
    let err = manager
        .update("ghost", drop_stream_config())
        .await
        .expect_err("missing stream");
    assert!(matches!(err, StreamManagerError::NotFound(_)));
}

#[test]
fn directory_loader_maps_filenames_to_ids() {
    let dir = tempfile::tempdir().expect("temp dir");

    let yaml = b"input:\n  type: generate\n  payload: a\noutput:\n  type: drop\n";
    std::fs::File::create(dir.path().join("first.yaml"))
        .expect("create yaml")
        .write_all(yaml)
        .expect("write yaml");

    let json_body = br#"{"input":{"type":"generate","payload":"b"},"output":{"type":"drop"}}"#;
    std::fs::File::create(dir.path().join("second.json"))
        .expect("create json")
        .write_all(json_body)
        .expect("write json");

    std::fs::File::create(dir.path().join("notes.txt"))
        .expect("create txt")
        .write_all(b"ignored")
        .expect("write txt");

    let configs = load_stream_configs_from_directory(dir.path()).expect("load configs");
    assert_eq!(configs.len(), 2, "only yaml/json files count");
    assert!(configs.contains_key("first"));
    assert!(configs.contains_key("second"));
    assert_eq!(configs["first"].input.kind, "generate");
}

#[test]
fn directory_loader_rejects_bad_config() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::File::create(dir.path().join("broken.yaml"))
        .expect("create yaml")
        .write_all(b"input: [not, a, component]\n")
        .expect("write yaml");

    let err = load_stream_configs_from_directory(dir.path()).expect_err("broken config");
    assert!(matches!(err, StreamManagerError::Load(_)));
}
