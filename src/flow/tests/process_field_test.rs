use flow::component::ComponentConfig;
use flow::registry::new_processor;
use flow::resources::NoopResources;
use flow::{Message, Processor};
use serde_json::json;

fn build(config: serde_json::Value) -> std::sync::Arc<dyn flow::Processor> {
    let conf: ComponentConfig = serde_json::from_value(config).expect("component config");
    new_processor(&conf, &NoopResources::shared()).expect("build processor")
}

fn payloads(message: &Message) -> Vec<Vec<u8>> {
    message.get_all_bytes().iter().map(|b| b.to_vec()).collect()
}

#[test]
fn parts_selector_only_rewrites_selected_part() {
    let proc = build(json!({
        "type": "process_field",
        "path": "foo.bar",
        "parts": [1],
        "processors": [
            {"type": "json", "operator": "select", "path": "baz"},
        ],
    }));

    let out = proc.process(Message::from_bytes([
        br#"{"foo":{"bar":{"baz":"original"}}}"#.to_vec(),
        br#"{"foo":{"bar":{"baz":"put me at the root"}}}"#.to_vec(),
        br#"{"foo":{"bar":{"baz":"original"}}}"#.to_vec(),
    ]));

    assert_eq!(out.messages.len(), 1);
    assert_eq!(
        payloads(&out.messages[0]),
        vec![
            br#"{"foo":{"bar":{"baz":"original"}}}"#.to_vec(),
            br#"{"foo":{"bar":"put me at the root"}}"#.to_vec(),
            br#"{"foo":{"bar":{"baz":"original"}}}"#.to_vec(),
        ]
    );
}

#[test]
fn empty_parts_set_means_all_parts() {
    let proc = build(json!({
        "type": "process_field",
        "path": "foo.bar",
        "parts": [],
        "processors": [
            {"type": "json", "operator": "select", "path": "baz"},
        ],
    }));

    let out = proc.process(Message::from_bytes([
        br#"{"foo":{"bar":{"baz":"put me at the root"}}}"#.to_vec(),
        br#"{"foo":{"bar":{"baz":"put me at the root"}}}"#.to_vec(),
    ]));

    assert_eq!(
        payloads(&out.messages[0]),
        vec![
            br#"{"foo":{"bar":"put me at the root"}}"#.to_vec(),
            br#"{"foo":{"bar":"put me at the root"}}"#.to_vec(),
        ]
    );
}

#[test]
fn result_type_codecs() {
    struct Case {
        codec: &'static str,
        input: &'static [u8],
        output: &'static [u8],
    }
    let cases = [
        Case {
            codec: "string",
            input: br#"{"target":"foobar"}"#,
            output: br#"{"target":"foobar"}"#,
        },
        Case {
            codec: "int",
            input: br#"{"target":"5"}"#,
            output: br#"{"target":5}"#,
        },
        Case {
            codec: "float",
            input: br#"{"target":"5.67"}"#,
            output: br#"{"target":5.67}"#,
        },
        Case {
            codec: "bool",
            input: br#"{"target":"true"}"#,
            output: br#"{"target":true}"#,
        },
        Case {
            codec: "bool",
            input: br#"{"target":"false"}"#,
            output: br#"{"target":false}"#,
        },
        Case {
            codec: "object",
            input: br#"{"target":"{\"foo\":{\"bar\":\"baz\"}}"}"#,
            output: br#"{"target":{"foo":{"bar":"baz"}}}"#,
        },
        Case {
            codec: "object",
            input: br#"{"target":"null"}"#,
            output: br#"{"target":null}"#,
        },
        Case {
            codec: "array",
            input: br#"{"target":"[1,2,\"foo\"]"}"#,
            output: br#"{"target":[1,2,"foo"]}"#,
        },
    ];

    for case in cases {
        let proc = build(json!({
            "type": "process_field",
            "path": "target",
            "result_type": case.codec,
            "processors": [{"type": "noop"}],
        }));
        let out = proc.process(Message::from_bytes([case.input.to_vec()]));
        assert_eq!(
            payloads(&out.messages[0]),
            vec![case.output.to_vec()],
            "codec {}",
            case.codec
        );
    }
}

#[test]
fn codec_parse_failure_leaves_part_unchanged() {
    let proc = build(json!({
        "type": "process_field",
        "path": "target",
        "result_type": "int",
        "processors": [{"type": "noop"}],
    }));
    let out = proc.process(Message::from_bytes([br#"{"target":"not a number"}"#.to_vec()]));
    assert_eq!(
        payloads(&out.messages[0]),
        vec![br#"{"target":"not a number"}"#.to_vec()]
    );
}

#[test]
fn inner_chain_changing_part_count_is_ignored() {
    // archive collapses the synthetic message to one part, which no
    // longer matches the two-part selection.
    let proc = build(json!({
        "type": "process_field",
        "path": "foo.bar",
        "processors": [{"type": "archive"}],
    }));
    let inputs = [
        br#"{"foo":{"bar":"encode me"}}"#.to_vec(),
        br#"{"foo":{"bar":"encode me too"}}"#.to_vec(),
    ];
    let out = proc.process(Message::from_bytes(inputs.clone()));
    assert_eq!(payloads(&out.messages[0]), inputs.to_vec());
    assert_eq!(out.response, None, "no error response for the guard path");
}

#[test]
fn inner_chain_dropping_message_is_ignored() {
    let proc = build(json!({
        "type": "process_field",
        "path": "foo.bar",
        "processors": [
            {"type": "filter", "condition": {"type": "static", "value": false}},
        ],
    }));
    let inputs = [
        br#"{"foo":{"bar":"encode me"}}"#.to_vec(),
        br#"{"foo":{"bar":"encode me too"}}"#.to_vec(),
    ];
    let out = proc.process(Message::from_bytes(inputs.clone()));
    assert_eq!(out.messages.len(), 1, "original message survives");
    assert_eq!(payloads(&out.messages[0]), inputs.to_vec());
}

#[test]
fn discard_round_trip_is_identity() {
    let proc = build(json!({
        "type": "process_field",
        "path": "foo.bar",
        "result_type": "discard",
        "processors": [{"type": "text", "operator": "to_upper"}],
    }));
    let inputs = [
        br#"{"foo":{"bar":"encode me"}}"#.to_vec(),
        br#"{"foo":{"bar":"encode me too"}}"#.to_vec(),
    ];
    let out = proc.process(Message::from_bytes(inputs.clone()));
    assert_eq!(payloads(&out.messages[0]), inputs.to_vec());
}
