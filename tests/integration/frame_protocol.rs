//! Integration tests for network frame normalization and routing

use serde_json::{json, Value};
use uniform::frame::{
    apply_message_hooks, build_frame_log_key, normalize_frame, normalize_frame_from,
    normalize_socket_frame, normalize_tunnel_frame, resolve_tunnel_target, route_raw,
    DeliveryMode, HookOutcome, MatchSource, MessageHook, NetworkTransport, PeerProfile, Route,
    RoutingContext, TunnelRouteMeta,
};

#[test]
fn test_degenerate_inputs_get_every_default() {
    for raw in [Value::Null, json!({}), json!([1, 2]), json!(42), json!("frame"), json!(true)] {
        let frame = normalize_frame(&raw, "");
        assert_eq!(frame.frame_type, "dispatch", "input {raw}");
        assert_eq!(frame.from, "unknown", "input {raw}");
        assert_eq!(frame.to, "broadcast", "input {raw}");
        assert_eq!(frame.namespace, "default", "input {raw}");
        assert_eq!(frame.mode, "blind", "input {raw}");
        assert_eq!(frame.payload, json!({}), "input {raw}");
        assert!(frame.is_broadcast());
    }
}

#[test]
fn test_target_precedence() {
    assert_eq!(normalize_frame(&json!({"to": "x", "target": "y"}), "s").to, "x");
    assert_eq!(normalize_frame(&json!({"target": "y"}), "s").to, "y");
    assert_eq!(normalize_frame(&json!({"targetId": "t1", "deviceId": "d1"}), "s").to, "t1");
    assert_eq!(normalize_frame(&json!({"target_id": "t2", "deviceId": "d1"}), "s").to, "t2");
    assert_eq!(normalize_frame(&json!({"deviceId": "d1"}), "s").to, "d1");
    assert_eq!(normalize_frame(&json!({"to": "", "target": "  "}), "s").to, "broadcast");
    assert_eq!(normalize_frame(&json!({}), "s").to, "broadcast");
}

#[test]
fn test_broadcast_detection() {
    assert!(normalize_frame(&json!({"broadcast": true, "to": "device-1"}), "s").is_broadcast());
    assert!(normalize_frame(&json!({"to": "ALL"}), "s").is_broadcast());
    assert!(normalize_frame(&json!({"to": "*"}), "s").is_broadcast());
    assert!(!normalize_frame(&json!({"to": "device-1"}), "s").is_broadcast());
    assert!(!normalize_frame(&json!({"broadcast": false, "to": "device-1"}), "s").is_broadcast());
}

#[test]
fn test_payload_precedence() {
    assert_eq!(normalize_frame(&json!({"payload": 1, "data": 2}), "s").payload, json!(1));
    assert_eq!(normalize_frame(&json!({"data": 2, "body": 3}), "s").payload, json!(2));
    assert_eq!(normalize_frame(&json!({"body": 3, "message": 4}), "s").payload, json!(3));
    assert_eq!(normalize_frame(&json!({"message": "hi"}), "s").payload, json!("hi"));
    assert_eq!(normalize_frame(&json!({"payload": 0, "data": 2}), "s").payload, json!(0));
    assert_eq!(normalize_frame(&json!({"payload": null, "data": 2}), "s").payload, Value::Null);

    let raw = json!({"kind": "chat", "to": "peer"});
    assert_eq!(normalize_frame(&raw, "s").payload, raw);
}

#[test]
fn test_losing_body_fields_stay_in_extra() {
    let frame = normalize_frame(&json!({"payload": 1, "data": 2, "ts": 99}), "s");
    assert_eq!(frame.extra.get("data"), Some(&json!(2)));
    assert_eq!(frame.extra.get("ts"), Some(&json!(99)));
    assert!(!frame.extra.contains_key("payload"));
}

#[test]
fn test_type_from_namespace_and_mode_fallbacks() {
    let frame = normalize_frame(
        &json!({"action": "sync", "ns": "clipboard", "mode": "  secure  "}),
        "peer-7",
    );
    assert_eq!(frame.frame_type, "sync");
    assert_eq!(frame.from, "peer-7");
    assert_eq!(frame.namespace, "clipboard");
    assert_eq!(frame.mode, "secure");
    assert_eq!(frame.delivery_mode(), DeliveryMode::Secure);

    let explicit = normalize_frame(&json!({"type": "t", "action": "a", "from": "me"}), "peer-7");
    assert_eq!(explicit.frame_type, "t");
    assert_eq!(explicit.from, "me");
}

#[test]
fn test_log_key_shape() {
    let frame = normalize_frame(
        &json!({"type": "chat", "to": "dev-2", "namespace": "ui", "mode": "relay"}),
        "dev-1",
    );
    assert_eq!(build_frame_log_key(&frame), "dev-1=>dev-2/ui/chat/relay");
    assert_eq!(frame.log_key(), build_frame_log_key(&frame));
}

#[test]
fn test_transport_stamp_overrides_raw_field() {
    let frame = normalize_frame_from(
        NetworkTransport::Tunnel,
        &json!({"transport": "ws", "to": "x"}),
        "s",
    );
    assert_eq!(frame.transport, Some(NetworkTransport::Tunnel));
    assert!(!frame.extra.contains_key("transport"));

    let value = frame.to_value();
    assert_eq!(value["transport"], "tunnel");
    assert_eq!(value["type"], "dispatch");
}

#[test]
fn test_socket_frame_gets_routing_overlay() {
    let ctx = RoutingContext {
        node_id: Some("node-1".into()),
        gateway_id: Some("gw-1".into()),
        ..Default::default()
    };
    let frame = normalize_socket_frame(
        NetworkTransport::SocketIo,
        &json!({"to": "dev-9", "data": {"n": 1}}),
        "dev-3",
        &ctx,
    );
    assert_eq!(frame.transport, Some(NetworkTransport::SocketIo));
    assert_eq!(frame.extra.get("nodeId"), Some(&json!("node-1")));
    assert_eq!(frame.extra.get("gatewayId"), Some(&json!("gw-1")));
    assert!(!frame.extra.contains_key("peerId"));
}

#[test]
fn test_tunnel_frame_records_hop() {
    let meta = TunnelRouteMeta {
        hop_id: Some("hop-2".into()),
        via: Some("relay-a".into()),
    };
    let frame = normalize_tunnel_frame(&json!({"to": "dev-1"}), "dev-0", Some(&meta));
    assert_eq!(frame.transport, Some(NetworkTransport::Tunnel));
    assert_eq!(frame.to, "dev-1");
    assert_eq!(frame.extra.get("hopId"), Some(&json!("hop-2")));
    assert_eq!(frame.extra.get("via"), Some(&json!("relay-a")));

    let bare = normalize_tunnel_frame(&json!({"to": "dev-1"}), "dev-0", None);
    assert_eq!(bare.transport, Some(NetworkTransport::Tunnel));
}

#[test]
fn test_hook_chain_can_replace_and_drop() {
    let frame = normalize_frame(&json!({"to": "dev-1", "payload": "secret"}), "dev-0");

    let hooks: Vec<MessageHook<String>> = vec![
        Box::new(|frame: &uniform::frame::NormalizedFrame, tag: &String| {
            let mut next = frame.clone();
            next.extra.insert("tag".into(), json!(tag));
            HookOutcome::Replace(next)
        }),
        Box::new(|_: &uniform::frame::NormalizedFrame, _: &String| HookOutcome::Continue),
    ];
    let out = apply_message_hooks(&hooks, frame.clone(), &"seen".to_string())
        .expect("frame kept");
    assert_eq!(out.extra.get("tag"), Some(&json!("seen")));

    let dropping: Vec<MessageHook<String>> = vec![Box::new(
        |frame: &uniform::frame::NormalizedFrame, _: &String| {
            if frame.payload == json!("secret") {
                HookOutcome::Drop
            } else {
                HookOutcome::Continue
            }
        },
    )];
    assert!(apply_message_hooks(&dropping, frame, &String::new()).is_none());
}

#[test]
fn test_tunnel_target_resolution_order() {
    let peers = vec![
        PeerProfile::new("dev-laptop").with_label("Work Laptop"),
        PeerProfile::new("dev-phone").with_label("Phone"),
    ];

    let by_id = resolve_tunnel_target(&peers, "DEV-PHONE").unwrap();
    assert_eq!(by_id.profile.id, "dev-phone");
    assert_eq!(by_id.source, MatchSource::Id);

    let by_label = resolve_tunnel_target(&peers, "work laptop").unwrap();
    assert_eq!(by_label.profile.id, "dev-laptop");
    assert_eq!(by_label.source, MatchSource::ExactLabel);

    let partial = resolve_tunnel_target(&peers, "laptop").unwrap();
    assert_eq!(partial.profile.id, "dev-laptop");
    assert_eq!(partial.source, MatchSource::ContainsLabel);

    assert!(resolve_tunnel_target(&peers, "tablet").is_none());
}

#[test]
fn test_route_raw_for_dispatch() {
    assert_eq!(route_raw(&json!({"to": "all"}), "s"), Route::Broadcast);
    assert_eq!(
        route_raw(&json!({"deviceId": "dev-4"}), "s"),
        Route::Direct("dev-4".to_string())
    );
}
