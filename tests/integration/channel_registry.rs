//! Integration tests for ChannelRegistry scope lifecycle

use serde_json::json;
use std::sync::Arc;
use uniform::channel::{ChannelConfig, ChannelOptions};
use uniform::context::ExecutionContext;
use uniform::error::ChannelError;
use uniform::factory::ChannelFactory;
use uniform::health::{HealthMonitor, HealthSettings};
use uniform::registry::{ChannelRegistry, RegistrySettings};
use uniform::telemetry::EventBus;
use uniform::transport::{TransportDescriptor, TransportKind, WorkerPort};

use super::test_utils::echo_handler;

fn registry_for(context: ExecutionContext) -> ChannelRegistry {
    ChannelRegistry::new(
        Arc::new(ChannelFactory::new(context)),
        HealthMonitor::new(HealthSettings::default()),
        RegistrySettings::default(),
    )
}

fn echo_config(name: &str) -> ChannelConfig {
    ChannelConfig::new(name, TransportDescriptor::InProcess(echo_handler()))
}

#[tokio::test]
async fn test_register_get_and_request() {
    let registry = registry_for(ExecutionContext::Main);
    let registration = registry.register_scope("view-A", vec![echo_config("clipboard")]);
    assert_eq!(registration.channels, vec!["clipboard".to_string()]);
    assert!(registration.unavailable.is_empty());

    registry.wait_for_scope("view-A").await;
    assert!(registry.is_scope_settled("view-A"));

    let channel = registry.get("view-A", "clipboard").expect("registered");
    let response = channel.request("doCopy", vec![json!("text")]).await.unwrap();
    assert_eq!(response["data"], "text");

    assert!(registry.get("view-A", "missing").is_none());
    assert!(registry.get("view-B", "clipboard").is_none());
}

#[tokio::test]
async fn test_unsupported_transport_is_skipped_not_fatal() {
    let events = EventBus::new();
    let mut rx = events.subscribe();
    let registry = registry_for(ExecutionContext::Main).with_event_bus(events);

    let registration = registry.register_scope(
        "view-A",
        vec![
            echo_config("clipboard"),
            ChannelConfig::new("background", TransportDescriptor::Extension),
        ],
    );
    assert_eq!(registration.channels.len(), 2);
    assert_eq!(registration.unavailable, vec!["background".to_string()]);

    let mut saw_unavailable = false;
    while let Ok(event) = rx.try_recv() {
        if event.event_type == "channel_unavailable" {
            assert_eq!(event.data["key"], "view-A:background");
            assert_eq!(event.data["transport"], "extension");
            saw_unavailable = true;
        }
    }
    assert!(saw_unavailable);

    let stub = registry.get("view-A", "background").unwrap();
    assert_eq!(stub.status().transport, TransportKind::Extension);
    let err = stub.request("capture", vec![]).await.unwrap_err();
    assert!(matches!(err, ChannelError::TransportUnavailable { .. }));

    let working = registry.get("view-A", "clipboard").unwrap();
    assert!(working.request("capture", vec![]).await.is_ok());
}

#[tokio::test]
async fn test_close_scope_is_idempotent_and_isolated() {
    let registry = registry_for(ExecutionContext::Main);
    registry.register_scope("view-A", vec![echo_config("a1"), echo_config("a2")]);
    registry.register_scope("view-B", vec![echo_config("b1")]);

    let a1 = registry.get("view-A", "a1").unwrap();

    assert_eq!(registry.close_scope("view-A"), 2);
    assert_eq!(registry.close_scope("view-A"), 0);
    assert_eq!(registry.close_scope("never-registered"), 0);

    assert!(a1.is_closed());
    assert!(matches!(
        a1.request("capture", vec![]).await,
        Err(ChannelError::Cancelled { .. })
    ));
    assert!(registry.get("view-A", "a1").is_none());

    assert_eq!(registry.list_scopes(), vec!["view-B".to_string()]);
    assert_eq!(registry.list_channel_names(), vec!["view-B:b1".to_string()]);
    assert_eq!(registry.monitor().keys(), vec!["view-B:b1".to_string()]);
    assert!(registry.get("view-B", "b1").unwrap().request("ping", vec![]).await.is_ok());
}

#[tokio::test]
async fn test_reregistering_a_scope_replaces_its_channels() {
    let registry = registry_for(ExecutionContext::Main);
    registry.register_scope("view-A", vec![echo_config("old")]);
    let old = registry.get("view-A", "old").unwrap();

    registry.register_scope("view-A", vec![echo_config("new")]);

    assert!(old.is_closed());
    assert!(registry.get("view-A", "old").is_none());
    assert!(registry.get("view-A", "new").is_some());
    assert_eq!(registry.scope_channels("view-A"), vec!["new".to_string()]);
}

#[tokio::test]
async fn test_duplicate_names_in_one_scope_keep_the_last() {
    let registry = registry_for(ExecutionContext::Main);
    let registration = registry.register_scope(
        "view-A",
        vec![
            echo_config("dup").with_timeout_ms(1_000),
            echo_config("dup").with_timeout_ms(2_000),
        ],
    );
    assert_eq!(registration.channels, vec!["dup".to_string()]);
    assert_eq!(registry.list_channel_names(), vec!["view-A:dup".to_string()]);
    assert_eq!(
        registry.get("view-A", "dup").unwrap().options().timeout_ms,
        Some(2_000)
    );
}

#[tokio::test]
async fn test_defaults_fill_unset_options() {
    let settings = RegistrySettings {
        defaults: ChannelOptions {
            timeout_ms: Some(7_000),
            retries: Some(3),
            retry_delay_ms: Some(50),
            ..Default::default()
        },
        ..Default::default()
    };
    let registry = ChannelRegistry::new(
        Arc::new(ChannelFactory::new(ExecutionContext::Main)),
        HealthMonitor::default(),
        settings,
    );
    registry.register_scope(
        "view-A",
        vec![echo_config("c").with_options(ChannelOptions {
            retries: Some(0),
            ..Default::default()
        })],
    );

    let options = registry.get("view-A", "c").unwrap().options().clone();
    assert_eq!(options.timeout_ms, Some(7_000));
    assert_eq!(options.retries, Some(0));
    assert_eq!(options.retry_delay_ms, Some(50));
}

#[tokio::test]
async fn test_status_combines_queue_and_health() {
    let registry = registry_for(ExecutionContext::Main);
    registry.register_scope("view-A", vec![echo_config("clipboard")]);
    registry.wait_for_scope("view-A").await;

    let status = registry.status();
    assert_eq!(status.context, ExecutionContext::Main);
    assert!(status.scopes["view-A"].settled);

    let channel = &status.channels["view-A:clipboard"];
    assert!(channel.queue.ready);
    assert_eq!(channel.queue.transport, TransportKind::InProcess);
    assert!(channel.health.as_ref().unwrap().healthy);

    assert_eq!(registry.close_all(), 1);
    assert!(registry.list_scopes().is_empty());
}

#[tokio::test]
async fn test_close_scope_reports_cancelled_queue_depth() {
    let events = EventBus::new();
    let mut rx = events.subscribe();
    let registry = registry_for(ExecutionContext::Main).with_event_bus(events);

    let (port, _endpoint) = WorkerPort::pair();
    registry.register_scope(
        "view-A",
        vec![ChannelConfig::new("ocr", TransportDescriptor::Worker(port))],
    );
    let ocr = registry.get("view-A", "ocr").unwrap();
    assert!(!ocr.is_ready());
    let first = ocr.request("capture", vec![]);
    let second = ocr.request("capture", vec![]);

    assert_eq!(registry.close_scope("view-A"), 1);
    assert!(matches!(first.await, Err(ChannelError::Cancelled { .. })));
    assert!(matches!(second.await, Err(ChannelError::Cancelled { .. })));

    let mut closed = None;
    while let Ok(event) = rx.try_recv() {
        if event.event_type == "channel_closed" {
            closed = Some(event.data);
        }
    }
    let closed = closed.expect("channel_closed event");
    assert_eq!(closed["key"], "view-A:ocr");
    assert_eq!(closed["transport"], "worker");
    assert_eq!(closed["queued"], 2);
}
