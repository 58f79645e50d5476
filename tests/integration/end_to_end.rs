//! End-to-end scenarios across context, factory, registry, queue and monitor

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uniform::channel::{methods, ChannelConfig};
use uniform::config::{ContextConfig, UniformConfig};
use uniform::context::ExecutionContext;
use uniform::error::ChannelError;
use uniform::factory::ChannelFactory;
use uniform::health::HealthMonitor;
use uniform::registry::{ChannelRegistry, RegistrySettings};
use uniform::transport::{TransportDescriptor, TransportKind};

use super::test_utils::echo_handler;

#[tokio::test(start_paused = true)]
async fn test_unsupported_transport_in_unknown_context() {
    let settings = RegistrySettings {
        health_interval: Duration::from_secs(1),
        ..Default::default()
    };
    let registry = ChannelRegistry::new(
        Arc::new(ChannelFactory::new(ExecutionContext::Unknown)),
        HealthMonitor::default(),
        settings,
    );

    let registration = registry.register_scope(
        "view-A",
        vec![ChannelConfig::new("ch", TransportDescriptor::Extension)],
    );
    assert_eq!(registration.unavailable, vec!["ch".to_string()]);

    let channel = registry.get("view-A", "ch").expect("stub registered");
    match channel.request(methods::PING, vec![json!({})]).await {
        Err(ChannelError::TransportUnavailable {
            channel,
            transport,
            context,
            ..
        }) => {
            assert_eq!(channel, "ch");
            assert_eq!(transport, TransportKind::Extension);
            assert_eq!(context, ExecutionContext::Unknown);
        }
        other => panic!("expected TransportUnavailable, got {:?}", other),
    }

    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let statuses = registry.get_all_health_statuses();
    let record = &statuses["view-A:ch"];
    assert!(!record.healthy);
    assert!(record.consecutive_failures >= 1);
    assert!(record.last_error.as_deref().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn test_registry_wired_from_config() {
    let mut config = UniformConfig::default();
    config.context = ContextConfig {
        execution_context: Some("main".to_string()),
        dedicated_workers: None,
    };
    config.channels.timeout_ms = 2_500;
    config.health.failure_threshold = 2;

    let factory = Arc::new(ChannelFactory::from_config(&config.context));
    assert_eq!(factory.context(), ExecutionContext::Main);

    let registry = ChannelRegistry::from_config(factory, &config);
    assert_eq!(registry.monitor().settings().failure_threshold, 2);

    registry.register_scope(
        "popup",
        vec![ChannelConfig::new("echo", TransportDescriptor::InProcess(echo_handler()))],
    );
    registry.wait_for_scope("popup").await;

    let channel = registry.get("popup", "echo").unwrap();
    assert_eq!(channel.options().timeout_ms, Some(2_500));
    let response = channel
        .request(methods::PROCESS_TEXT, vec![json!("hello")])
        .await
        .unwrap();
    assert_eq!(response["method"], "processText");
    assert!(registry.get_all_health_statuses()["popup:echo"].healthy);
}
