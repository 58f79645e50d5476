//! Integration tests for HealthMonitor probing

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uniform::health::{HealthMonitor, HealthProbe, HealthSettings};

/// Probe whose outcome the test flips between checks.
struct Switch {
    up: AtomicBool,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl HealthProbe for Switch {
    async fn probe(&self) -> Result<(), String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.up.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err("no pong".to_string())
        }
    }
}

fn switch(up: bool) -> Arc<Switch> {
    Arc::new(Switch {
        up: AtomicBool::new(up),
        calls: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn test_one_failure_marks_unhealthy_and_success_recovers() {
    let monitor = HealthMonitor::default();
    let probe = switch(false);
    monitor.register_health_check("view-A:ocr", probe.clone(), Duration::from_secs(30));

    let record = monitor.check_now("view-A:ocr").await.unwrap();
    assert!(!record.healthy);
    assert_eq!(record.consecutive_failures, 1);
    assert_eq!(record.last_error.as_deref(), Some("no pong"));

    monitor.check_now("view-A:ocr").await;
    assert_eq!(monitor.get_health("view-A:ocr").unwrap().consecutive_failures, 2);

    probe.up.store(true, Ordering::SeqCst);
    let record = monitor.check_now("view-A:ocr").await.unwrap();
    assert!(record.healthy);
    assert_eq!(record.consecutive_failures, 0);
    assert!(record.last_error.is_none());
    assert!(record.last_checked_at.is_some());
}

#[tokio::test]
async fn test_threshold_delays_unhealthy_verdict() {
    let monitor = HealthMonitor::new(HealthSettings {
        failure_threshold: 2,
        ..Default::default()
    });
    let probe = switch(true);
    monitor.register_health_check("k", probe.clone(), Duration::from_secs(30));
    assert!(monitor.check_now("k").await.unwrap().healthy);

    probe.up.store(false, Ordering::SeqCst);
    assert!(monitor.check_now("k").await.unwrap().healthy);
    assert!(!monitor.check_now("k").await.unwrap().healthy);
}

#[tokio::test(start_paused = true)]
async fn test_timer_probes_each_interval() {
    let monitor = HealthMonitor::default();
    let probe = switch(true);
    monitor.register_health_check("k", probe.clone(), Duration::from_secs(10));

    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    assert!(monitor.get_health("k").unwrap().healthy);

    assert!(monitor.unregister("k"));
    assert!(monitor.get_health("k").is_none());
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    assert!(!monitor.unregister("k"));
}

#[tokio::test(start_paused = true)]
async fn test_hung_probe_times_out_without_blocking_others() {
    let monitor = HealthMonitor::new(HealthSettings {
        probe_timeout: Duration::from_secs(1),
        ..Default::default()
    });
    let hung: Arc<dyn HealthProbe> = Arc::new(|| async {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok::<(), String>(())
    });
    let fine = switch(true);
    monitor.register_health_check("hung", hung, Duration::from_secs(5));
    monitor.register_health_check("fine", fine, Duration::from_secs(5));

    tokio::time::sleep(Duration::from_secs(7)).await;

    let statuses = monitor.get_all_health_statuses();
    assert!(statuses["fine"].healthy);
    let hung = &statuses["hung"];
    assert!(!hung.healthy);
    assert_eq!(hung.last_error.as_deref(), Some("probe timed out after 1000ms"));
}

#[tokio::test]
async fn test_transitions_are_published() {
    let monitor = HealthMonitor::default();
    let mut events = monitor.subscribe();
    let probe = switch(false);
    monitor.register_health_check("k", probe.clone(), Duration::from_secs(30));

    monitor.check_now("k").await;
    monitor.check_now("k").await;
    probe.up.store(true, Ordering::SeqCst);
    monitor.check_now("k").await;

    let first = events.recv().await.unwrap();
    assert_eq!(first.event_type, "health_changed");
    assert_eq!(first.data["healthy"], false);
    let second = events.recv().await.unwrap();
    assert_eq!(second.data["healthy"], true);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_shutdown_forgets_everything() {
    let monitor = HealthMonitor::default();
    monitor.register_health_check("a", switch(true), Duration::from_secs(30));
    monitor.register_health_check("b", switch(true), Duration::from_secs(30));
    assert_eq!(monitor.keys(), vec!["a".to_string(), "b".to_string()]);

    monitor.shutdown();
    assert!(monitor.keys().is_empty());
    assert!(monitor.get_all_health_statuses().is_empty());
    assert!(monitor.check_now("a").await.is_none());
}
