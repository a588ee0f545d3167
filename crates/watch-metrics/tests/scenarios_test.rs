use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use watch_config::{MonitoringConfig, RetryConfig};
use watch_metrics::{
    AdapterError, AlertCondition, AlertEvaluator, AlertRule, AlertRuleSet, CollectError,
    MemoryAdapter, MetricsCollector, PersistenceAdapter, RetryingAdapter, WatchTelemetry,
};
use watch_timeseries::{MetricPoint, MetricStore, StoreError};

fn scenario_config() -> MonitoringConfig {
    MonitoringConfig {
        max_metrics: 100,
        max_alerts: 50,
        retention_period_secs: 86_400,
        sampling_interval_secs: 60,
        ..Default::default()
    }
}

struct Harness {
    collector: MetricsCollector,
    rules: Arc<AlertRuleSet>,
    evaluator: AlertEvaluator,
}

fn harness(adapter: Arc<dyn PersistenceAdapter>) -> Harness {
    let config = scenario_config();
    let store = Arc::new(MetricStore::new(config.clone()));
    let rules = Arc::new(AlertRuleSet::from_config(&config));
    let telemetry = Arc::new(WatchTelemetry::new().unwrap());

    Harness {
        collector: MetricsCollector::new(store.clone(), adapter, telemetry.clone()),
        evaluator: AlertEvaluator::new(store, rules.clone()).with_telemetry(telemetry),
        rules,
    }
}

/// 可切换的故障后端
struct SwitchableAdapter {
    failing: AtomicBool,
    sink: MemoryAdapter,
}

#[async_trait]
impl PersistenceAdapter for SwitchableAdapter {
    async fn persist(&self, metric_name: &str, point: &MetricPoint) -> Result<(), AdapterError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AdapterError::Network("ledger unreachable".to_string()));
        }
        self.sink.persist(metric_name, point).await
    }

    fn name(&self) -> &str {
        "switchable"
    }
}

#[tokio::test]
async fn test_latest_value_scenario() {
    let h = harness(Arc::new(MemoryAdapter::new()));

    h.collector.collect("cpu_usage", 75.0).await.unwrap();

    let latest = h.collector.store().latest_value("cpu_usage").await.unwrap();
    assert_eq!(latest.value, 75.0);
}

#[tokio::test]
async fn test_memory_threshold_scenario() {
    let h = harness(Arc::new(MemoryAdapter::new()));
    h.rules
        .add(AlertRule::new("memory_usage", 90.0, AlertCondition::GreaterThan, 5))
        .await
        .unwrap();

    h.collector.collect("memory_usage", 85.0).await.unwrap();
    let results = h.evaluator.check_all().await;
    assert_eq!(results.len(), 1);
    assert!(!results[0].triggered);
    assert_eq!(results[0].value, 85.0);

    h.collector.collect("memory_usage", 95.0).await.unwrap();
    let results = h.evaluator.check_all().await;
    assert!(results[0].triggered);
    assert_eq!(results[0].value, 95.0);
}

#[tokio::test]
async fn test_network_latency_trend_scenario() {
    let h = harness(Arc::new(MemoryAdapter::new()));

    for v in [100.0, 150.0, 200.0, 175.0, 125.0] {
        h.collector.collect("network_latency", v).await.unwrap();
    }

    let trend = h.evaluator.trend("network_latency", 5).await;
    assert_eq!(trend.average, 150.0);
    assert_eq!(trend.min, 100.0);
    assert_eq!(trend.max, 200.0);
}

#[tokio::test]
async fn test_multiple_rules_scenario() {
    let h = harness(Arc::new(MemoryAdapter::new()));

    for (metric, threshold) in [("cpu_usage", 90.0), ("memory_usage", 80.0), ("disk_usage", 95.0)] {
        h.rules
            .add(AlertRule::new(metric, threshold, AlertCondition::GreaterThan, 5))
            .await
            .unwrap();
    }

    h.collector.collect("cpu_usage", 95.0).await.unwrap();
    h.collector.collect("memory_usage", 75.0).await.unwrap();
    h.collector.collect("disk_usage", 98.0).await.unwrap();

    let results = h.evaluator.check_all().await;
    assert_eq!(results.len(), 3);
    assert_eq!(results.iter().filter(|r| r.triggered).count(), 2);

    let order: Vec<&str> = results.iter().map(|r| r.metric_name.as_str()).collect();
    assert_eq!(order, vec!["cpu_usage", "memory_usage", "disk_usage"]);
}

#[tokio::test]
async fn test_trend_bounds_hold_for_every_window() {
    let h = harness(Arc::new(MemoryAdapter::new()));
    let series: [(&str, Vec<f64>); 6] = [
        ("mixed", vec![3.5, -2.0, 10.0, 0.0, 7.25, 7.25, -11.0, 4.0]),
        ("tenths", vec![0.1; 3]),
        ("fifths", vec![0.2; 3]),
        ("decimals", vec![0.1, 0.2, 0.3, 0.7, 0.9, 1.1]),
        ("huge", vec![1e308, 1e308, f64::MAX, f64::MAX]),
        ("extremes", vec![f64::MAX, -f64::MAX, f64::MAX, 1.0]),
    ];

    for (name, values) in &series {
        for v in values {
            h.collector.collect(name, *v).await.unwrap();
        }

        for w in 1..=values.len() {
            let t = h.evaluator.trend(name, w).await;
            assert!(t.average.is_finite(), "{} window {}: {:?}", name, w, t);
            assert!(t.min <= t.average, "{} window {}: {:?}", name, w, t);
            assert!(t.average <= t.max, "{} window {}: {:?}", name, w, t);
            assert_eq!(t.samples, w);
        }
    }
}

#[tokio::test]
async fn test_history_preserves_append_order() {
    let h = harness(Arc::new(MemoryAdapter::new()));
    let values = [9.0, 1.0, 8.0, 2.0, 7.0, 3.0];

    for v in values {
        h.collector.collect("ordered", v).await.unwrap();
    }

    let history: Vec<f64> = h
        .collector
        .store()
        .history("ordered")
        .await
        .iter()
        .map(|p| p.value)
        .collect();
    assert_eq!(history, values.to_vec());
}

#[tokio::test]
async fn test_collect_without_eviction_leaves_points_identical() {
    let h = harness(Arc::new(MemoryAdapter::new()));
    let store = h.collector.store();
    let t0 = Utc::now();

    for i in 0..5 {
        h.collector
            .collect_at("stable", i as f64, Some(t0 + Duration::seconds(i)))
            .await
            .unwrap();
    }
    let before = store.history("stable").await;

    h.collector
        .collect_at("stable", 99.0, Some(t0 + Duration::seconds(10)))
        .await
        .unwrap();
    let after = store.history("stable").await;

    assert_eq!(&after[..before.len()], &before[..]);
    assert_eq!(after.len(), before.len() + 1);

    let newest = after.last().unwrap().timestamp;
    let retention = Duration::seconds(store.config().retention_period_secs as i64);
    assert!(after.iter().all(|p| newest - p.timestamp <= retention));
}

#[tokio::test]
async fn test_capacity_rejection_creates_no_series() {
    let config = MonitoringConfig {
        max_metrics: 2,
        ..scenario_config()
    };
    let store = Arc::new(MetricStore::new(config));
    let adapter = MemoryAdapter::new();
    let collector = MetricsCollector::new(
        store.clone(),
        Arc::new(adapter.clone()),
        Arc::new(WatchTelemetry::new().unwrap()),
    );

    collector.collect("a", 1.0).await.unwrap();
    collector.collect("b", 1.0).await.unwrap();

    let err = collector.collect("c", 1.0).await.unwrap_err();
    assert!(matches!(
        err,
        CollectError::Rejected(StoreError::CapacityExceeded { limit: 2, .. })
    ));
    assert!(store.latest_value("c").await.is_none());
    assert!(store.history("c").await.is_empty());
    assert_eq!(adapter.len().await, 2);
}

#[tokio::test]
async fn test_durable_failure_then_retry_only_durable_step() {
    let sink = MemoryAdapter::new();
    let adapter = Arc::new(SwitchableAdapter {
        failing: AtomicBool::new(true),
        sink: sink.clone(),
    });

    let retrying = RetryingAdapter::new(
        SwitchableAdapterRef(adapter.clone()),
        RetryConfig {
            max_attempts: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
            multiplier: 1.0,
        },
    );
    let h = harness(Arc::new(retrying));
    h.rules
        .add(AlertRule::new("cpu_usage", 90.0, AlertCondition::GreaterThan, 1))
        .await
        .unwrap();

    let err = h.collector.collect("cpu_usage", 97.0).await.unwrap_err();
    assert!(err.is_committed());
    assert!(matches!(
        err,
        CollectError::Persist {
            source: AdapterError::RetriesExhausted { attempts: 2, .. },
            ..
        }
    ));

    // 持久化失败不影响告警评估
    let results = h.evaluator.check_all().await;
    assert!(results[0].triggered);

    adapter.failing.store(false, Ordering::SeqCst);
    let (name, point) = err.committed_point().unwrap();
    h.collector.retry_persist(name, point).await.unwrap();

    assert_eq!(sink.len().await, 1);
    assert_eq!(h.collector.store().history("cpu_usage").await.len(), 1);
}

/// 共享同一个可切换后端
struct SwitchableAdapterRef(Arc<SwitchableAdapter>);

#[async_trait]
impl PersistenceAdapter for SwitchableAdapterRef {
    async fn persist(&self, metric_name: &str, point: &MetricPoint) -> Result<(), AdapterError> {
        self.0.persist(metric_name, point).await
    }

    fn name(&self) -> &str {
        self.0.name()
    }
}
