use std::sync::Arc;
use watch_config::{MonitoringConfig, RetryConfig};
use watch_metrics::{
    AlertCondition, AlertEvaluator, AlertRule, AlertRuleSet, MemoryAdapter, MetricsCollector,
    RetryingAdapter, WatchTelemetry,
};
use watch_timeseries::MetricStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    println!("=== Chain Watch 告警示例 ===\n");

    // 1. 创建存储与规则集合
    let config = MonitoringConfig::default();
    let store = Arc::new(MetricStore::new(config.clone()));
    let rules = Arc::new(AlertRuleSet::from_config(&config));
    let telemetry = Arc::new(WatchTelemetry::new().expect("telemetry registry"));

    for (metric, threshold) in [("cpu_usage", 90.0), ("memory_usage", 80.0), ("disk_usage", 95.0)] {
        rules
            .add(AlertRule::new(metric, threshold, AlertCondition::GreaterThan, 5))
            .await
            .expect("rule capacity");
    }
    println!("已添加 {} 条告警规则\n", rules.len().await);

    // 2. 持久化后端（带重试）
    let backend = MemoryAdapter::new();
    let adapter = RetryingAdapter::new(backend.clone(), RetryConfig::default())
        .with_telemetry(telemetry.clone());

    let collector = MetricsCollector::new(store.clone(), Arc::new(adapter), telemetry.clone());
    let evaluator = AlertEvaluator::new(store.clone(), rules.clone()).with_telemetry(telemetry.clone());

    // 3. 写入数据
    for (metric, value) in [("cpu_usage", 95.0), ("memory_usage", 75.0), ("disk_usage", 98.0)] {
        collector.collect(metric, value).await.expect("collect");
    }

    // 4. 评估告警
    println!("告警结果:");
    for result in evaluator.check_all().await {
        let mark = if result.triggered { "✓ 触发" } else { "- 正常" };
        println!("  {} {} = {}", mark, result.metric_name, result.value);
    }

    // 5. 趋势
    for v in [100.0, 150.0, 200.0, 175.0, 125.0] {
        collector.collect("network_latency", v).await.expect("collect");
    }
    let trend = evaluator.trend("network_latency", 5).await;
    println!(
        "\nnetwork_latency 趋势: avg={:.1} min={:.1} max={:.1}",
        trend.average, trend.min, trend.max
    );

    println!("\n已持久化 {} 个数据点", backend.len().await);
    println!("\n{}", telemetry.export().unwrap_or_default());
    println!("=== 示例完成 ===");
}
