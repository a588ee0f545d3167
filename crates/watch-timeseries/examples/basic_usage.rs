use chrono::{Duration, Utc};
use watch_config::{CapacityPolicy, MonitoringConfig};
use watch_timeseries::{MetricParams, MetricStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("Chain Watch time-series store\n");

    let store = MetricStore::new(MonitoringConfig {
        retention_period_secs: 3600,
        max_metrics: 2,
        max_data_points: 5,
        metric_capacity: CapacityPolicy::EvictLeastRecent,
        ..Default::default()
    });

    // 1. 写入数据点
    let start = Utc::now() - Duration::minutes(10);
    for (i, value) in [100.0, 150.0, 200.0, 175.0, 125.0, 110.0].into_iter().enumerate() {
        store
            .collect("network_latency", value, Some(start + Duration::minutes(i as i64)))
            .await?;
    }
    println!("history (max 5 points): {:?}", store.history("network_latency").await);
    println!("window(2): {:?}\n", store.window("network_latency", 2).await);

    // 2. 参数约束
    store
        .configure_metric("cpu_usage", MetricParams::default().with_range(0.0, 100.0))
        .await?;
    store.collect("cpu_usage", 42.0, None).await?;
    if let Err(e) = store.collect("cpu_usage", 140.0, None).await {
        println!("rejected: {}", e);
    }

    // 3. 超出指标数量时淘汰最久未更新的序列
    store.collect("memory_usage", 64.0, None).await?;
    println!("\nmetrics: {:?}", store.metric_names().await);
    println!("stats: {:?}", store.stats().await);

    Ok(())
}
