use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

/// 自身运行指标（Prometheus 格式导出）
pub struct WatchTelemetry {
    points_collected_total: Counter,
    collect_rejected_total: CounterVec,
    persist_failures_total: Counter,
    persist_retries_total: Counter,
    alert_evaluations_total: Counter,
    alerts_triggered_total: CounterVec,
    tracked_series: Gauge,

    registry: Registry,
}

impl WatchTelemetry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let points_collected_total = Counter::new(
            "chain_watch_points_collected_total",
            "Total number of metric points committed in memory",
        )?;
        registry.register(Box::new(points_collected_total.clone()))?;

        let collect_rejected_total = CounterVec::new(
            Opts::new(
                "chain_watch_collect_rejected_total",
                "Total number of rejected collect calls",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(collect_rejected_total.clone()))?;

        let persist_failures_total = Counter::new(
            "chain_watch_persist_failures_total",
            "Total number of durable writes that failed after retries",
        )?;
        registry.register(Box::new(persist_failures_total.clone()))?;

        let persist_retries_total = Counter::new(
            "chain_watch_persist_retries_total",
            "Total number of durable write retries",
        )?;
        registry.register(Box::new(persist_retries_total.clone()))?;

        let alert_evaluations_total = Counter::new(
            "chain_watch_alert_evaluations_total",
            "Total number of alert rule evaluations",
        )?;
        registry.register(Box::new(alert_evaluations_total.clone()))?;

        let alerts_triggered_total = CounterVec::new(
            Opts::new("chain_watch_alerts_triggered_total", "Total number of triggered alerts"),
            &["metric"],
        )?;
        registry.register(Box::new(alerts_triggered_total.clone()))?;

        let tracked_series = Gauge::new("chain_watch_tracked_series", "Number of tracked series")?;
        registry.register(Box::new(tracked_series.clone()))?;

        Ok(Self {
            points_collected_total,
            collect_rejected_total,
            persist_failures_total,
            persist_retries_total,
            alert_evaluations_total,
            alerts_triggered_total,
            tracked_series,
            registry,
        })
    }

    pub fn record_collected(&self) {
        self.points_collected_total.inc();
    }

    pub fn record_rejected(&self, reason: &str) {
        self.collect_rejected_total.with_label_values(&[reason]).inc();
    }

    pub fn record_persist_failure(&self) {
        self.persist_failures_total.inc();
    }

    pub fn record_persist_retry(&self) {
        self.persist_retries_total.inc();
    }

    pub fn record_evaluation(&self, metric: &str, triggered: bool) {
        self.alert_evaluations_total.inc();
        if triggered {
            self.alerts_triggered_total.with_label_values(&[metric]).inc();
        }
    }

    pub fn set_tracked_series(&self, count: usize) {
        self.tracked_series.set(count as f64);
    }

    pub fn points_collected(&self) -> u64 {
        self.points_collected_total.get() as u64
    }

    pub fn persist_failures(&self) -> u64 {
        self.persist_failures_total.get() as u64
    }

    pub fn persist_retries(&self) -> u64 {
        self.persist_retries_total.get() as u64
    }

    // 导出指标
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_creation() {
        let telemetry = WatchTelemetry::new().unwrap();
        assert!(telemetry.export().unwrap().contains("chain_watch_points_collected_total"));
    }

    #[test]
    fn test_counters() {
        let telemetry = WatchTelemetry::new().unwrap();

        telemetry.record_collected();
        telemetry.record_collected();
        telemetry.record_rejected("capacity");
        telemetry.record_evaluation("cpu_usage", true);
        telemetry.record_evaluation("cpu_usage", false);
        telemetry.set_tracked_series(3);

        assert_eq!(telemetry.points_collected(), 2);

        let exported = telemetry.export().unwrap();
        assert!(exported.contains("chain_watch_collect_rejected_total{reason=\"capacity\"} 1"));
        assert!(exported.contains("chain_watch_alerts_triggered_total{metric=\"cpu_usage\"} 1"));
        assert!(exported.contains("chain_watch_alert_evaluations_total 2"));
        assert!(exported.contains("chain_watch_tracked_series 3"));
    }
}
