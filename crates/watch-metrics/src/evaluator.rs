use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use watch_timeseries::{MetricPoint, MetricStore};

use crate::alert::{AlertResult, AlertRule, AlertRuleSet};
use crate::telemetry::WatchTelemetry;

/// 窗口趋势统计
///
/// 窗口为空时所有字段为 0，`samples` 为 0 可用于区分真实的零值。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

impl TrendStats {
    pub fn from_points(points: &[MetricPoint]) -> Self {
        if points.is_empty() {
            return Self::default();
        }

        // 增量均值：各项先除以 n，接近 f64::MAX 的值也不会溢出
        let mut mean = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for (i, point) in points.iter().enumerate() {
            let n = (i + 1) as f64;
            mean += point.value / n - mean / n;
            min = min.min(point.value);
            max = max.max(point.value);
        }

        Self {
            // 舍入误差可能让均值略微越过极值
            average: mean.clamp(min, max),
            min,
            max,
            samples: points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }
}

/// 告警评估器，只读访问存储和规则集合
pub struct AlertEvaluator {
    store: Arc<MetricStore>,
    rules: Arc<AlertRuleSet>,
    telemetry: Option<Arc<WatchTelemetry>>,
}

impl AlertEvaluator {
    pub fn new(store: Arc<MetricStore>, rules: Arc<AlertRuleSet>) -> Self {
        Self {
            store,
            rules,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<WatchTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// 按配置顺序评估所有规则
    ///
    /// 指标还没有数据的规则被跳过，不产生结果。
    pub async fn check_all(&self) -> Vec<AlertResult> {
        let rules = self.rules.list().await;
        let mut results = Vec::with_capacity(rules.len());

        for rule in &rules {
            let Some(latest) = self.store.latest_value(&rule.metric_name).await else {
                debug!(metric = %rule.metric_name, "No data for alert rule, skipped");
                continue;
            };

            let triggered = rule.evaluate(latest.value);
            if triggered {
                warn!(
                    metric = %rule.metric_name,
                    value = latest.value,
                    condition = rule.condition.symbol(),
                    threshold = rule.threshold,
                    "Alert triggered"
                );
            }

            if let Some(telemetry) = &self.telemetry {
                telemetry.record_evaluation(&rule.metric_name, triggered);
            }

            results.push(AlertResult {
                metric_name: rule.metric_name.clone(),
                triggered,
                value: latest.value,
                observed_at: latest.timestamp,
            });
        }

        results
    }

    /// 最近 `window_size` 个数据点的平均值、最小值、最大值
    pub async fn trend(&self, metric_name: &str, window_size: usize) -> TrendStats {
        let window = self.store.window(metric_name, window_size).await;
        TrendStats::from_points(&window)
    }

    /// 每条规则按自身窗口大小计算趋势
    pub async fn rule_trends(&self) -> Vec<(AlertRule, TrendStats)> {
        let rules = self.rules.list().await;
        let mut trends = Vec::with_capacity(rules.len());

        for rule in rules {
            let stats = self.trend(&rule.metric_name, rule.window_size).await;
            trends.push((rule, stats));
        }

        trends
    }
}
