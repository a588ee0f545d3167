use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// 指标数据点，创建后不可变
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl MetricPoint {
    pub fn new(value: f64) -> Self {
        Self::at(Utc::now(), value)
    }

    pub fn at(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// 单个指标的参数约束
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricParams {
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    /// 最大变化速率（单位/秒），与上一个数据点比较
    pub max_rate_of_change: Option<f64>,
    pub enabled: bool,
    /// 保留的数据点数量，不超过全局 `max_data_points`
    pub max_points: Option<usize>,
    /// 为 false 时只保留最新的数据点
    pub store_history: bool,
}

impl Default for MetricParams {
    fn default() -> Self {
        Self {
            min_value: None,
            max_value: None,
            max_rate_of_change: None,
            enabled: true,
            max_points: None,
            store_history: true,
        }
    }
}

impl MetricParams {
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    pub fn with_max_rate_of_change(mut self, rate: f64) -> Self {
        self.max_rate_of_change = Some(rate);
        self
    }

    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = Some(max_points);
        self
    }

    pub fn without_history(mut self) -> Self {
        self.store_history = false;
        self
    }

    /// 该指标实际保留的数据点上限
    pub fn point_limit(&self, global_max: usize) -> usize {
        if !self.store_history {
            return 1;
        }

        let global_max = global_max.max(1);
        self.max_points
            .map_or(global_max, |max_points| max_points.clamp(1, global_max))
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// 检查参数本身是否自洽
    pub fn check(&self, metric: &str) -> Result<(), StoreError> {
        let invalid = |reason: &str| StoreError::InvalidParams {
            metric: metric.to_string(),
            reason: reason.to_string(),
        };

        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(invalid("min_value is greater than max_value"));
            }
        }

        if let Some(rate) = self.max_rate_of_change {
            if !(rate >= 0.0) {
                return Err(invalid("max_rate_of_change must be non-negative"));
            }
        }

        if self.max_points == Some(0) {
            return Err(invalid("max_points must be greater than 0"));
        }

        Ok(())
    }

    /// 按参数校验即将写入的数据点
    pub fn admit(
        &self,
        metric: &str,
        point: &MetricPoint,
        last: Option<&MetricPoint>,
    ) -> Result<(), StoreError> {
        if !self.enabled {
            return Err(StoreError::MetricDisabled(metric.to_string()));
        }

        if let Some(min) = self.min_value {
            if point.value < min {
                return Err(StoreError::ValueBelowMinimum {
                    metric: metric.to_string(),
                    value: point.value,
                    min,
                });
            }
        }

        if let Some(max) = self.max_value {
            if point.value > max {
                return Err(StoreError::ValueAboveMaximum {
                    metric: metric.to_string(),
                    value: point.value,
                    max,
                });
            }
        }

        if let (Some(max), Some(last)) = (self.max_rate_of_change, last) {
            let elapsed_ms = (point.timestamp - last.timestamp).num_milliseconds();
            let rate = if elapsed_ms > 0 {
                (point.value - last.value).abs() / (elapsed_ms as f64 / 1000.0)
            } else {
                0.0
            };

            if rate > max {
                return Err(StoreError::RateOfChangeExceeded {
                    metric: metric.to_string(),
                    rate,
                    max,
                });
            }
        }

        Ok(())
    }
}
