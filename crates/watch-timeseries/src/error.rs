use std::fmt;
use thiserror::Error;

/// 指标名最大长度（字节）
pub const MAX_METRIC_NAME_LEN: usize = 32;

/// 受容量上限约束的资源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityKind {
    Metrics,
    Alerts,
}

impl fmt::Display for CapacityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityKind::Metrics => write!(f, "metrics"),
            CapacityKind::Alerts => write!(f, "alert rules"),
        }
    }
}

/// 存储错误
///
/// 所有变体都在修改内存状态之前返回，调用方可以安全重试。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Capacity exceeded: at most {limit} {kind}")]
    CapacityExceeded { kind: CapacityKind, limit: usize },

    #[error("Invalid metric name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid value for {metric}: {value}")]
    InvalidValue { metric: String, value: f64 },

    #[error("Invalid metric params for {metric}: {reason}")]
    InvalidParams { metric: String, reason: String },

    #[error("Invalid alert rule for {metric}: {reason}")]
    InvalidRule { metric: String, reason: String },

    #[error("Metric {0} is disabled")]
    MetricDisabled(String),

    #[error("Value {value} of {metric} is below minimum {min}")]
    ValueBelowMinimum { metric: String, value: f64, min: f64 },

    #[error("Value {value} of {metric} is above maximum {max}")]
    ValueAboveMaximum { metric: String, value: f64, max: f64 },

    #[error("Rate of change {rate:.3}/s of {metric} exceeds maximum {max}/s")]
    RateOfChangeExceeded { metric: String, rate: f64, max: f64 },

    #[error("Metric {metric} updated {elapsed_ms}ms after previous point, sampling interval is {interval_ms}ms")]
    RateLimited {
        metric: String,
        elapsed_ms: i64,
        interval_ms: i64,
    },
}

impl StoreError {
    pub fn is_capacity(&self) -> bool {
        matches!(self, StoreError::CapacityExceeded { .. })
    }
}

/// 校验指标名：非空且不超过 [`MAX_METRIC_NAME_LEN`] 字节
pub fn validate_metric_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidName {
            name: name.to_string(),
            reason: "name must not be empty".to_string(),
        });
    }

    if name.len() > MAX_METRIC_NAME_LEN {
        return Err(StoreError::InvalidName {
            name: name.to_string(),
            reason: format!("name exceeds {} bytes", MAX_METRIC_NAME_LEN),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_metric_name() {
        assert!(validate_metric_name("cpu_usage").is_ok());
        assert!(validate_metric_name(&"x".repeat(MAX_METRIC_NAME_LEN)).is_ok());

        assert!(matches!(
            validate_metric_name(""),
            Err(StoreError::InvalidName { .. })
        ));
        assert!(matches!(
            validate_metric_name(&"x".repeat(MAX_METRIC_NAME_LEN + 1)),
            Err(StoreError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_capacity_error_message() {
        let err = StoreError::CapacityExceeded {
            kind: CapacityKind::Metrics,
            limit: 100,
        };
        assert!(err.is_capacity());
        assert_eq!(err.to_string(), "Capacity exceeded: at most 100 metrics");
    }
}
