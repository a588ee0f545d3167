use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 持久化重试配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// 退避倍数
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 2000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// 第 `retry` 次重试前的等待时间（从 0 开始计数）
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(i32::MAX as u32) as i32);
        let millis = (self.initial_backoff_ms as f64 * factor).min(self.max_backoff_ms as f64);
        Duration::from_millis(millis as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RetryConfig::default();

        assert_eq!(config.backoff_for(0), Duration::from_millis(100));
        assert_eq!(config.backoff_for(1), Duration::from_millis(200));
        assert_eq!(config.backoff_for(2), Duration::from_millis(400));
        assert_eq!(config.backoff_for(10), Duration::from_millis(2000));
    }

    #[test]
    fn test_multiplier_below_one_is_flat() {
        let config = RetryConfig {
            multiplier: 0.5,
            ..Default::default()
        };
        assert_eq!(config.backoff_for(3), Duration::from_millis(100));
    }
}
