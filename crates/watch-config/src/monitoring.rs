use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 保留时长上限（100 年），超出部分按上限处理
pub const MAX_RETENTION_SECS: u64 = 100 * 365 * 24 * 3600;

/// 指标数量达到 `max_metrics` 时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// 拒绝新的指标名
    #[default]
    Reject,
    /// 淘汰最久未更新的序列，为新指标腾出位置
    EvictLeastRecent,
    /// 不限制指标数量
    Unbounded,
}

/// 监控配置
///
/// 进程启动时设置一次，之后只读。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// 期望的采样间隔（秒）
    pub sampling_interval_secs: u64,
    /// 数据点保留时长（秒）
    pub retention_period_secs: u64,
    /// 同时跟踪的指标名上限
    pub max_metrics: usize,
    /// 告警规则上限
    pub max_alerts: usize,
    /// 单个序列保留的数据点上限
    pub max_data_points: usize,
    /// 是否按采样间隔限制写入频率
    pub rate_limiting_enabled: bool,
    pub metric_capacity: CapacityPolicy,
    pub enforce_alert_limit: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            sampling_interval_secs: 60,
            retention_period_secs: 86_400, // 1 天
            max_metrics: 100,
            max_alerts: 50,
            max_data_points: 1000,
            rate_limiting_enabled: false,
            metric_capacity: CapacityPolicy::Reject,
            enforce_alert_limit: true,
        }
    }
}

impl MonitoringConfig {
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_secs(self.sampling_interval_secs)
    }

    pub fn retention_period(&self) -> Duration {
        Duration::from_secs(self.retention_period_secs.min(MAX_RETENTION_SECS))
    }

    /// 指标数上限；`Unbounded` 策略下返回 `None`
    pub fn metric_limit(&self) -> Option<usize> {
        match self.metric_capacity {
            CapacityPolicy::Unbounded => None,
            CapacityPolicy::Reject | CapacityPolicy::EvictLeastRecent => Some(self.max_metrics),
        }
    }

    pub fn alert_limit(&self) -> Option<usize> {
        self.enforce_alert_limit.then_some(self.max_alerts)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.sampling_interval_secs == 0 {
            return Err(anyhow!("sampling_interval_secs must be greater than 0"));
        }

        if self.retention_period_secs == 0 {
            return Err(anyhow!("retention_period_secs must be greater than 0"));
        }

        if self.max_data_points == 0 {
            return Err(anyhow!("max_data_points must be greater than 0"));
        }

        if self.metric_limit() == Some(0) {
            return Err(anyhow!(
                "max_metrics must be greater than 0 when metric_capacity is {:?}",
                self.metric_capacity
            ));
        }

        if self.alert_limit() == Some(0) {
            return Err(anyhow!(
                "max_alerts must be greater than 0 when enforce_alert_limit is set"
            ));
        }

        Ok(())
    }
}
