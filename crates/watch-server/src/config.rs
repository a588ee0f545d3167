use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use watch_config::{ConfigLoader, GlobalConfig, LoggingConfig, MonitoringConfig, RetryConfig};
use watch_metrics::AlertRule;
use watch_timeseries::MetricParams;

/// 运行配置：全局配置 + 告警规则 + 单指标参数
///
/// ```toml
/// [monitoring]
/// max_metrics = 10
///
/// [[rules]]
/// metric_name = "cpu_usage"
/// threshold = 90.0
/// condition = "GreaterThan"
/// window_size = 5
///
/// [metrics.cpu_usage]
/// min_value = 0.0
/// max_value = 100.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub monitoring: MonitoringConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
    pub rules: Vec<AlertRule>,
    pub metrics: BTreeMap<String, MetricParams>,
}

impl ServerConfig {
    /// 加载并验证
    pub fn load(loader: &ConfigLoader) -> Result<Self> {
        let config: ServerConfig = loader
            .load_as()
            .with_context(|| format!("Failed to load {}", loader.config_path().display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn global(&self) -> GlobalConfig {
        GlobalConfig {
            monitoring: self.monitoring.clone(),
            retry: self.retry.clone(),
            logging: self.logging.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.global().validate()?;

        for rule in &self.rules {
            rule.validate()
                .with_context(|| format!("Invalid alert rule for {}", rule.metric_name))?;
        }

        if let Some(limit) = self.monitoring.alert_limit() {
            if self.rules.len() > limit {
                bail!(
                    "{} alert rules configured but monitoring.max_alerts is {}",
                    self.rules.len(),
                    limit
                );
            }
        }

        for (name, params) in &self.metrics {
            watch_timeseries::validate_metric_name(name)?;
            params.check(name)?;
        }

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
