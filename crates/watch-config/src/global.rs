use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;
use crate::monitoring::MonitoringConfig;
use crate::retry::RetryConfig;

/// 全局配置
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub monitoring: MonitoringConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

impl GlobalConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.monitoring.validate()?;

        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be greater than 0");
        }

        Ok(())
    }

    /// 以 TOML 格式输出生效的配置
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_global_config() {
        let config = GlobalConfig::default();
        assert_eq!(config.monitoring.max_metrics, 100);
        assert_eq!(config.monitoring.retention_period_secs, 86_400);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_to_toml_round_trip() {
        let mut config = GlobalConfig::default();
        config.monitoring.max_metrics = 7;

        let text = config.to_toml().unwrap();
        assert!(text.contains("[monitoring]"));

        let parsed: GlobalConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
