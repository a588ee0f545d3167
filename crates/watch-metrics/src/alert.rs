use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};
use watch_config::MonitoringConfig;
use watch_timeseries::{validate_metric_name, CapacityKind, StoreError};

/// 告警比较条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertCondition {
    GreaterThan,
    LessThan,
    Equals,
    NotEquals,
}

impl AlertCondition {
    /// 精确比较，不使用误差容限
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            AlertCondition::GreaterThan => value > threshold,
            AlertCondition::LessThan => value < threshold,
            AlertCondition::Equals => value == threshold,
            AlertCondition::NotEquals => value != threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            AlertCondition::GreaterThan => ">",
            AlertCondition::LessThan => "<",
            AlertCondition::Equals => "==",
            AlertCondition::NotEquals => "!=",
        }
    }
}

/// 告警规则
///
/// 规则没有独立标识，同一指标可配置多条规则。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub metric_name: String,
    pub threshold: f64,
    pub condition: AlertCondition,
    /// 趋势统计使用的窗口大小
    pub window_size: usize,
}

impl AlertRule {
    pub fn new(
        metric_name: impl Into<String>,
        threshold: f64,
        condition: AlertCondition,
        window_size: usize,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            threshold,
            condition,
            window_size,
        }
    }

    pub fn evaluate(&self, value: f64) -> bool {
        self.condition.evaluate(value, self.threshold)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        validate_metric_name(&self.metric_name)?;

        if self.window_size == 0 {
            return Err(StoreError::InvalidRule {
                metric: self.metric_name.clone(),
                reason: "window_size must be greater than 0".to_string(),
            });
        }

        if !self.threshold.is_finite() {
            return Err(StoreError::InvalidRule {
                metric: self.metric_name.clone(),
                reason: format!("threshold {} is not finite", self.threshold),
            });
        }

        Ok(())
    }
}

/// 单条规则的评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertResult {
    pub metric_name: String,
    pub triggered: bool,
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

/// 告警规则集合
pub struct AlertRuleSet {
    rules: RwLock<Vec<AlertRule>>,
    limit: Option<usize>,
}

impl AlertRuleSet {
    /// `limit` 为 `None` 时不限制规则数量
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            limit,
        }
    }

    pub fn from_config(config: &MonitoringConfig) -> Self {
        Self::new(config.alert_limit())
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub async fn add(&self, rule: AlertRule) -> Result<(), StoreError> {
        rule.validate()?;

        let mut rules = self.rules.write().await;

        if let Some(limit) = self.limit {
            if rules.len() >= limit {
                warn!(metric = %rule.metric_name, limit, "Alert rule capacity exceeded");
                return Err(StoreError::CapacityExceeded {
                    kind: CapacityKind::Alerts,
                    limit,
                });
            }
        }

        info!(
            metric = %rule.metric_name,
            condition = rule.condition.symbol(),
            threshold = rule.threshold,
            "Adding alert rule"
        );
        rules.push(rule);
        Ok(())
    }

    /// 删除指定指标的全部规则，返回删除数量
    pub async fn remove_by_metric(&self, metric_name: &str) -> usize {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|rule| rule.metric_name != metric_name);

        let removed = before - rules.len();
        if removed > 0 {
            info!(metric = %metric_name, removed, "Alert rules removed");
        }
        removed
    }

    /// 规则快照
    pub async fn list(&self) -> Vec<AlertRule> {
        self.rules.read().await.clone()
    }

    pub async fn clear(&self) {
        self.rules.write().await.clear();
        info!("Alert rules cleared");
    }

    pub async fn len(&self) -> usize {
        self.rules.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rules.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions() {
        assert!(AlertCondition::GreaterThan.evaluate(95.0, 90.0));
        assert!(!AlertCondition::GreaterThan.evaluate(90.0, 90.0));
        assert!(AlertCondition::LessThan.evaluate(1.0, 2.0));
        assert!(AlertCondition::Equals.evaluate(90.0, 90.0));
        assert!(AlertCondition::NotEquals.evaluate(90.5, 90.0));
    }

    #[test]
    fn test_equality_is_exact() {
        let rule = AlertRule::new("m", 0.3, AlertCondition::Equals, 1);
        // 0.1 + 0.2 != 0.3
        assert!(!rule.evaluate(0.1 + 0.2));
        assert!(rule.evaluate(0.3));
    }

    #[test]
    fn test_rule_validation() {
        assert!(AlertRule::new("cpu", 90.0, AlertCondition::GreaterThan, 5)
            .validate()
            .is_ok());
        assert!(matches!(
            AlertRule::new("cpu", 90.0, AlertCondition::GreaterThan, 0).validate(),
            Err(StoreError::InvalidRule { .. })
        ));
        assert!(matches!(
            AlertRule::new("", 90.0, AlertCondition::GreaterThan, 5).validate(),
            Err(StoreError::InvalidName { .. })
        ));
        assert!(AlertRule::new("cpu", f64::NAN, AlertCondition::Equals, 5)
            .validate()
            .is_err());
    }

    #[test]
    fn test_rule_serde() {
        let json = r#"{"metric_name":"cpu","threshold":90.0,"condition":"GreaterThan","window_size":5}"#;
        let rule: AlertRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule, AlertRule::new("cpu", 90.0, AlertCondition::GreaterThan, 5));
    }

    #[tokio::test]
    async fn test_rule_set_capacity() {
        let rules = AlertRuleSet::new(Some(2));

        rules.add(AlertRule::new("a", 1.0, AlertCondition::GreaterThan, 1)).await.unwrap();
        rules.add(AlertRule::new("b", 1.0, AlertCondition::GreaterThan, 1)).await.unwrap();

        let err = rules
            .add(AlertRule::new("c", 1.0, AlertCondition::GreaterThan, 1))
            .await
            .unwrap_err();
        assert!(err.is_capacity());
        assert_eq!(rules.len().await, 2);
    }

    #[tokio::test]
    async fn test_remove_by_metric_removes_all_duplicates() {
        let rules = AlertRuleSet::new(None);

        rules.add(AlertRule::new("cpu", 90.0, AlertCondition::GreaterThan, 1)).await.unwrap();
        rules.add(AlertRule::new("mem", 80.0, AlertCondition::GreaterThan, 1)).await.unwrap();
        rules.add(AlertRule::new("cpu", 10.0, AlertCondition::LessThan, 1)).await.unwrap();

        assert_eq!(rules.remove_by_metric("cpu").await, 2);
        assert_eq!(rules.remove_by_metric("missing").await, 0);

        let remaining = rules.list().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].metric_name, "mem");
    }

    #[tokio::test]
    async fn test_list_is_snapshot() {
        let rules = AlertRuleSet::new(None);
        rules.add(AlertRule::new("cpu", 90.0, AlertCondition::GreaterThan, 1)).await.unwrap();

        let mut snapshot = rules.list().await;
        snapshot.clear();

        assert_eq!(rules.len().await, 1);

        rules.clear().await;
        assert!(rules.is_empty().await);
    }

    #[test]
    fn test_unlimited_rule_set_blocking() {
        let rules = AlertRuleSet::new(None);

        tokio_test::block_on(async {
            for i in 0..100 {
                let rule = AlertRule::new(format!("m{}", i), 1.0, AlertCondition::GreaterThan, 1);
                tokio_test::assert_ok!(rules.add(rule).await);
            }
            tokio_test::assert_err!(
                rules
                    .add(AlertRule::new("bad", 1.0, AlertCondition::GreaterThan, 0))
                    .await
            );

            assert_eq!(rules.len().await, 100);
        });
        assert_eq!(rules.limit(), None);
    }
}
