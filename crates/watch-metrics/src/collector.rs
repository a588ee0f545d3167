use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};
use watch_timeseries::{MetricPoint, MetricStore, StoreError};

use crate::persist::{AdapterError, PersistenceAdapter};
use crate::telemetry::WatchTelemetry;

/// 写入错误
#[derive(Debug, Error)]
pub enum CollectError {
    /// 写入被拒绝，内存状态未改变
    #[error("Collect rejected: {0}")]
    Rejected(#[from] StoreError),

    /// 数据点已写入内存并可被告警评估，只是持久化失败
    #[error("Point for {metric_name} committed in memory but not persisted: {source}")]
    Persist {
        metric_name: String,
        point: MetricPoint,
        #[source]
        source: AdapterError,
    },
}

impl CollectError {
    /// 数据点是否已在内存中生效
    pub fn is_committed(&self) -> bool {
        matches!(self, CollectError::Persist { .. })
    }

    /// 持久化失败时返回已写入内存的数据点，便于只重试持久化
    pub fn committed_point(&self) -> Option<(&str, &MetricPoint)> {
        match self {
            CollectError::Persist {
                metric_name, point, ..
            } => Some((metric_name.as_str(), point)),
            CollectError::Rejected(_) => None,
        }
    }
}

fn rejection_reason(err: &StoreError) -> &'static str {
    match err {
        StoreError::CapacityExceeded { .. } => "capacity",
        StoreError::InvalidName { .. } => "invalid_name",
        StoreError::InvalidValue { .. } => "invalid_value",
        StoreError::InvalidParams { .. } | StoreError::InvalidRule { .. } => "invalid_config",
        StoreError::MetricDisabled(_) => "disabled",
        StoreError::ValueBelowMinimum { .. } | StoreError::ValueAboveMaximum { .. } => "out_of_range",
        StoreError::RateOfChangeExceeded { .. } => "rate_of_change",
        StoreError::RateLimited { .. } => "rate_limited",
    }
}

/// 指标采集入口：先写内存，再持久化
///
/// 内存写入完成并释放锁之后才开始持久化，告警评估不会被后端延迟阻塞。
pub struct MetricsCollector {
    store: Arc<MetricStore>,
    adapter: Arc<dyn PersistenceAdapter>,
    telemetry: Arc<WatchTelemetry>,
}

impl MetricsCollector {
    pub fn new(
        store: Arc<MetricStore>,
        adapter: Arc<dyn PersistenceAdapter>,
        telemetry: Arc<WatchTelemetry>,
    ) -> Self {
        Self {
            store,
            adapter,
            telemetry,
        }
    }

    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    pub fn telemetry(&self) -> &Arc<WatchTelemetry> {
        &self.telemetry
    }

    pub async fn collect(&self, name: &str, value: f64) -> Result<MetricPoint, CollectError> {
        self.collect_at(name, value, None).await
    }

    pub async fn collect_at(
        &self,
        name: &str,
        value: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<MetricPoint, CollectError> {
        let point = match self.store.collect(name, value, timestamp).await {
            Ok(point) => point,
            Err(err) => {
                self.telemetry.record_rejected(rejection_reason(&err));
                return Err(CollectError::Rejected(err));
            }
        };

        self.telemetry.record_collected();
        self.telemetry.set_tracked_series(self.store.series_count().await);

        self.persist(name, point).await?;
        Ok(point)
    }

    /// 只重试持久化，不会再次写入内存
    pub async fn retry_persist(&self, name: &str, point: &MetricPoint) -> Result<(), AdapterError> {
        self.adapter.persist(name, point).await
    }

    async fn persist(&self, name: &str, point: MetricPoint) -> Result<(), CollectError> {
        match self.adapter.persist(name, &point).await {
            Ok(()) => {
                debug!(metric = %name, backend = self.adapter.name(), "Point persisted");
                Ok(())
            }
            Err(source) => {
                error!(
                    metric = %name,
                    backend = self.adapter.name(),
                    error = %source,
                    "Failed to persist metric point"
                );
                self.telemetry.record_persist_failure();

                Err(CollectError::Persist {
                    metric_name: name.to_string(),
                    point,
                    source,
                })
            }
        }
    }
}
