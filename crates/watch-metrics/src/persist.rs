use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use watch_config::RetryConfig;
use watch_timeseries::MetricPoint;

use crate::telemetry::WatchTelemetry;

/// 持久化错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdapterError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Backend capacity exhausted: {0}")]
    Capacity(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Persist failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<AdapterError>,
    },
}

impl AdapterError {
    /// 鉴权失败重试无意义，其余错误可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            AdapterError::Network(_) | AdapterError::Capacity(_) | AdapterError::Backend(_) => true,
            AdapterError::Unauthorized(_) | AdapterError::RetriesExhausted { .. } => false,
        }
    }
}

/// 持久化后端接口
///
/// 由外部实现（账本、数据库等），这里只消费。
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// 持久化一个数据点
    async fn persist(&self, metric_name: &str, point: &MetricPoint) -> Result<(), AdapterError>;

    fn name(&self) -> &str;
}

/// 已持久化的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistRecord {
    pub metric_name: String,
    pub point: MetricPoint,
}

/// 进程内持久化后端
///
/// 克隆后共享同一份记录。
#[derive(Clone, Default)]
pub struct MemoryAdapter {
    records: Arc<RwLock<Vec<PersistRecord>>>,
    capacity: Option<usize>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 达到容量后返回 `AdapterError::Capacity`
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            capacity: Some(capacity),
        }
    }

    pub async fn records(&self) -> Vec<PersistRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryAdapter {
    async fn persist(&self, metric_name: &str, point: &MetricPoint) -> Result<(), AdapterError> {
        let mut records = self.records.write().await;

        if let Some(capacity) = self.capacity {
            if records.len() >= capacity {
                return Err(AdapterError::Capacity(format!(
                    "memory backend holds {} records",
                    capacity
                )));
            }
        }

        records.push(PersistRecord {
            metric_name: metric_name.to_string(),
            point: *point,
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// 带指数退避重试的持久化装饰器
pub struct RetryingAdapter<A> {
    inner: A,
    config: RetryConfig,
    telemetry: Option<Arc<WatchTelemetry>>,
}

impl<A: PersistenceAdapter> RetryingAdapter<A> {
    pub fn new(inner: A, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<WatchTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

#[async_trait]
impl<A: PersistenceAdapter> PersistenceAdapter for RetryingAdapter<A> {
    async fn persist(&self, metric_name: &str, point: &MetricPoint) -> Result<(), AdapterError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match self.inner.persist(metric_name, point).await {
                Ok(()) => {
                    debug!(metric = %metric_name, attempt, backend = self.inner.name(), "Point persisted");
                    return Ok(());
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            if attempt >= max_attempts {
                return Err(AdapterError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let backoff = self.config.backoff_for(attempt - 1);
            warn!(
                metric = %metric_name,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "Persist failed, retrying"
            );

            if let Some(telemetry) = &self.telemetry {
                telemetry.record_persist_retry();
            }

            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
