use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use watch_config::{CapacityPolicy, MonitoringConfig};

use crate::error::{validate_metric_name, CapacityKind, StoreError};
use crate::model::{MetricParams, MetricPoint};
use crate::series::MetricSeries;

/// 存储统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub series_count: usize,
    pub point_count: usize,
}

/// 注册表中的一个序列，带最近更新序号
struct SeriesSlot {
    series: RwLock<MetricSeries>,
    last_touch: AtomicU64,
    /// 已从注册表移除（淘汰或清除）
    detached: AtomicBool,
}

impl SeriesSlot {
    fn new(name: &str, tick: u64) -> Self {
        Self {
            series: RwLock::new(MetricSeries::new(name)),
            last_touch: AtomicU64::new(tick),
            detached: AtomicBool::new(false),
        }
    }

    fn touch(&self, tick: u64) {
        self.last_touch.store(tick, Ordering::Relaxed);
    }

    /// 在持有注册表写锁时调用
    fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

/// 指标存储
///
/// 按指标名加锁：注册表只在查找或创建序列时短暂持有，
/// 写入与读取只锁定涉及的那个序列，不同指标之间互不阻塞。
pub struct MetricStore {
    config: MonitoringConfig,
    retention: Duration,
    sampling_interval: Duration,
    registry: RwLock<HashMap<String, Arc<SeriesSlot>>>,
    clock: AtomicU64,
}

impl MetricStore {
    pub fn new(config: MonitoringConfig) -> Self {
        let retention = Duration::seconds(config.retention_period().as_secs() as i64);
        let sampling_interval = Duration::seconds(config.sampling_interval_secs.min(i32::MAX as u64) as i64);

        info!(
            max_metrics = config.max_metrics,
            retention_secs = retention.num_seconds(),
            max_data_points = config.max_data_points,
            capacity_policy = ?config.metric_capacity,
            "Metric store created"
        );

        Self {
            config,
            retention,
            sampling_interval,
            registry: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// 写入一个数据点，序列不存在时创建
    ///
    /// 新指标名在达到 `max_metrics` 时按容量策略处理；拒绝时不会留下空序列。
    /// 写入后从序列头部淘汰过期或超出容量的数据点。
    ///
    /// 取得序列后、加写锁前，序列可能被并发的淘汰或 `clear` 移出注册表。
    /// 加锁后若发现序列已移除，则重新查找或创建，保证写入时序列仍在注册表中。
    pub async fn collect(
        &self,
        name: &str,
        value: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<MetricPoint, StoreError> {
        validate_metric_name(name)?;

        if !value.is_finite() {
            return Err(StoreError::InvalidValue {
                metric: name.to_string(),
                value,
            });
        }

        let point = MetricPoint::at(timestamp.unwrap_or_else(Utc::now), value);

        loop {
            let slot = self.slot_or_create(name).await?;

            let evicted = {
                let mut series = slot.series.write().await;
                if slot.is_detached() {
                    None
                } else {
                    self.admit(&series, &point)?;
                    Some(series.push(point, self.retention, self.config.max_data_points))
                }
            };

            let Some(evicted) = evicted else {
                debug!(metric = %name, "Series removed before write, retrying");
                continue;
            };
            slot.touch(self.tick());

            debug!(metric = %name, value, evicted, "Metric point collected");
            return Ok(point);
        }
    }

    /// 写入前的参数与频率检查
    fn admit(&self, series: &MetricSeries, point: &MetricPoint) -> Result<(), StoreError> {
        let last = series.latest();
        series.params().admit(series.name(), point, last.as_ref())?;

        if self.config.rate_limiting_enabled {
            if let Some(last) = last {
                let elapsed = point.timestamp - last.timestamp;
                if elapsed < self.sampling_interval {
                    return Err(StoreError::RateLimited {
                        metric: series.name().to_string(),
                        elapsed_ms: elapsed.num_milliseconds(),
                        interval_ms: self.sampling_interval.num_milliseconds(),
                    });
                }
            }
        }

        Ok(())
    }

    /// 设置指标参数，序列不存在时按容量策略创建
    pub async fn configure_metric(&self, name: &str, params: MetricParams) -> Result<(), StoreError> {
        validate_metric_name(name)?;
        params.check(name)?;

        let slot = self.slot_or_create(name).await?;
        slot.series.write().await.set_params(params);

        info!(metric = %name, "Metric params configured");
        Ok(())
    }

    async fn slot(&self, name: &str) -> Option<Arc<SeriesSlot>> {
        let registry = self.registry.read().await;
        registry.get(name).cloned()
    }

    async fn slot_or_create(&self, name: &str) -> Result<Arc<SeriesSlot>, StoreError> {
        if let Some(slot) = self.slot(name).await {
            return Ok(slot);
        }

        let mut registry = self.registry.write().await;

        // 获取写锁期间可能已被其他写入方创建
        if let Some(slot) = registry.get(name) {
            return Ok(slot.clone());
        }

        if let Some(limit) = self.config.metric_limit() {
            if registry.len() >= limit {
                if self.config.metric_capacity == CapacityPolicy::EvictLeastRecent {
                    Self::evict_least_recent(&mut registry, limit);
                }

                if registry.len() >= limit {
                    warn!(metric = %name, limit, "Metric capacity exceeded");
                    return Err(StoreError::CapacityExceeded {
                        kind: CapacityKind::Metrics,
                        limit,
                    });
                }
            }
        }

        let slot = Arc::new(SeriesSlot::new(name, self.tick()));
        registry.insert(name.to_string(), slot.clone());

        info!(metric = %name, series_count = registry.len(), "Series created");
        Ok(slot)
    }

    fn evict_least_recent(registry: &mut HashMap<String, Arc<SeriesSlot>>, limit: usize) {
        while registry.len() >= limit {
            let oldest = registry
                .iter()
                .min_by_key(|(_, slot)| slot.last_touch.load(Ordering::Relaxed))
                .map(|(name, _)| name.clone());

            match oldest {
                Some(name) => {
                    if let Some(slot) = registry.remove(&name) {
                        slot.detach();
                    }
                    info!(metric = %name, "Least recently updated series evicted");
                }
                None => break,
            }
        }
    }

    /// 最近一个数据点
    pub async fn latest_value(&self, name: &str) -> Option<MetricPoint> {
        let slot = self.slot(name).await?;
        let series = slot.series.read().await;
        series.latest()
    }

    /// 完整历史快照，按插入顺序
    pub async fn history(&self, name: &str) -> Vec<MetricPoint> {
        match self.slot(name).await {
            Some(slot) => slot.series.read().await.snapshot(),
            None => Vec::new(),
        }
    }

    /// 最近 `size` 个数据点
    pub async fn window(&self, name: &str, size: usize) -> Vec<MetricPoint> {
        if size == 0 {
            return Vec::new();
        }

        match self.slot(name).await {
            Some(slot) => slot.series.read().await.window(size),
            None => Vec::new(),
        }
    }

    pub async fn params(&self, name: &str) -> Option<MetricParams> {
        let slot = self.slot(name).await?;
        let series = slot.series.read().await;
        Some(series.params().clone())
    }

    /// 删除指定序列；`None` 时删除全部
    pub async fn clear(&self, name: Option<&str>) {
        let mut registry = self.registry.write().await;

        match name {
            Some(name) => {
                if let Some(slot) = registry.remove(name) {
                    slot.detach();
                    info!(metric = %name, "Series cleared");
                }
            }
            None => {
                let count = registry.len();
                registry.values().for_each(|slot| slot.detach());
                registry.clear();
                info!(series_count = count, "All series cleared");
            }
        }
    }

    /// 对所有序列按 `now` 执行过期淘汰，返回淘汰的数据点数
    ///
    /// 不再收到数据的序列不会在写入时触发淘汰，需要定期调用。
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let slots: Vec<Arc<SeriesSlot>> = self.registry.read().await.values().cloned().collect();

        let mut evicted = 0;
        for slot in slots {
            evicted += slot.series.write().await.evict_expired(now, self.retention);
        }

        if evicted > 0 {
            debug!(evicted, "Expired metric points purged");
        }
        evicted
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.registry.read().await.contains_key(name)
    }

    pub async fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn series_count(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn stats(&self) -> StoreStats {
        let slots: Vec<Arc<SeriesSlot>> = self.registry.read().await.values().cloned().collect();

        let mut point_count = 0;
        for slot in &slots {
            point_count += slot.series.read().await.len();
        }

        StoreStats {
            series_count: slots.len(),
            point_count,
        }
    }
}
