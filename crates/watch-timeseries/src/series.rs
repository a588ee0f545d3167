use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

use crate::model::{MetricParams, MetricPoint};

/// 单个指标的有序数据点序列
///
/// 顺序即插入顺序；淘汰只从最旧的一端进行，不会改变剩余数据点的相对顺序。
#[derive(Debug, Clone)]
pub struct MetricSeries {
    name: String,
    points: VecDeque<MetricPoint>,
    params: MetricParams,
}

impl MetricSeries {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: VecDeque::new(),
            params: MetricParams::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &MetricParams {
        &self.params
    }

    pub fn set_params(&mut self, params: MetricParams) {
        self.params = params;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<MetricPoint> {
        self.points.back().copied()
    }

    /// 追加数据点，随后按保留时长和容量淘汰，返回淘汰的数量
    ///
    /// 容量取 `max_points` 与序列参数中的 `max_points`/`store_history` 的较小者。
    pub fn push(&mut self, point: MetricPoint, retention: Duration, max_points: usize) -> usize {
        self.points.push_back(point);

        let limit = self.params.point_limit(max_points);
        let mut evicted = self.evict_expired(point.timestamp, retention);
        while self.points.len() > limit {
            self.points.pop_front();
            evicted += 1;
        }

        evicted
    }

    /// 淘汰相对 `now` 超过保留时长的数据点
    pub fn evict_expired(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let cutoff = now - retention;
        let mut evicted = 0;

        while let Some(front) = self.points.front() {
            if front.timestamp < cutoff {
                self.points.pop_front();
                evicted += 1;
            } else {
                break;
            }
        }

        evicted
    }

    /// 完整快照
    pub fn snapshot(&self) -> Vec<MetricPoint> {
        self.points.iter().copied().collect()
    }

    /// 最近 `size` 个数据点，按插入顺序
    pub fn window(&self, size: usize) -> Vec<MetricPoint> {
        let start = self.points.len().saturating_sub(size);
        self.points.range(start..).copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricPoint> {
        self.points.iter()
    }
}
