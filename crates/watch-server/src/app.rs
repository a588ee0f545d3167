use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};
use watch_metrics::{
    AlertEvaluator, AlertRuleSet, MemoryAdapter, MetricsCollector, PersistenceAdapter,
    RetryingAdapter, WatchTelemetry,
};
use watch_timeseries::MetricStore;

use crate::config::ServerConfig;
use crate::input::{parse_line, InputLine, Observation};

/// 一次运行的统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub lines: usize,
    pub collected: usize,
    pub rejected: usize,
    pub persist_failures: usize,
    pub malformed: usize,
    pub batches: usize,
    pub alerts_triggered: usize,
}

/// 组装好的存储、规则、采集与评估组件
pub struct WatchApp {
    store: Arc<MetricStore>,
    rules: Arc<AlertRuleSet>,
    telemetry: Arc<WatchTelemetry>,
    collector: MetricsCollector,
    evaluator: AlertEvaluator,
}

impl WatchApp {
    /// 使用进程内持久化后端
    pub async fn build(config: &ServerConfig) -> Result<Self> {
        Self::with_adapter(config, MemoryAdapter::new()).await
    }

    pub async fn with_adapter<A>(config: &ServerConfig, adapter: A) -> Result<Self>
    where
        A: PersistenceAdapter + 'static,
    {
        let telemetry = Arc::new(WatchTelemetry::new()?);
        let store = Arc::new(MetricStore::new(config.monitoring.clone()));

        let rules = Arc::new(AlertRuleSet::from_config(&config.monitoring));
        for rule in &config.rules {
            rules.add(rule.clone()).await?;
        }

        for (name, params) in &config.metrics {
            store.configure_metric(name, params.clone()).await?;
        }

        let adapter = RetryingAdapter::new(adapter, config.retry.clone())
            .with_telemetry(telemetry.clone());
        let collector = MetricsCollector::new(store.clone(), Arc::new(adapter), telemetry.clone());
        let evaluator =
            AlertEvaluator::new(store.clone(), rules.clone()).with_telemetry(telemetry.clone());

        info!(
            rules = config.rules.len(),
            configured_metrics = config.metrics.len(),
            "Chain watch initialized"
        );

        Ok(Self {
            store,
            rules,
            telemetry,
            collector,
            evaluator,
        })
    }

    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    pub fn rules(&self) -> &Arc<AlertRuleSet> {
        &self.rules
    }

    pub fn telemetry(&self) -> &Arc<WatchTelemetry> {
        &self.telemetry
    }

    /// 逐行读取观测并写入；空行和输入结束时输出一批告警结果（每行一个 JSON）
    pub async fn run<R, W>(&self, reader: R, writer: &mut W) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut summary = RunSummary::default();
        let mut pending = false;
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            summary.lines += 1;

            match parse_line(&line) {
                Ok(InputLine::Observation(observation)) => {
                    self.ingest(observation, &mut summary).await;
                    pending = true;
                }
                Ok(InputLine::BatchEnd) => {
                    if pending {
                        self.flush_batch(writer, &mut summary).await?;
                        pending = false;
                    }
                }
                Ok(InputLine::Comment) => {}
                Err(err) => {
                    summary.malformed += 1;
                    warn!(line = summary.lines, error = %err, "Skipping malformed input line");
                }
            }
        }

        if pending {
            self.flush_batch(writer, &mut summary).await?;
        }

        info!(
            lines = summary.lines,
            collected = summary.collected,
            rejected = summary.rejected,
            batches = summary.batches,
            "Input processed"
        );
        Ok(summary)
    }

    async fn ingest(&self, observation: Observation, summary: &mut RunSummary) {
        let result = self
            .collector
            .collect_at(&observation.metric_name, observation.value, observation.timestamp)
            .await;

        match result {
            Ok(_) => summary.collected += 1,
            Err(err) if err.is_committed() => {
                summary.collected += 1;
                summary.persist_failures += 1;
                warn!(metric = %observation.metric_name, error = %err, "Point kept in memory only");
            }
            Err(err) => {
                summary.rejected += 1;
                warn!(metric = %observation.metric_name, error = %err, "Observation rejected");
            }
        }
    }

    async fn flush_batch<W>(&self, writer: &mut W, summary: &mut RunSummary) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        for result in self.evaluator.check_all().await {
            if result.triggered {
                summary.alerts_triggered += 1;
            }
            let mut line = serde_json::to_string(&result)?;
            line.push('\n');
            writer.write_all(line.as_bytes()).await?;
        }

        writer.flush().await?;
        summary.batches += 1;
        Ok(())
    }
}
