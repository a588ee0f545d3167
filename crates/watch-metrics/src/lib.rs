pub mod alert;
pub mod collector;
pub mod evaluator;
pub mod persist;
pub mod telemetry;

pub use alert::{AlertCondition, AlertResult, AlertRule, AlertRuleSet};
pub use collector::{CollectError, MetricsCollector};
pub use evaluator::{AlertEvaluator, TrendStats};
pub use persist::{AdapterError, MemoryAdapter, PersistRecord, PersistenceAdapter, RetryingAdapter};
pub use telemetry::WatchTelemetry;
