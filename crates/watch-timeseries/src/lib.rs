pub mod error;
pub mod model;
pub mod series;
pub mod store;

pub use error::{validate_metric_name, CapacityKind, StoreError, MAX_METRIC_NAME_LEN};
pub use model::{MetricParams, MetricPoint};
pub use series::MetricSeries;
pub use store::{MetricStore, StoreStats};
