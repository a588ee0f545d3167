pub mod global;
pub mod loader;
pub mod logging;
pub mod monitoring;
pub mod retry;

pub use global::GlobalConfig;
pub use loader::{ConfigLoader, CONFIG_FILE_NAME, ENV_PREFIX};
pub use logging::{LogFormat, LoggingConfig};
pub use monitoring::{CapacityPolicy, MonitoringConfig, MAX_RETENTION_SECS};
pub use retry::RetryConfig;
