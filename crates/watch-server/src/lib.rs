pub mod app;
pub mod config;
pub mod input;

pub use app::{RunSummary, WatchApp};
pub use config::ServerConfig;
pub use input::{parse_line, InputLine, Observation, ParseError};
