pub mod config;
pub mod error;
pub mod types;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, AnalysisResult};
pub use types::{MetricRef, MetricSeries, MetricType, MonthKey};
