pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod pipeline;
pub mod probes;
pub mod recommend;
pub mod report;
pub mod retry;
pub mod stats;
pub mod units;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, resolve_config, ProbeConfig, Thresholds};
pub use engine::{CommandOutput, CommandRunner, Engine, ProcessRunner};
pub use error::{ProbeError, Result};
pub use pipeline::Pipeline;
pub use report::{PerformanceReport, PipelineReport, Rating, Recommendation, ScanReport};
pub use stats::{aggregate, AggregatedMetric, Sample};
