use serde::{Deserialize, Serialize};

/// One measurement attempt. Failed attempts carry the reason for logging.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Ok(f64),
    Failed(String),
}

impl Sample {
    pub fn value(&self) -> Option<f64> {
        match self {
            Sample::Ok(v) => Some(*v),
            Sample::Failed(_) => None,
        }
    }
}

impl<E: std::fmt::Display> From<Result<f64, E>> for Sample {
    fn from(result: Result<f64, E>) -> Self {
        match result {
            Ok(v) => Sample::Ok(v),
            Err(e) => Sample::Failed(e.to_string()),
        }
    }
}

/// Summary of a series of samples.
///
/// When no sample succeeded the metric is the zero record with
/// `available == false`, so a measured zero is never confused with "no data".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetric {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub sample_count: usize,
    pub attempts: usize,
    pub unit: String,
    pub available: bool,
}

impl AggregatedMetric {
    pub fn unavailable(unit: &str, attempts: usize) -> Self {
        Self {
            average: 0.0,
            min: 0.0,
            max: 0.0,
            sample_count: 0,
            attempts,
            unit: unit.to_string(),
            available: false,
        }
    }

    /// The average, or `None` when nothing was measured.
    pub fn measured(&self) -> Option<f64> {
        self.available.then_some(self.average)
    }
}

/// Reduce samples to {average, min, max, count} over the successful ones.
pub fn aggregate(samples: &[Sample], unit: &str) -> AggregatedMetric {
    let values: Vec<f64> = samples.iter().filter_map(Sample::value).collect();
    if values.is_empty() {
        return AggregatedMetric::unavailable(unit, samples.len());
    }

    let sum: f64 = values.iter().sum();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    AggregatedMetric {
        // mean stays within [min, max] even with float summation drift
        average: (sum / values.len() as f64).clamp(min, max),
        min,
        max,
        sample_count: values.len(),
        attempts: samples.len(),
        unit: unit.to_string(),
        available: true,
    }
}
