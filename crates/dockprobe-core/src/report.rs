use crate::stats::AggregatedMetric;
use serde::{Deserialize, Serialize};

/// Severity tier of a vulnerability finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn priority(&self) -> u8 {
        match self {
            Severity::Critical => 5,
            Severity::High => 4,
            Severity::Medium => 3,
            Severity::Low => 2,
            Severity::Info => 1,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        }
    }

    /// Map scanner output ("HIGH", "Negligible", ...) onto a tier.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Info,
        }
    }
}

/// Banded efficiency rating. `Unknown` means the metric was not measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    Poor,
    Unknown,
}

impl Rating {
    pub fn label(&self) -> &'static str {
        match self {
            Rating::Excellent => "Excellent",
            Rating::Good => "Good",
            Rating::Fair => "Fair",
            Rating::Poor => "Poor",
            Rating::Unknown => "Unknown",
        }
    }

    /// CPU: <5% Excellent, <15% Good, <30% Fair, else Poor.
    pub fn for_cpu(percent: Option<f64>) -> Self {
        match percent {
            None => Rating::Unknown,
            Some(p) if p < 5.0 => Rating::Excellent,
            Some(p) if p < 15.0 => Rating::Good,
            Some(p) if p < 30.0 => Rating::Fair,
            Some(_) => Rating::Poor,
        }
    }

    /// Memory as percentage of limit: <10% Excellent, <25% Good, <50% Fair, else Poor.
    pub fn for_memory(percent: Option<f64>) -> Self {
        match percent {
            None => Rating::Unknown,
            Some(p) if p < 10.0 => Rating::Excellent,
            Some(p) if p < 25.0 => Rating::Good,
            Some(p) if p < 50.0 => Rating::Fair,
            Some(_) => Rating::Poor,
        }
    }

    /// Disk average MB/s: >100 Excellent, >50 Good, >20 Fair, else Poor.
    pub fn for_disk(mb_per_sec: Option<f64>) -> Self {
        match mb_per_sec {
            None => Rating::Unknown,
            Some(s) if s > 100.0 => Rating::Excellent,
            Some(s) if s > 50.0 => Rating::Good,
            Some(s) if s > 20.0 => Rating::Fair,
            Some(_) => Rating::Poor,
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationCategory {
    Build,
    Startup,
    Memory,
    #[serde(rename = "CPU")]
    Cpu,
    Network,
    Disk,
}

impl RecommendationCategory {
    pub fn label(&self) -> &'static str {
        match self {
            RecommendationCategory::Build => "Build",
            RecommendationCategory::Startup => "Startup",
            RecommendationCategory::Memory => "Memory",
            RecommendationCategory::Cpu => "CPU",
            RecommendationCategory::Network => "Network",
            RecommendationCategory::Disk => "Disk",
        }
    }
}

/// An advisory derived from a completed performance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: RecommendationCategory,
    pub priority: Priority,
    pub message: String,
}

/// One layer of the image history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub command: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageProfile {
    pub size_bytes: Option<u64>,
    /// Build order, base layer first.
    pub layers: Vec<LayerRecord>,
    /// Largest layers, biggest first.
    pub largest_layers: Vec<LayerRecord>,
}

impl ImageProfile {
    pub fn unavailable() -> Self {
        Self {
            size_bytes: None,
            layers: Vec::new(),
            largest_layers: Vec::new(),
        }
    }
}

/// Point-in-time memory usage. `None` fields render as "Unknown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub current_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub percentage: Option<f64>,
    pub efficiency: Rating,
}

impl MemoryUsage {
    pub fn unknown() -> Self {
        Self {
            current_bytes: None,
            total_bytes: None,
            percentage: None,
            efficiency: Rating::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub metric: AggregatedMetric,
    pub efficiency: Rating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetLatency {
    pub target: String,
    pub average_ms: f64,
}

/// Round-trip latency. Targets that never answered are left out entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkLatency {
    pub targets: Vec<TargetLatency>,
    pub average_ms: Option<f64>,
    pub status: NetworkStatus,
}

impl NetworkLatency {
    pub fn from_targets(targets: Vec<TargetLatency>) -> Self {
        if targets.is_empty() {
            return Self {
                targets,
                average_ms: None,
                status: NetworkStatus::Failed,
            };
        }
        let average = targets.iter().map(|t| t.average_ms).sum::<f64>() / targets.len() as f64;
        Self {
            targets,
            average_ms: Some(average),
            status: NetworkStatus::Success,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    pub megabytes: u64,
    pub duration_ms: f64,
    pub mb_per_sec: f64,
}

impl Throughput {
    pub fn new(megabytes: u64, duration_ms: f64) -> Self {
        // sub-millisecond runs are clamped to avoid infinite throughput
        let secs = duration_ms.max(1.0) / 1_000.0;
        Self {
            megabytes,
            duration_ms,
            mb_per_sec: megabytes as f64 / secs,
        }
    }
}

/// Sequential disk throughput; each direction succeeds or fails on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskIo {
    pub write: Option<Throughput>,
    pub read: Option<Throughput>,
    pub average_mb_per_sec: Option<f64>,
    pub overall: Rating,
}

impl DiskIo {
    pub fn from_directions(write: Option<Throughput>, read: Option<Throughput>) -> Self {
        let speeds: Vec<f64> = [&write, &read]
            .iter()
            .filter_map(|t| t.as_ref().map(|t| t.mb_per_sec))
            .collect();
        let average = (!speeds.is_empty()).then(|| speeds.iter().sum::<f64>() / speeds.len() as f64);
        Self {
            write,
            read,
            average_mb_per_sec: average,
            overall: Rating::for_disk(average),
        }
    }
}

/// Performance results for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub image: String,
    pub generated_at: String,
    pub image_profile: ImageProfile,
    pub build_time: AggregatedMetric,
    pub startup_time: AggregatedMetric,
    pub memory: MemoryUsage,
    pub cpu: CpuUsage,
    pub network: NetworkLatency,
    pub disk: DiskIo,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityFinding {
    pub package_name: String,
    pub version: String,
    pub severity: Severity,
    pub description: String,
    pub suggested_fix: String,
}

/// Which tier of the vulnerability chain produced the findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSource {
    Trivy,
    Grype,
    Heuristic,
}

impl ScanSource {
    pub fn label(&self) -> &'static str {
        match self {
            ScanSource::Trivy => "trivy",
            ScanSource::Grype => "grype",
            ScanSource::Heuristic => "heuristic",
        }
    }
}

/// Findings bucketed by severity tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityReport {
    pub source: ScanSource,
    pub total: usize,
    pub critical: Vec<VulnerabilityFinding>,
    pub high: Vec<VulnerabilityFinding>,
    pub medium: Vec<VulnerabilityFinding>,
    pub low: Vec<VulnerabilityFinding>,
    pub info: Vec<VulnerabilityFinding>,
}

impl VulnerabilityReport {
    pub fn from_findings(source: ScanSource, findings: Vec<VulnerabilityFinding>) -> Self {
        let mut report = Self {
            source,
            total: findings.len(),
            critical: Vec::new(),
            high: Vec::new(),
            medium: Vec::new(),
            low: Vec::new(),
            info: Vec::new(),
        };
        for finding in findings {
            report.bucket_mut(finding.severity).push(finding);
        }
        report
    }

    pub fn bucket(&self, severity: Severity) -> &[VulnerabilityFinding] {
        match severity {
            Severity::Critical => &self.critical,
            Severity::High => &self.high,
            Severity::Medium => &self.medium,
            Severity::Low => &self.low,
            Severity::Info => &self.info,
        }
    }

    fn bucket_mut(&mut self, severity: Severity) -> &mut Vec<VulnerabilityFinding> {
        match severity {
            Severity::Critical => &mut self.critical,
            Severity::High => &mut self.high,
            Severity::Medium => &mut self.medium,
            Severity::Low => &mut self.low,
            Severity::Info => &mut self.info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecretCategory {
    Password,
    Secret,
    Token,
    ApiKey,
    AwsAccessKey,
}

impl SecretCategory {
    pub fn label(&self) -> &'static str {
        match self {
            SecretCategory::Password => "password",
            SecretCategory::Secret => "secret",
            SecretCategory::Token => "token",
            SecretCategory::ApiKey => "api-key",
            SecretCategory::AwsAccessKey => "aws-access-key",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretFinding {
    /// Path relative to the extracted application directory.
    pub file: String,
    pub category: SecretCategory,
    pub occurrences: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionFinding {
    /// False when the checks could not be run; the flags are then meaningless.
    pub checked: bool,
    pub user: String,
    pub running_as_root: bool,
    pub writable_filesystem: bool,
    pub sudo_present: bool,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

impl PermissionFinding {
    pub fn unknown(reason: &str) -> Self {
        Self {
            checked: false,
            user: "Unknown".to_string(),
            running_as_root: false,
            writable_filesystem: false,
            sudo_present: false,
            issues: vec![format!("Permission checks could not run: {}", reason)],
            suggestions: Vec::new(),
        }
    }
}

/// Security results for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub image: String,
    pub generated_at: String,
    pub vulnerabilities: VulnerabilityReport,
    pub secrets: Vec<SecretFinding>,
    pub permissions: PermissionFinding,
}

impl ScanReport {
    pub fn secret_occurrences(&self) -> usize {
        self.secrets.iter().map(|s| s.occurrences).sum()
    }
}

/// Full benchmark + scan of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub performance: PerformanceReport,
    pub security: ScanReport,
}

/// Format milliseconds for display ("850ms", "13.2s", "2m 5s").
pub fn format_millis(ms: f64) -> String {
    if ms < 1_000.0 {
        format!("{:.0}ms", ms)
    } else if ms < 60_000.0 {
        format!("{:.1}s", ms / 1_000.0)
    } else {
        let secs = (ms / 1_000.0).round() as u64;
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
