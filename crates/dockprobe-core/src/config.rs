use crate::error::{ProbeError, Result};
use crate::report::Severity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the project directory.
pub const DEFAULT_CONFIG_FILE: &str = ".dockprobe.toml";

/// Everything the pipeline, probes and recommendation engine are tuned by.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    pub pipeline: PipelineSettings,
    pub probes: ProbeSettings,
    pub thresholds: Thresholds,
    pub runtime: RuntimeSettings,
    pub vulnerable_packages: Vec<VulnerableRule>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineSettings::default(),
            probes: ProbeSettings::default(),
            thresholds: Thresholds::default(),
            runtime: RuntimeSettings::default(),
            vulnerable_packages: default_vulnerable_packages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Build context used when no image tag is supplied
    pub context_dir: PathBuf,
    /// Keep a pipeline-built image instead of removing it at the end
    pub keep_image: bool,
    pub tag_prefix: String,
    /// Upper bound on a single image build
    pub build_timeout_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            context_dir: PathBuf::from("."),
            keep_image: false,
            tag_prefix: "dockprobe-bench".to_string(),
            build_timeout_ms: 600_000,
        }
    }
}

impl PipelineSettings {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_millis(self.build_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProbeSettings {
    pub build_iterations: usize,
    pub startup_iterations: usize,
    pub readiness_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub warmup_ms: u64,
    pub cpu_samples: usize,
    pub cpu_sample_interval_ms: u64,
    pub ping_targets: Vec<String>,
    pub ping_count: u32,
    /// Fixed regardless of the container's resources.
    pub disk_write_mb: u64,
    pub disk_read_mb: u64,
    /// Directory inside the image holding the application.
    pub app_dir: String,
    pub top_layers: usize,
    /// Upper bound on any engine call other than a build
    pub command_timeout_ms: u64,
    /// Upper bound on an external vulnerability scanner run
    pub scan_timeout_ms: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            build_iterations: 3,
            startup_iterations: 5,
            readiness_timeout_ms: 30_000,
            poll_interval_ms: 500,
            warmup_ms: 5_000,
            cpu_samples: 10,
            cpu_sample_interval_ms: 1_000,
            ping_targets: vec![
                "8.8.8.8".to_string(),
                "1.1.1.1".to_string(),
                "google.com".to_string(),
            ],
            ping_count: 3,
            disk_write_mb: 100,
            disk_read_mb: 50,
            app_dir: "/app".to_string(),
            top_layers: 5,
            command_timeout_ms: 120_000,
            scan_timeout_ms: 600_000,
        }
    }
}

impl ProbeSettings {
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn cpu_sample_interval(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_interval_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }
}

/// Limits above which a recommendation is raised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    pub build_time_ms: f64,
    pub startup_time_ms: f64,
    pub memory_percent: f64,
    pub cpu_percent: f64,
    pub latency_ms: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            build_time_ms: 60_000.0,
            startup_time_ms: 10_000.0,
            memory_percent: 80.0,
            cpu_percent: 50.0,
            latency_ms: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Oldest Node.js major line still receiving security fixes
    pub min_supported_node_major: u32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            min_supported_node_major: 18,
        }
    }
}

/// A known-vulnerable package for the built-in heuristic scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VulnerableRule {
    pub name: String,
    /// `*`, `<X`, `<=X` or an exact version
    pub versions: String,
    pub severity: Severity,
    pub description: String,
    pub fix: String,
}

impl VulnerableRule {
    fn new(name: &str, versions: &str, severity: Severity, description: &str, fix: &str) -> Self {
        Self {
            name: name.to_string(),
            versions: versions.to_string(),
            severity,
            description: description.to_string(),
            fix: fix.to_string(),
        }
    }
}

/// The built-in vulnerable package table.
pub fn default_vulnerable_packages() -> Vec<VulnerableRule> {
    vec![
        VulnerableRule::new(
            "lodash",
            "<4.17.21",
            Severity::High,
            "Prototype pollution and command injection in template",
            "Upgrade to lodash@4.17.21 or later",
        ),
        VulnerableRule::new(
            "request",
            "*",
            Severity::High,
            "Deprecated package with unpatched SSRF issue",
            "Replace with axios, got or native fetch",
        ),
        VulnerableRule::new(
            "minimist",
            "<1.2.6",
            Severity::Critical,
            "Prototype pollution via constructor keys",
            "Upgrade to minimist@1.2.6 or later",
        ),
        VulnerableRule::new(
            "axios",
            "<0.21.2",
            Severity::High,
            "Server-side request forgery and ReDoS",
            "Upgrade to axios@0.21.2 or later",
        ),
        VulnerableRule::new(
            "node-fetch",
            "<2.6.7",
            Severity::Medium,
            "Exposure of sensitive headers on redirect",
            "Upgrade to node-fetch@2.6.7 or later",
        ),
        VulnerableRule::new(
            "express",
            "<4.17.3",
            Severity::Medium,
            "Open redirect and qs prototype pollution",
            "Upgrade to express@4.17.3 or later",
        ),
        VulnerableRule::new(
            "moment",
            "<2.29.4",
            Severity::High,
            "Inefficient regular expression complexity (ReDoS)",
            "Upgrade to moment@2.29.4 or migrate to date-fns/luxon",
        ),
        VulnerableRule::new(
            "jsonwebtoken",
            "<9.0.0",
            Severity::High,
            "Insecure key type handling allows signature bypass",
            "Upgrade to jsonwebtoken@9.0.0 or later",
        ),
    ]
}

impl ProbeConfig {
    /// Built-in defaults, including the default vulnerable package table.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Parse a TOML document. An empty package table falls back to the built-in one.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self> {
        let mut config: ProbeConfig = toml::from_str(content).map_err(|e| ProbeError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if config.vulnerable_packages.is_empty() {
            config.vulnerable_packages = default_vulnerable_packages();
        }
        Ok(config)
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProbeConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ProbeError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    ProbeConfig::from_toml(&content, path)
}

/// Load `path` if given, else `<dir>/.dockprobe.toml` if present, else defaults.
pub fn resolve_config(explicit: Option<&Path>, dir: &Path) -> Result<ProbeConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    if candidate.is_file() {
        load_config(&candidate)
    } else {
        Ok(ProbeConfig::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_defaults() {
        let config = ProbeConfig::builtin();
        assert_eq!(config.probes.build_iterations, 3);
        assert_eq!(config.probes.startup_iterations, 5);
        assert_eq!(config.probes.ping_targets.len(), 3);
        assert_eq!(config.probes.disk_write_mb, 100);
        assert_eq!(config.probes.disk_read_mb, 50);
        assert_eq!(config.thresholds.build_time_ms, 60_000.0);
        assert!(config.vulnerable_packages.iter().any(|r| r.name == "request"));
        assert!(!config.pipeline.keep_image);
        assert_eq!(config.pipeline.build_timeout(), Duration::from_secs(600));
        assert_eq!(config.probes.command_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_default_carries_vulnerable_table() {
        let config = ProbeConfig::default();
        assert_eq!(config.vulnerable_packages, default_vulnerable_packages());
        assert_eq!(config, ProbeConfig::builtin());
    }

    #[test]
    fn test_timeouts_from_toml() {
        let toml = r#"
[pipeline]
build_timeout_ms = 90000

[probes]
command_timeout_ms = 15000
scan_timeout_ms = 45000
"#;
        let config = ProbeConfig::from_toml(toml, Path::new("x.toml")).unwrap();
        assert_eq!(config.pipeline.build_timeout(), Duration::from_secs(90));
        assert_eq!(config.probes.command_timeout(), Duration::from_secs(15));
        assert_eq!(config.probes.scan_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
[probes]
startup_iterations = 2
ping_targets = ["9.9.9.9"]

[thresholds]
cpu_percent = 75.0
"#;
        let config = ProbeConfig::from_toml(toml, Path::new("x.toml")).unwrap();
        assert_eq!(config.probes.startup_iterations, 2);
        assert_eq!(config.probes.build_iterations, 3);
        assert_eq!(config.probes.ping_targets, vec!["9.9.9.9"]);
        assert_eq!(config.thresholds.cpu_percent, 75.0);
        assert_eq!(config.thresholds.memory_percent, 80.0);
        assert_eq!(config.vulnerable_packages, default_vulnerable_packages());
    }

    #[test]
    fn test_custom_vulnerable_table_replaces_builtin() {
        let toml = r#"
[[vulnerable_packages]]
name = "leftpad"
versions = "<1.3.0"
severity = "low"
description = "Unpublished package"
fix = "Use String.prototype.padStart"
"#;
        let config = ProbeConfig::from_toml(toml, Path::new("x.toml")).unwrap();
        assert_eq!(config.vulnerable_packages.len(), 1);
        assert_eq!(config.vulnerable_packages[0].severity, Severity::Low);
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let err = ProbeConfig::from_toml("[probes\n", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_resolve_prefers_project_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "[pipeline]\nkeep_image = true\n",
        )
        .unwrap();
        let config = resolve_config(None, dir.path()).unwrap();
        assert!(config.pipeline.keep_image);

        let empty = tempfile::tempdir().unwrap();
        let config = resolve_config(None, empty.path()).unwrap();
        assert_eq!(config, ProbeConfig::builtin());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = resolve_config(Some(Path::new("/nonexistent/dockprobe.toml")), Path::new("."));
        assert!(matches!(err, Err(ProbeError::Config { .. })));
    }
}
