use super::ProbeContext;
use crate::config::{RuntimeSettings, VulnerableRule};
use crate::engine::CommandRunner;
use crate::error::{ProbeError, Result};
use crate::report::{ScanSource, Severity, VulnerabilityFinding, VulnerabilityReport};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a single tier of the scan chain produced.
#[derive(Debug)]
pub enum SourceOutcome {
    Found(Vec<VulnerabilityFinding>),
    /// This tier cannot run here; try the next one.
    Unavailable(ProbeError),
}

/// One tier of the vulnerability scan chain.
pub trait VulnerabilitySource {
    fn source(&self) -> ScanSource;

    fn scan(&self, ctx: &ProbeContext<'_>) -> SourceOutcome;
}

/// External scanners first, built-in heuristic last.
pub fn default_sources() -> Vec<Box<dyn VulnerabilitySource>> {
    vec![
        Box::new(TrivySource),
        Box::new(GrypeSource),
        Box::new(HeuristicSource),
    ]
}

/// Try each source in order; the first one that runs wins.
pub fn scan_vulnerabilities(
    ctx: &ProbeContext<'_>,
    sources: &[Box<dyn VulnerabilitySource>],
) -> VulnerabilityReport {
    for source in sources {
        match source.scan(ctx) {
            SourceOutcome::Found(findings) => {
                info!(
                    "Vulnerability scan via {}: {} findings",
                    source.source().label(),
                    findings.len()
                );
                return VulnerabilityReport::from_findings(source.source(), findings);
            }
            SourceOutcome::Unavailable(reason) => {
                debug!("Skipping {}: {}", source.source().label(), reason);
            }
        }
    }

    warn!("No vulnerability source could run");
    VulnerabilityReport::from_findings(ScanSource::Heuristic, Vec::new())
}

/// Run a host tool and return stdout, or why it is unusable. Overrunning
/// `timeout` counts as unusable.
fn run_tool(
    runner: &dyn CommandRunner,
    tool: &str,
    args: &[&str],
    timeout: Duration,
) -> std::result::Result<String, ProbeError> {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let unavailable = |reason: String| ProbeError::ToolUnavailable {
        tool: tool.to_string(),
        reason,
    };

    debug!("{} {}", tool, args.join(" "));
    let output = runner
        .run(tool, &args, timeout)
        .map_err(|e| unavailable(e.to_string()))?;
    if !output.is_success() {
        return Err(unavailable(format!(
            "exit code {:?}: {}",
            output.code,
            output.stderr.trim()
        )));
    }
    Ok(output.stdout)
}

// ─── trivy ───

pub struct TrivySource;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyReport {
    #[serde(default)]
    results: Option<Vec<TrivyResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyResult {
    #[serde(default)]
    vulnerabilities: Option<Vec<TrivyVulnerability>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyVulnerability {
    #[serde(rename = "VulnerabilityID")]
    vulnerability_id: String,
    pkg_name: String,
    installed_version: String,
    #[serde(default)]
    fixed_version: Option<String>,
    severity: String,
    #[serde(default)]
    title: Option<String>,
}

impl VulnerabilitySource for TrivySource {
    fn source(&self) -> ScanSource {
        ScanSource::Trivy
    }

    fn scan(&self, ctx: &ProbeContext<'_>) -> SourceOutcome {
        let runner = ctx.engine.runner();
        match run_tool(
            runner,
            "trivy",
            &["image", "--format", "json", "--quiet", ctx.image],
            ctx.config.probes.scan_timeout(),
        ) {
            Ok(stdout) => match parse_trivy(&stdout) {
                Ok(findings) => SourceOutcome::Found(findings),
                Err(e) => SourceOutcome::Unavailable(e),
            },
            Err(e) => SourceOutcome::Unavailable(e),
        }
    }
}

pub fn parse_trivy(json: &str) -> Result<Vec<VulnerabilityFinding>> {
    let report: TrivyReport = serde_json::from_str(json)
        .map_err(|e| ProbeError::measurement("trivy", format!("invalid JSON: {}", e)))?;

    Ok(report
        .results
        .unwrap_or_default()
        .into_iter()
        .flat_map(|r| r.vulnerabilities.unwrap_or_default())
        .map(|v| VulnerabilityFinding {
            package_name: v.pkg_name,
            version: v.installed_version,
            severity: Severity::from_label(&v.severity),
            description: match v.title {
                Some(title) => format!("{}: {}", v.vulnerability_id, title),
                None => v.vulnerability_id,
            },
            suggested_fix: fix_text(v.fixed_version.as_deref()),
        })
        .collect())
}

// ─── grype ───

pub struct GrypeSource;

#[derive(Debug, Deserialize)]
struct GrypeReport {
    #[serde(default)]
    matches: Vec<GrypeMatch>,
}

#[derive(Debug, Deserialize)]
struct GrypeMatch {
    vulnerability: GrypeVulnerability,
    artifact: GrypeArtifact,
}

#[derive(Debug, Deserialize)]
struct GrypeVulnerability {
    id: String,
    severity: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    fix: Option<GrypeFix>,
}

#[derive(Debug, Deserialize)]
struct GrypeFix {
    #[serde(default)]
    versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GrypeArtifact {
    name: String,
    version: String,
}

impl VulnerabilitySource for GrypeSource {
    fn source(&self) -> ScanSource {
        ScanSource::Grype
    }

    fn scan(&self, ctx: &ProbeContext<'_>) -> SourceOutcome {
        let runner = ctx.engine.runner();
        match run_tool(
            runner,
            "grype",
            &[ctx.image, "-o", "json", "-q"],
            ctx.config.probes.scan_timeout(),
        ) {
            Ok(stdout) => match parse_grype(&stdout) {
                Ok(findings) => SourceOutcome::Found(findings),
                Err(e) => SourceOutcome::Unavailable(e),
            },
            Err(e) => SourceOutcome::Unavailable(e),
        }
    }
}

pub fn parse_grype(json: &str) -> Result<Vec<VulnerabilityFinding>> {
    let report: GrypeReport = serde_json::from_str(json)
        .map_err(|e| ProbeError::measurement("grype", format!("invalid JSON: {}", e)))?;

    Ok(report
        .matches
        .into_iter()
        .map(|m| VulnerabilityFinding {
            package_name: m.artifact.name,
            version: m.artifact.version,
            severity: Severity::from_label(&m.vulnerability.severity),
            description: match m.vulnerability.description {
                Some(text) => format!("{}: {}", m.vulnerability.id, text),
                None => m.vulnerability.id,
            },
            suggested_fix: fix_text(
                m.vulnerability
                    .fix
                    .as_ref()
                    .and_then(|f| f.versions.first())
                    .map(String::as_str),
            ),
        })
        .collect())
}

fn fix_text(fixed_version: Option<&str>) -> String {
    match fixed_version {
        Some(v) if !v.is_empty() => format!("Upgrade to {}", v),
        _ => "No fix available yet".to_string(),
    }
}

// ─── built-in heuristic ───

/// A declared dependency of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub version: String,
}

/// Matches `package.json` dependencies against the configured table and
/// checks the Node.js runtime version. Never unavailable.
pub struct HeuristicSource;

impl VulnerabilitySource for HeuristicSource {
    fn source(&self) -> ScanSource {
        ScanSource::Heuristic
    }

    fn scan(&self, ctx: &ProbeContext<'_>) -> SourceOutcome {
        let mut findings = match read_dependencies(ctx) {
            Ok(deps) => match_dependencies(&deps, &ctx.config.vulnerable_packages),
            Err(e) => {
                debug!("No dependency manifest: {}", e);
                Vec::new()
            }
        };

        match read_node_version(ctx) {
            Ok(version) => findings.extend(check_runtime(&version, &ctx.config.runtime)),
            Err(e) => debug!("No Node.js runtime detected: {}", e),
        }

        SourceOutcome::Found(findings)
    }
}

fn read_dependencies(ctx: &ProbeContext<'_>) -> Result<Vec<Dependency>> {
    let container = ctx.containers.create(ctx.image, "manifest")?;
    let dir = tempfile::tempdir()?;
    let dest = dir.path().join("package.json");
    let source = format!("{}/package.json", ctx.config.probes.app_dir.trim_end_matches('/'));

    let copied = ctx.engine.copy_from(container.id(), &source, &dest);
    container.teardown();
    copied.map_err(|e| ProbeError::measurement("vulnerability", e.message))?;

    let content = std::fs::read_to_string(&dest)?;
    parse_package_json(&content)
}

fn read_node_version(ctx: &ProbeContext<'_>) -> Result<String> {
    ctx.with_container("runtime", |container| {
        ctx.engine
            .exec(container.id(), &["node", "--version"])
            .map(|out| out.trim().to_string())
            .map_err(|e| ProbeError::measurement("vulnerability", e.message))
    })
}

/// `dependencies` and `devDependencies` of a `package.json`, sorted by name.
pub fn parse_package_json(content: &str) -> Result<Vec<Dependency>> {
    let manifest: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| ProbeError::measurement("vulnerability", format!("invalid package.json: {}", e)))?;

    let mut deps = BTreeMap::new();
    for section in ["dependencies", "devDependencies"] {
        if let Some(map) = manifest.get(section).and_then(|v| v.as_object()) {
            for (name, version) in map {
                if let Some(version) = version.as_str() {
                    deps.entry(name.clone()).or_insert_with(|| version.to_string());
                }
            }
        }
    }

    Ok(deps
        .into_iter()
        .map(|(name, version)| Dependency { name, version })
        .collect())
}

/// Findings for every dependency covered by a rule's version range.
pub fn match_dependencies(deps: &[Dependency], rules: &[VulnerableRule]) -> Vec<VulnerabilityFinding> {
    let mut findings = Vec::new();
    for dep in deps {
        for rule in rules.iter().filter(|r| r.name == dep.name) {
            if version_in_range(&dep.version, &rule.versions) {
                findings.push(VulnerabilityFinding {
                    package_name: dep.name.clone(),
                    version: dep.version.clone(),
                    severity: rule.severity,
                    description: rule.description.clone(),
                    suggested_fix: rule.fix.clone(),
                });
            }
        }
    }
    findings
}

/// Flag an end-of-life Node.js runtime given `node --version` output.
pub fn check_runtime(version: &str, settings: &RuntimeSettings) -> Option<VulnerabilityFinding> {
    let parsed = parse_version(version)?;
    let major = *parsed.first()?;
    if major >= settings.min_supported_node_major as u64 {
        return None;
    }

    Some(VulnerabilityFinding {
        package_name: "node".to_string(),
        version: version.trim().trim_start_matches('v').to_string(),
        severity: Severity::High,
        description: format!(
            "Node.js {} is end-of-life and no longer receives security fixes",
            major
        ),
        suggested_fix: format!(
            "Use a Node.js {} or newer base image",
            settings.min_supported_node_major
        ),
    })
}

/// `*`, `<X`, `<=X`, or an exact version.
pub fn version_in_range(installed: &str, range: &str) -> bool {
    let range = range.trim();
    if range == "*" {
        return true;
    }
    let Some(installed) = parse_version(installed) else {
        return false;
    };

    let (op, bound) = if let Some(rest) = range.strip_prefix("<=") {
        ("<=", rest)
    } else if let Some(rest) = range.strip_prefix('<') {
        ("<", rest)
    } else {
        ("=", range)
    };
    let Some(bound) = parse_version(bound) else {
        return false;
    };

    let ordering = compare_versions(&installed, &bound);
    match op {
        "<" => ordering == Ordering::Less,
        "<=" => ordering != Ordering::Greater,
        _ => ordering == Ordering::Equal,
    }
}

/// Numeric components of a version spec, ignoring `^`, `~`, `=`, `v` prefixes
/// and pre-release suffixes. `None` for tags like `latest` or git URLs.
fn parse_version(spec: &str) -> Option<Vec<u64>> {
    let trimmed = spec
        .trim()
        .trim_start_matches(|c: char| matches!(c, '^' | '~' | '=' | 'v' | '>' | ' '));
    let core = trimmed.split(['-', '+', ' ']).next()?;

    let parts: Vec<u64> = core
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .take_while(Option::is_some)
        .flatten()
        .collect();
    (!parts.is_empty()).then_some(parts)
}

fn compare_versions(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
