use colored::*;
use dockprobe_core::report::{
    format_millis, NetworkStatus, PerformanceReport, Priority, Rating, ScanReport, Severity,
    Throughput, VulnerabilityFinding,
};
use dockprobe_core::units::{format_binary_size, format_decimal_size};
use dockprobe_core::AggregatedMetric;

/// Print a performance report to the terminal.
pub fn print_performance_report(report: &PerformanceReport) {
    println!();
    println!(
        "{}",
        format!(
            " dockprobe v{} - Benchmarking {}",
            env!("CARGO_PKG_VERSION"),
            report.image
        )
        .bold()
    );
    println!();

    println!(" {}", "Image".bold().underline());
    println!(
        " {} Size: {}",
        "|-".dimmed(),
        report
            .image_profile
            .size_bytes
            .map(format_decimal_size)
            .unwrap_or_else(|| "unknown".to_string())
    );
    println!(" {} Layers: {}", "|-".dimmed(), report.image_profile.layers.len());
    for layer in &report.image_profile.largest_layers {
        println!(
            "   {} {:>10}  {}",
            "|".dimmed(),
            format_decimal_size(layer.size_bytes).cyan(),
            truncate(&layer.command, 60).dimmed()
        );
    }
    println!();

    println!(" {}", "Timing".bold().underline());
    println!(" {} Build:    {}", "|-".dimmed(), metric_millis(&report.build_time));
    println!(" {} Startup:  {}", "|-".dimmed(), metric_millis(&report.startup_time));
    println!();

    println!(" {}", "Resources".bold().underline());
    let memory = &report.memory;
    let usage = match (memory.current_bytes, memory.total_bytes, memory.percentage) {
        (Some(current), Some(total), Some(pct)) => format!(
            "{} / {} ({:.2}%)",
            format_binary_size(current),
            format_binary_size(total),
            pct
        ),
        _ => "not measured".to_string(),
    };
    println!(
        " {} Memory:   {} {}",
        "|-".dimmed(),
        usage,
        rating_tag(memory.efficiency)
    );
    let cpu = match report.cpu.metric.measured() {
        Some(avg) => format!(
            "{:.2}% avg ({:.2}% - {:.2}%, {} samples)",
            avg, report.cpu.metric.min, report.cpu.metric.max, report.cpu.metric.sample_count
        ),
        None => "not measured".to_string(),
    };
    println!(
        " {} CPU:      {} {}",
        "|-".dimmed(),
        cpu,
        rating_tag(report.cpu.efficiency)
    );
    println!(
        " {} Disk:     write {}, read {} {}",
        "|-".dimmed(),
        throughput(report.disk.write.as_ref()),
        throughput(report.disk.read.as_ref()),
        rating_tag(report.disk.overall)
    );
    println!();

    println!(" {}", "Network".bold().underline());
    match report.network.status {
        NetworkStatus::Success => {
            for target in &report.network.targets {
                println!(
                    " {} {:<16} {:.1}ms",
                    "|-".dimmed(),
                    target.target,
                    target.average_ms
                );
            }
            if let Some(avg) = report.network.average_ms {
                println!(" {} Average: {}", "|-".dimmed(), format!("{:.1}ms", avg).bold());
            }
        }
        NetworkStatus::Failed => {
            println!(" {} {}", "|-".dimmed(), "No target reachable".red());
        }
    }
    println!();

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    if report.recommendations.is_empty() {
        println!(
            " {} All metrics are within thresholds.",
            "OK".green().bold()
        );
    } else {
        println!(" {}", "Recommendations".bold().underline());
        for rec in &report.recommendations {
            let tag = match rec.priority {
                Priority::High => format!(" {} ", rec.priority.label().to_uppercase())
                    .on_red()
                    .white()
                    .bold()
                    .to_string(),
                Priority::Medium => format!(" {} ", rec.priority.label().to_uppercase())
                    .on_yellow()
                    .black()
                    .bold()
                    .to_string(),
                Priority::Low => format!(" {} ", rec.priority.label().to_uppercase())
                    .dimmed()
                    .to_string(),
            };
            println!(" {} {}", tag, rec.category.label().bold());
            println!("   {} {}", "|".dimmed(), rec.message);
        }
    }
    println!();
}

/// Print a security scan report to the terminal.
pub fn print_scan_report(report: &ScanReport) {
    println!();
    println!(
        "{}",
        format!(
            " dockprobe v{} - Security scan of {}",
            env!("CARGO_PKG_VERSION"),
            report.image
        )
        .bold()
    );
    println!();

    let vulns = &report.vulnerabilities;
    println!(
        " {} {}",
        "Vulnerabilities".bold().underline(),
        format!("(via {})", vulns.source.label()).dimmed()
    );
    println!(
        " {} Total: {} ({} critical, {} high, {} medium, {} low, {} info)",
        "|-".dimmed(),
        vulns.total,
        count_colored(vulns.critical.len(), Severity::Critical),
        count_colored(vulns.high.len(), Severity::High),
        vulns.medium.len(),
        vulns.low.len(),
        vulns.info.len(),
    );
    println!();
    for severity in [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ] {
        for finding in vulns.bucket(severity) {
            print_vulnerability(finding);
        }
    }

    println!(" {}", "Secrets".bold().underline());
    if report.secrets.is_empty() {
        println!(" {} {}", "|-".dimmed(), "No hardcoded secrets found".green());
    } else {
        println!(
            " {} {} potential secrets in {} file/category pairs",
            "|-".dimmed(),
            report.secret_occurrences().to_string().yellow().bold(),
            report.secrets.len()
        );
        for secret in &report.secrets {
            println!(
                "   {} {} {} x{}",
                "|".dimmed(),
                secret.file,
                secret.category.label().yellow(),
                secret.occurrences
            );
        }
    }
    println!();

    let perms = &report.permissions;
    println!(" {}", "Permissions".bold().underline());
    if perms.checked {
        println!(
            " {} User: {}{}",
            "|-".dimmed(),
            perms.user.cyan(),
            if perms.running_as_root {
                " (root)".red().bold().to_string()
            } else {
                String::new()
            }
        );
    }
    for (i, issue) in perms.issues.iter().enumerate() {
        println!(" {} {}", "!!".yellow().bold(), issue);
        if let Some(suggestion) = perms.suggestions.get(i) {
            println!("   {} {}", "|".dimmed(), suggestion.dimmed());
        }
    }
    if perms.checked && perms.issues.is_empty() {
        println!(" {} {}", "OK".green().bold(), "No permission issues");
    }
    println!();
}

fn print_vulnerability(finding: &VulnerabilityFinding) {
    let tag = match finding.severity {
        Severity::Critical => format!(" {} ", finding.severity.symbol())
            .on_red()
            .white()
            .bold()
            .to_string(),
        Severity::High => format!(" {} ", finding.severity.symbol())
            .on_yellow()
            .black()
            .bold()
            .to_string(),
        Severity::Medium => format!(" {} ", finding.severity.symbol())
            .on_blue()
            .white()
            .bold()
            .to_string(),
        Severity::Low | Severity::Info => format!(" {} ", finding.severity.symbol())
            .dimmed()
            .to_string(),
    };

    println!(
        " {} {}@{}",
        tag,
        finding.package_name.bold(),
        finding.version
    );
    println!("   {} {}", "|".dimmed(), finding.description);
    println!("   {} Fix: {}", "|".dimmed(), finding.suggested_fix.cyan());
    println!();
}

fn metric_millis(metric: &AggregatedMetric) -> String {
    match metric.measured() {
        Some(avg) => format!(
            "{} avg ({} - {}, {}/{} runs)",
            format_millis(avg).bold(),
            format_millis(metric.min),
            format_millis(metric.max),
            metric.sample_count,
            metric.attempts
        ),
        None => format!("{} ({} attempts failed)", "not measured".red(), metric.attempts),
    }
}

fn throughput(t: Option<&Throughput>) -> String {
    match t {
        Some(t) => format!("{:.1} MB/s", t.mb_per_sec),
        None => "failed".red().to_string(),
    }
}

fn rating_tag(rating: Rating) -> String {
    let label = format!("[{}]", rating.label());
    match rating {
        Rating::Excellent => label.green().bold().to_string(),
        Rating::Good => label.green().to_string(),
        Rating::Fair => label.yellow().to_string(),
        Rating::Poor => label.red().bold().to_string(),
        Rating::Unknown => label.dimmed().to_string(),
    }
}

fn count_colored(count: usize, severity: Severity) -> String {
    if count == 0 {
        return "0".to_string();
    }
    match severity {
        Severity::Critical => count.to_string().red().bold().to_string(),
        _ => count.to_string().yellow().bold().to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max - 3).collect::<String>())
    }
}
