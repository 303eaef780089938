use crate::config::Thresholds;
use crate::report::{
    format_millis, NetworkStatus, PerformanceReport, Priority, Rating, Recommendation,
    RecommendationCategory,
};

/// Derive advisories from a completed performance report.
///
/// Ratings must already be computed; unmeasured metrics never trigger a rule.
pub fn recommend(report: &PerformanceReport, thresholds: &Thresholds) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if let Some(avg) = report.build_time.measured() {
        if avg > thresholds.build_time_ms {
            recommendations.push(Recommendation {
                category: RecommendationCategory::Build,
                priority: Priority::High,
                message: format!(
                    "Average build time is {}. Order Dockerfile steps so dependency layers are cached, \
                     use multi-stage builds and a .dockerignore to shrink the build context",
                    format_millis(avg)
                ),
            });
        }
    }

    if let Some(avg) = report.startup_time.measured() {
        if avg > thresholds.startup_time_ms {
            recommendations.push(Recommendation {
                category: RecommendationCategory::Startup,
                priority: Priority::High,
                message: format!(
                    "Average startup time is {}. Defer work done at boot and consider a smaller base image",
                    format_millis(avg)
                ),
            });
        }
    }

    if let Some(pct) = report.memory.percentage {
        if pct > thresholds.memory_percent {
            recommendations.push(Recommendation {
                category: RecommendationCategory::Memory,
                priority: Priority::High,
                message: format!(
                    "Memory usage is {:.1}% of the container limit. Raise the limit or look for leaks",
                    pct
                ),
            });
        }
    }

    if let Some(avg) = report.cpu.metric.measured() {
        if avg > thresholds.cpu_percent {
            recommendations.push(Recommendation {
                category: RecommendationCategory::Cpu,
                priority: Priority::Medium,
                message: format!(
                    "Average CPU usage is {:.1}% while idle. Profile background work and busy loops",
                    avg
                ),
            });
        }
    }

    if report.network.status == NetworkStatus::Success {
        if let Some(avg) = report.network.average_ms {
            if avg > thresholds.latency_ms {
                recommendations.push(Recommendation {
                    category: RecommendationCategory::Network,
                    priority: Priority::Low,
                    message: format!(
                        "Average network latency is {:.0}ms. Check DNS settings and the container network mode",
                        avg
                    ),
                });
            }
        }
    }

    if report.disk.overall == Rating::Poor {
        recommendations.push(Recommendation {
            category: RecommendationCategory::Disk,
            priority: Priority::Medium,
            message: format!(
                "Disk throughput is poor ({:.1} MB/s). Use volumes for write-heavy paths instead of the container layer",
                report.disk.average_mb_per_sec.unwrap_or(0.0)
            ),
        });
    }

    recommendations
}
