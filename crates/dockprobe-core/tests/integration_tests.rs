use dockprobe_core::probes::vulnerability::{SourceOutcome, VulnerabilitySource};
use dockprobe_core::probes::ProbeContext;
use dockprobe_core::report::{
    NetworkStatus, Priority, RecommendationCategory, ScanSource, SecretCategory, Severity,
};
use dockprobe_core::{
    Clock, CommandOutput, CommandRunner, ManualClock, Pipeline, ProbeConfig, ProbeError, Rating,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

const IPUTILS_SUMMARY: &str = "--- 8.8.8.8 ping statistics ---\n\
    3 packets transmitted, 3 received, 0% packet loss, time 2003ms\n\
    rtt min/avg/max/mdev = 11.000/12.000/13.000/0.800 ms\n";

/// Scripted container engine + host tools. Advances the shared clock for
/// builds and disk operations so timings are deterministic.
struct FakeDocker<'c> {
    clock: &'c ManualClock,
    build_ms: RefCell<VecDeque<u64>>,
    fail_acquisition_build: bool,
    fail_run: bool,
    trivy_json: Option<&'static str>,
    next_id: Cell<u32>,
    started: RefCell<Vec<String>>,
    created: RefCell<Vec<String>>,
    stops: RefCell<Vec<String>>,
    removes: RefCell<Vec<String>>,
    removed_images: RefCell<Vec<String>>,
    builds: RefCell<Vec<Vec<String>>>,
    refused: RefCell<Vec<String>>,
    deadlines: RefCell<Vec<(String, Duration)>>,
}

impl<'c> FakeDocker<'c> {
    fn new(clock: &'c ManualClock) -> Self {
        Self {
            clock,
            build_ms: RefCell::new(VecDeque::new()),
            fail_acquisition_build: false,
            fail_run: false,
            trivy_json: None,
            next_id: Cell::new(0),
            started: RefCell::new(Vec::new()),
            created: RefCell::new(Vec::new()),
            stops: RefCell::new(Vec::new()),
            removes: RefCell::new(Vec::new()),
            removed_images: RefCell::new(Vec::new()),
            builds: RefCell::new(Vec::new()),
            refused: RefCell::new(Vec::new()),
            deadlines: RefCell::new(Vec::new()),
        }
    }

    fn with_build_times(self, times: &[u64]) -> Self {
        *self.build_ms.borrow_mut() = times.iter().copied().collect();
        self
    }

    fn new_id(&self) -> String {
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        format!("cid{n}")
    }

    fn docker(&self, args: &[String]) -> CommandOutput {
        let a: Vec<&str> = args.iter().map(String::as_str).collect();
        match a.as_slice() {
            ["build", "-t", _, rest @ ..] => {
                self.builds.borrow_mut().push(args.to_vec());
                let no_cache = rest.contains(&"--no-cache");
                if !no_cache && self.fail_acquisition_build {
                    return CommandOutput::failure(1, "failed to solve: Dockerfile not found");
                }
                if no_cache {
                    let ms = self.build_ms.borrow_mut().pop_front().unwrap_or(1_000);
                    self.clock.advance(Duration::from_millis(ms));
                }
                CommandOutput::success("")
            }
            ["rmi", "-f", tag] => {
                self.removed_images.borrow_mut().push(tag.to_string());
                CommandOutput::success("")
            }
            ["run", "-d", "--name", name, ..] => {
                if self.fail_run {
                    self.refused.borrow_mut().push(name.to_string());
                    return CommandOutput::failure(125, "docker: Error response from daemon");
                }
                let id = self.new_id();
                self.started.borrow_mut().push(id.clone());
                CommandOutput::success(format!("{id}\n"))
            }
            ["create", ..] => {
                let id = self.new_id();
                self.created.borrow_mut().push(id.clone());
                CommandOutput::success(format!("{id}\n"))
            }
            ["inspect", ..] => CommandOutput::success("running|\n"),
            ["stats", ..] => CommandOutput::success("2.50%|128MiB / 2GiB|6.00%\n"),
            ["stop", id] => {
                self.stops.borrow_mut().push(id.to_string());
                CommandOutput::success("")
            }
            ["rm", "-f", id] => {
                self.removes.borrow_mut().push(id.to_string());
                CommandOutput::success("")
            }
            ["history", ..] => CommandOutput::success(
                "CMD [\"node\" \"server.js\"]\t0B\n\
                 /bin/sh -c npm ci\t52.4MB\n\
                 /bin/sh -c #(nop) ADD file:1 in /\t74.8MB\n",
            ),
            ["images", ..] => CommandOutput::success("245MB\n"),
            ["cp", source, dest] => self.copy(source, Path::new(dest)),
            ["exec", _, cmd @ ..] => self.exec(cmd),
            _ => CommandOutput::failure(1, format!("unexpected docker call: {a:?}")),
        }
    }

    fn exec(&self, cmd: &[&str]) -> CommandOutput {
        match cmd {
            ["ping", "-c", _, "8.8.8.8"] => CommandOutput::success(IPUTILS_SUMMARY),
            ["ping", ..] => CommandOutput::failure(1, "ping: bad address"),
            ["sh", "-c", script] if script.starts_with("dd if=/dev/zero") => {
                self.clock.advance(Duration::from_millis(1_000));
                CommandOutput::success("")
            }
            ["sh", "-c", script] if script.starts_with("dd if=") => {
                self.clock.advance(Duration::from_millis(250));
                CommandOutput::success("")
            }
            ["sh", "-c", script] if script.starts_with("touch") => CommandOutput::success(""),
            ["sh", "-c", "command -v sudo"] => CommandOutput::failure(1, ""),
            ["rm", "-f", _] => CommandOutput::success(""),
            ["whoami"] => CommandOutput::success("root\n"),
            ["id", "-u"] => CommandOutput::success("0\n"),
            ["node", "--version"] => CommandOutput::success("v16.20.2\n"),
            _ => CommandOutput::failure(127, "not found"),
        }
    }

    fn copy(&self, source: &str, dest: &Path) -> CommandOutput {
        if source.ends_with("/package.json") {
            std::fs::write(dest, r#"{"dependencies": {"request": "2.88.0", "express": "4.18.2"}}"#)
                .unwrap();
        } else {
            std::fs::create_dir_all(dest.join("config")).unwrap();
            std::fs::write(dest.join(".env"), "DB_PASSWORD=supersecret\n").unwrap();
            std::fs::write(dest.join("config/app.json"), "{\"name\": \"app\"}").unwrap();
        }
        CommandOutput::success("")
    }

    fn count(list: &RefCell<Vec<String>>, id: &str) -> usize {
        list.borrow().iter().filter(|x| x.as_str() == id).count()
    }

    /// Every started container stopped once and removed once; every created
    /// one removed once.
    fn assert_containers_cleaned(&self) {
        for id in self.started.borrow().iter() {
            assert_eq!(Self::count(&self.stops, id), 1, "stop count for {id}");
            assert_eq!(Self::count(&self.removes, id), 1, "rm count for {id}");
        }
        for id in self.created.borrow().iter() {
            assert_eq!(Self::count(&self.removes, id), 1, "rm count for {id}");
        }
    }
}

impl CommandRunner for FakeDocker<'_> {
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> std::io::Result<CommandOutput> {
        let verb = if program == "docker" { args[0].as_str() } else { program };
        self.deadlines.borrow_mut().push((verb.to_string(), timeout));
        match program {
            "docker" => Ok(self.docker(args)),
            "trivy" => match self.trivy_json {
                Some(json) => Ok(CommandOutput::success(json)),
                None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, "trivy")),
            },
            other => Err(std::io::Error::new(std::io::ErrorKind::NotFound, other.to_string())),
        }
    }
}

fn config() -> ProbeConfig {
    ProbeConfig::builtin()
}

// ─── full run ───

#[test]
fn test_full_run_with_supplied_image() {
    let clock = ManualClock::new();
    let docker = FakeDocker::new(&clock).with_build_times(&[12_000, 14_500, 13_200]);
    let config = config();
    let pipeline = Pipeline::new(&docker, &clock, &config);

    let report = pipeline.run(Some("shop-api:1.4")).unwrap();
    let perf = &report.performance;

    assert_eq!(perf.image, "shop-api:1.4");
    assert_eq!(perf.image_profile.size_bytes, Some(245_000_000));
    assert_eq!(perf.image_profile.layers.len(), 3);
    assert_eq!(perf.image_profile.largest_layers[0].size_bytes, 74_800_000);

    assert_eq!(perf.build_time.sample_count, 3);
    assert_eq!(perf.build_time.average.round(), 13_233.0);
    assert_eq!(perf.build_time.min, 12_000.0);
    assert_eq!(perf.build_time.max, 14_500.0);

    assert_eq!(perf.startup_time.sample_count, 5);
    assert_eq!(perf.memory.percentage, Some(6.0));
    assert_eq!(perf.memory.efficiency, Rating::Excellent);
    assert_eq!(perf.cpu.metric.sample_count, 10);
    assert_eq!(perf.cpu.metric.average, 2.5);
    assert_eq!(perf.cpu.efficiency, Rating::Excellent);

    assert_eq!(perf.network.status, NetworkStatus::Success);
    assert_eq!(perf.network.targets.len(), 1);
    assert_eq!(perf.network.average_ms, Some(12.0));

    assert_eq!(perf.disk.write.as_ref().unwrap().mb_per_sec, 100.0);
    assert_eq!(perf.disk.read.as_ref().unwrap().mb_per_sec, 200.0);
    assert_eq!(perf.disk.overall, Rating::Excellent);
    assert!(perf.recommendations.is_empty());

    let sec = &report.security;
    assert_eq!(sec.vulnerabilities.source, ScanSource::Heuristic);
    assert_eq!(sec.vulnerabilities.total, 2);
    assert_eq!(sec.vulnerabilities.bucket(Severity::High).len(), 2);
    assert_eq!(sec.secrets.len(), 1);
    assert_eq!(sec.secrets[0].file, ".env");
    assert_eq!(sec.secrets[0].category, SecretCategory::Password);
    assert!(sec.permissions.checked);
    assert!(sec.permissions.running_as_root);
    assert!(!sec.permissions.sudo_present);

    // only the throwaway build-time tags are removed, never the caller's image
    assert!(!docker.removed_images.borrow().iter().any(|t| t == "shop-api:1.4"));
    assert_eq!(docker.removed_images.borrow().len(), 3);
    docker.assert_containers_cleaned();
}

#[test]
fn test_owned_image_released_exactly_once() {
    let clock = ManualClock::new();
    let docker = FakeDocker::new(&clock);
    let config = config();
    let pipeline = Pipeline::new(&docker, &clock, &config);

    let report = pipeline.scan(None).unwrap();
    let tag = report.image.clone();
    assert!(tag.starts_with("dockprobe-bench:"));

    let removed = docker.removed_images.borrow();
    assert_eq!(removed.iter().filter(|t| **t == tag).count(), 1);
    assert_eq!(removed.last(), Some(&tag));
    docker.assert_containers_cleaned();
}

#[test]
fn test_acquisition_failure_is_fatal_and_touches_nothing() {
    let clock = ManualClock::new();
    let mut docker = FakeDocker::new(&clock);
    docker.fail_acquisition_build = true;
    let config = config();
    let pipeline = Pipeline::new(&docker, &clock, &config);

    let err = pipeline.run(None).unwrap_err();
    assert!(matches!(err, ProbeError::Acquisition { .. }));
    assert!(err.to_string().contains("Dockerfile not found"));
    assert!(docker.removed_images.borrow().is_empty());
    assert!(docker.started.borrow().is_empty());
}

#[test]
fn test_degraded_engine_still_produces_report() {
    let clock = ManualClock::new();
    let mut docker = FakeDocker::new(&clock);
    docker.fail_run = true;
    let config = config();
    let pipeline = Pipeline::new(&docker, &clock, &config);

    let report = pipeline.run(None).unwrap();
    let perf = &report.performance;
    assert!(!perf.startup_time.available);
    assert_eq!(perf.startup_time.attempts, 5);
    assert_eq!(perf.memory.percentage, None);
    assert_eq!(perf.memory.efficiency, Rating::Unknown);
    assert!(!perf.cpu.metric.available);
    assert_eq!(perf.network.status, NetworkStatus::Failed);
    assert!(perf.network.targets.is_empty());
    assert_eq!(perf.disk.overall, Rating::Unknown);
    assert!(!report.security.permissions.checked);
    assert_eq!(report.security.permissions.user, "Unknown");

    // the system-built image is still removed once
    let tag = &perf.image;
    assert_eq!(
        docker.removed_images.borrow().iter().filter(|t| *t == tag).count(),
        1
    );
}

#[test]
fn test_slow_build_yields_single_build_recommendation() {
    let clock = ManualClock::new();
    let docker = FakeDocker::new(&clock).with_build_times(&[65_000, 65_000, 65_000]);
    let config = config();
    let pipeline = Pipeline::new(&docker, &clock, &config);

    let report = pipeline.benchmark(Some("app:slow")).unwrap();
    assert_eq!(report.recommendations.len(), 1);
    assert_eq!(report.recommendations[0].category, RecommendationCategory::Build);
    assert_eq!(report.recommendations[0].priority, Priority::High);
}

// ─── vulnerability chain ───

#[test]
fn test_trivy_preferred_when_installed() {
    let clock = ManualClock::new();
    let mut docker = FakeDocker::new(&clock);
    docker.trivy_json = Some(
        r#"{"Results":[{"Vulnerabilities":[{"VulnerabilityID":"CVE-2022-0001","PkgName":"openssl",
            "InstalledVersion":"3.0.1","FixedVersion":"3.0.7","Severity":"CRITICAL"}]}]}"#,
    );
    let config = config();
    let pipeline = Pipeline::new(&docker, &clock, &config);

    let report = pipeline.scan(Some("app:1")).unwrap();
    assert_eq!(report.vulnerabilities.source, ScanSource::Trivy);
    assert_eq!(report.vulnerabilities.critical.len(), 1);
    assert_eq!(report.vulnerabilities.critical[0].package_name, "openssl");
}

struct AlwaysUnavailable;

impl VulnerabilitySource for AlwaysUnavailable {
    fn source(&self) -> ScanSource {
        ScanSource::Grype
    }

    fn scan(&self, _ctx: &ProbeContext<'_>) -> SourceOutcome {
        SourceOutcome::Unavailable(ProbeError::ToolUnavailable {
            tool: "grype".into(),
            reason: "not installed".into(),
        })
    }
}

#[test]
fn test_exhausted_chain_yields_empty_report() {
    let clock = ManualClock::new();
    let docker = FakeDocker::new(&clock);
    let config = config();
    let pipeline = Pipeline::new(&docker, &clock, &config)
        .with_vulnerability_sources(vec![Box::new(AlwaysUnavailable)]);

    let report = pipeline.scan(Some("app:1")).unwrap();
    assert_eq!(report.vulnerabilities.total, 0);
    assert_eq!(report.vulnerabilities.source, ScanSource::Heuristic);
}

// ─── timing ───

#[test]
fn test_warmup_and_sampling_use_the_injected_clock() {
    let clock = ManualClock::new();
    let docker = FakeDocker::new(&clock);
    let config = config();
    let pipeline = Pipeline::new(&docker, &clock, &config);

    pipeline.benchmark(Some("app:1")).unwrap();
    // memory warm-up + cpu warm-up + 9 gaps between 10 cpu samples
    assert!(clock.now() >= Duration::from_millis(5_000 + 5_000 + 9_000));
}

#[test]
fn test_configured_deadlines_bound_every_call() {
    let clock = ManualClock::new();
    let docker = FakeDocker::new(&clock);
    let mut config = config();
    config.pipeline.build_timeout_ms = 900_000;
    config.probes.command_timeout_ms = 20_000;
    config.probes.scan_timeout_ms = 300_000;
    let pipeline = Pipeline::new(&docker, &clock, &config);

    pipeline.run(None).unwrap();

    let deadlines = docker.deadlines.borrow();
    assert!(!deadlines.is_empty());
    for (verb, timeout) in deadlines.iter() {
        let expected = match verb.as_str() {
            "build" => Duration::from_secs(900),
            "trivy" | "grype" => Duration::from_secs(300),
            _ => Duration::from_secs(20),
        };
        assert_eq!(*timeout, expected, "deadline for {verb}");
    }
}

#[test]
fn test_failed_launches_leave_no_named_containers() {
    let clock = ManualClock::new();
    let mut docker = FakeDocker::new(&clock);
    docker.fail_run = true;
    let config = config();
    let pipeline = Pipeline::new(&docker, &clock, &config);

    pipeline.benchmark(Some("app:broken")).unwrap();

    // every refused `run -d --name X` is followed by one `rm -f X`
    let refused = docker.refused.borrow();
    assert!(!refused.is_empty());
    for name in refused.iter() {
        assert_eq!(FakeDocker::count(&docker.removes, name), 1, "rm count for {name}");
    }
}

#[test]
fn test_report_serializes_to_json() {
    let clock = ManualClock::new();
    let docker = FakeDocker::new(&clock);
    let config = config();
    let report = Pipeline::new(&docker, &clock, &config)
        .run(Some("app:1"))
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["performance"]["image"], "app:1");
    assert_eq!(json["performance"]["network"]["status"], "Success");
    assert_eq!(json["security"]["vulnerabilities"]["source"], "heuristic");
    assert_eq!(json["security"]["secrets"][0]["category"], "password");
}
