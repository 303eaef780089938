pub mod runner;

pub use runner::{timed_out, CommandOutput, CommandRunner, ProcessRunner};

use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Deadline for ordinary engine calls unless configured otherwise.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);
/// Deadline for a single image build unless configured otherwise.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(600);

/// A container-engine command exited non-zero or could not be spawned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{command}` failed: {message}")]
pub struct EngineError {
    pub command: String,
    pub message: String,
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// State reported by `inspect` for a single container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub status: String,
    /// `None` when the image defines no health check.
    pub health: Option<String>,
}

impl ContainerState {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// Raw point-in-time resource usage, exactly as the engine prints it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cpu_percent: String,
    pub mem_usage: String,
    pub mem_percent: String,
}

/// One row of `history`, unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub created_by: String,
    pub size: String,
}

/// Typed wrapper over the engine's command-line surface.
pub struct Engine<'a> {
    runner: &'a dyn CommandRunner,
    program: String,
    command_timeout: Duration,
    build_timeout: Duration,
}

impl<'a> Engine<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self::with_program(runner, "docker")
    }

    pub fn with_program(runner: &'a dyn CommandRunner, program: &str) -> Self {
        Self {
            runner,
            program: program.to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            build_timeout: DEFAULT_BUILD_TIMEOUT,
        }
    }

    /// Bound every call by `command`, and builds by `build`.
    pub fn with_timeouts(mut self, command: Duration, build: Duration) -> Self {
        self.command_timeout = command;
        self.build_timeout = build;
        self
    }

    pub fn runner(&self) -> &'a dyn CommandRunner {
        self.runner
    }

    pub fn build(&self, context: &Path, tag: &str, no_cache: bool) -> EngineResult<()> {
        let mut args = vec!["build".to_string(), "-t".to_string(), tag.to_string()];
        if no_cache {
            args.push("--no-cache".to_string());
        }
        args.push(context.display().to_string());
        self.call_within(&args, self.build_timeout).map(|_| ())
    }

    /// Start a detached container and return its id.
    pub fn run_detached(&self, image: &str, name: &str, command: &[&str]) -> EngineResult<String> {
        let mut args = strings(&["run", "-d", "--name", name, image]);
        args.extend(command.iter().map(|s| s.to_string()));
        self.call(&args).map(|out| out.trim().to_string())
    }

    /// Create a container without starting it and return its id.
    pub fn create(&self, image: &str, name: &str) -> EngineResult<String> {
        self.call(&strings(&["create", "--name", name, image]))
            .map(|out| out.trim().to_string())
    }

    pub fn stop(&self, container: &str) -> EngineResult<()> {
        self.call(&strings(&["stop", container])).map(|_| ())
    }

    pub fn remove_container(&self, container: &str) -> EngineResult<()> {
        self.call(&strings(&["rm", "-f", container])).map(|_| ())
    }

    pub fn remove_image(&self, image: &str) -> EngineResult<()> {
        self.call(&strings(&["rmi", "-f", image])).map(|_| ())
    }

    pub fn inspect_state(&self, container: &str) -> EngineResult<ContainerState> {
        let out = self.call(&strings(&[
            "inspect",
            "--format",
            "{{.State.Status}}|{{if .State.Health}}{{.State.Health.Status}}{{end}}",
            container,
        ]))?;
        let line = out.trim();
        let (status, health) = line.split_once('|').unwrap_or((line, ""));

        Ok(ContainerState {
            status: status.trim().to_string(),
            health: Some(health.trim())
                .filter(|h| !h.is_empty())
                .map(str::to_string),
        })
    }

    pub fn stats(&self, container: &str) -> EngineResult<StatsSnapshot> {
        let out = self.call(&strings(&[
            "stats",
            "--no-stream",
            "--format",
            "{{.CPUPerc}}|{{.MemUsage}}|{{.MemPerc}}",
            container,
        ]))?;
        let fields: Vec<&str> = out.trim().split('|').map(str::trim).collect();
        match fields.as_slice() {
            [cpu, mem, perc] => Ok(StatsSnapshot {
                cpu_percent: cpu.to_string(),
                mem_usage: mem.to_string(),
                mem_percent: perc.to_string(),
            }),
            _ => Err(EngineError {
                command: "stats".to_string(),
                message: format!("unexpected output '{}'", out.trim()),
            }),
        }
    }

    /// Run `command` inside a running container and return its stdout.
    pub fn exec(&self, container: &str, command: &[&str]) -> EngineResult<String> {
        let mut args = strings(&["exec", container]);
        args.extend(command.iter().map(|s| s.to_string()));
        self.call(&args)
    }

    pub fn copy_from(&self, container: &str, source: &str, dest: &Path) -> EngineResult<()> {
        let from = format!("{}:{}", container, source);
        self.call(&[
            "cp".to_string(),
            from,
            dest.display().to_string(),
        ])
        .map(|_| ())
    }

    /// Layer history in build order (oldest layer first).
    pub fn history(&self, image: &str) -> EngineResult<Vec<HistoryRow>> {
        let out = self.call(&strings(&[
            "history",
            "--no-trunc",
            "--format",
            "{{.CreatedBy}}\t{{.Size}}",
            image,
        ]))?;

        // the engine lists newest first
        let mut rows: Vec<HistoryRow> = out
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let (created_by, size) = line.rsplit_once('\t')?;
                Some(HistoryRow {
                    created_by: created_by.trim().to_string(),
                    size: size.trim().to_string(),
                })
            })
            .collect();
        rows.reverse();
        Ok(rows)
    }

    /// Size column of `images` for exactly this reference, if it exists.
    pub fn image_size(&self, image: &str) -> EngineResult<Option<String>> {
        let filter = format!("reference={}", image);
        let out = self.call(&[
            "images".to_string(),
            "--filter".to_string(),
            filter,
            "--format".to_string(),
            "{{.Size}}".to_string(),
        ])?;
        Ok(out
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string))
    }

    fn call(&self, args: &[String]) -> EngineResult<String> {
        self.call_within(args, self.command_timeout)
    }

    fn call_within(&self, args: &[String], timeout: Duration) -> EngineResult<String> {
        let command = format!("{} {}", self.program, args.first().map(String::as_str).unwrap_or(""));
        debug!("{} {}", self.program, args.join(" "));

        let output = self
            .runner
            .run(&self.program, args, timeout)
            .map_err(|e| EngineError {
                command: command.clone(),
                message: match e.kind() {
                    std::io::ErrorKind::TimedOut => {
                        format!("timed out after {}ms", timeout.as_millis())
                    }
                    _ => e.to_string(),
                },
            })?;

        if !output.is_success() {
            let stderr = output.stderr.trim();
            return Err(EngineError {
                command,
                message: if stderr.is_empty() {
                    format!("exit code {:?}", output.code)
                } else {
                    stderr.to_string()
                },
            });
        }

        Ok(output.stdout)
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
