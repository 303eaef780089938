use super::CleanupOutcome;
use crate::clock::Clock;
use crate::engine::Engine;
use crate::error::{ProbeError, Result};
use crate::retry::{Poll, PollFailure, RetryPolicy};
use std::cell::Cell;
use std::time::Duration;
use tracing::{debug, warn};

/// Lifecycle phase of an ephemeral container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerPhase {
    Created,
    Running,
    Ready,
    Failed,
    Removed,
}

/// Starts ephemeral containers and waits for them to become ready.
pub struct ContainerManager<'e> {
    engine: &'e Engine<'e>,
    clock: &'e dyn Clock,
    poll_interval: Duration,
    name_prefix: String,
    launched: Cell<u32>,
}

impl<'e> ContainerManager<'e> {
    pub fn new(engine: &'e Engine<'e>, clock: &'e dyn Clock, poll_interval: Duration) -> Self {
        Self {
            engine,
            clock,
            poll_interval,
            name_prefix: format!("dockprobe-{}", std::process::id()),
            launched: Cell::new(0),
        }
    }

    /// Run `image` detached. The returned guard stops and removes it.
    pub fn start_detached(&self, image: &str, name_hint: &str) -> Result<ContainerGuard<'e>> {
        self.start_with(image, name_hint, &[])
    }

    /// Run `image` detached with an overriding command.
    pub fn start_with(
        &self,
        image: &str,
        name_hint: &str,
        command: &[&str],
    ) -> Result<ContainerGuard<'e>> {
        let name = self.next_name(name_hint);
        let id = match self.engine.run_detached(image, &name, command) {
            Ok(id) => id,
            Err(e) => {
                self.discard_partial(&name);
                return Err(ProbeError::Launch {
                    image: image.to_string(),
                    reason: e.message,
                });
            }
        };
        debug!("Started container {} ({})", name, short_id(&id));
        Ok(ContainerGuard::new(self.engine, image, id, name, ContainerPhase::Running))
    }

    /// Create `image` without starting it.
    pub fn create(&self, image: &str, name_hint: &str) -> Result<ContainerGuard<'e>> {
        let name = self.next_name(name_hint);
        let id = match self.engine.create(image, &name) {
            Ok(id) => id,
            Err(e) => {
                self.discard_partial(&name);
                return Err(ProbeError::Launch {
                    image: image.to_string(),
                    reason: e.message,
                });
            }
        };
        Ok(ContainerGuard::new(self.engine, image, id, name, ContainerPhase::Created))
    }

    /// Poll until the container runs (and is healthy, when it has a health check).
    ///
    /// A failing inspect or an exited container aborts at once with `Launch`;
    /// otherwise gives up with `ReadinessTimeout` after `timeout`.
    pub fn await_ready(&self, container: &mut ContainerGuard<'_>, timeout: Duration) -> Result<()> {
        let policy = RetryPolicy::new(self.poll_interval, timeout);
        let engine = self.engine;
        let id = container.id.clone();
        let image = container.image.clone();
        let name = container.name.clone();

        let outcome = policy.run(self.clock, || match engine.inspect_state(&id) {
            Err(e) => Poll::Abort(ProbeError::Launch {
                image: image.clone(),
                reason: format!("container {} could not be inspected: {}", name, e.message),
            }),
            Ok(state) if state.is_running() => match state.health.as_deref() {
                None | Some("healthy") => Poll::Ready(()),
                Some(_) => Poll::Pending,
            },
            Ok(state) if matches!(state.status.as_str(), "exited" | "dead") => {
                Poll::Abort(ProbeError::Launch {
                    image: image.clone(),
                    reason: format!("container {} {} before becoming ready", name, state.status),
                })
            }
            Ok(_) => Poll::Pending,
        });

        match outcome {
            Ok(()) => {
                container.phase = ContainerPhase::Ready;
                Ok(())
            }
            Err(PollFailure::Aborted(err)) => {
                container.phase = ContainerPhase::Failed;
                Err(err)
            }
            Err(PollFailure::TimedOut { .. }) => {
                container.phase = ContainerPhase::Failed;
                Err(ProbeError::ReadinessTimeout {
                    container: container.name.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// `run`/`create` can fail after the engine already registered the name
    /// (for instance a bad entrypoint), so remove it best-effort.
    fn discard_partial(&self, name: &str) {
        match self.engine.remove_container(name) {
            Ok(()) => debug!("Removed container {} left by a failed launch", name),
            Err(e) => debug!("Nothing to remove for {}: {}", name, e),
        }
    }

    fn next_name(&self, hint: &str) -> String {
        let n = self.launched.get() + 1;
        self.launched.set(n);
        format!("{}-{}-{}", self.name_prefix, hint, n)
    }
}

/// Exclusive handle to one ephemeral container.
///
/// Call [`ContainerGuard::teardown`] to clean up and observe the outcome; if
/// the guard is dropped first (early return, panic) the same cleanup runs.
pub struct ContainerGuard<'e> {
    engine: &'e Engine<'e>,
    image: String,
    id: String,
    name: String,
    phase: ContainerPhase,
    started: bool,
}

impl std::fmt::Debug for ContainerGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerGuard")
            .field("image", &self.image)
            .field("id", &self.id)
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl<'e> ContainerGuard<'e> {
    fn new(
        engine: &'e Engine<'e>,
        image: &str,
        id: String,
        name: String,
        phase: ContainerPhase,
    ) -> Self {
        Self {
            engine,
            image: image.to_string(),
            id,
            name,
            started: phase != ContainerPhase::Created,
            phase,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> ContainerPhase {
        self.phase
    }

    /// Stop (if it was started) then remove. A failed stop still attempts removal.
    pub fn teardown(mut self) -> CleanupOutcome {
        self.cleanup()
    }

    fn cleanup(&mut self) -> CleanupOutcome {
        if self.phase == ContainerPhase::Removed {
            return CleanupOutcome::Skipped;
        }

        let mut errors = Vec::new();
        if self.started {
            if let Err(e) = self.engine.stop(&self.id) {
                errors.push(e.to_string());
            }
        }
        if let Err(e) = self.engine.remove_container(&self.id) {
            errors.push(e.to_string());
        }
        self.phase = ContainerPhase::Removed;

        if errors.is_empty() {
            CleanupOutcome::Done
        } else {
            let reason = errors.join("; ");
            warn!("Cleanup of container {} incomplete: {}", self.name, reason);
            CleanupOutcome::Failed(reason)
        }
    }
}

impl Drop for ContainerGuard<'_> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn short_id(id: &str) -> &str {
    &id[..id.len().min(12)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::{CommandOutput, CommandRunner};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replies to `inspect` from a queue; everything else from fixed rules.
    struct FakeEngine {
        inspect: RefCell<VecDeque<CommandOutput>>,
        fail_stop: bool,
        fail_launch: bool,
        calls: RefCell<Vec<String>>,
        removed: RefCell<Vec<String>>,
    }

    impl FakeEngine {
        fn new(inspect: Vec<CommandOutput>) -> Self {
            Self {
                inspect: RefCell::new(inspect.into()),
                fail_stop: false,
                fail_launch: false,
                calls: RefCell::new(Vec::new()),
                removed: RefCell::new(Vec::new()),
            }
        }

        fn count(&self, verb: &str) -> usize {
            self.calls.borrow().iter().filter(|c| c.as_str() == verb).count()
        }
    }

    impl CommandRunner for FakeEngine {
        fn run(
            &self,
            _program: &str,
            args: &[String],
            _timeout: Duration,
        ) -> std::io::Result<CommandOutput> {
            self.calls.borrow_mut().push(args[0].clone());
            Ok(match args[0].as_str() {
                "run" | "create" if self.fail_launch => CommandOutput::failure(
                    127,
                    "OCI runtime create failed: exec: \"/entrypoint.sh\": no such file",
                ),
                "run" | "create" => CommandOutput::success("0123456789abcdef\n"),
                "rm" => {
                    self.removed.borrow_mut().push(args[args.len() - 1].clone());
                    CommandOutput::success("")
                }
                "inspect" => self
                    .inspect
                    .borrow_mut()
                    .pop_front()
                    .unwrap_or_else(|| CommandOutput::success("created|\n")),
                "stop" if self.fail_stop => CommandOutput::failure(1, "cannot stop"),
                _ => CommandOutput::success(""),
            })
        }
    }

    fn timeout() -> Duration {
        Duration::from_millis(3_000)
    }

    #[test]
    fn test_running_without_health_check_is_ready_on_first_poll() {
        let runner = FakeEngine::new(vec![CommandOutput::success("running|\n")]);
        let engine = Engine::new(&runner);
        let clock = ManualClock::new();
        let manager = ContainerManager::new(&engine, &clock, Duration::from_millis(500));

        let mut container = manager.start_detached("app", "startup").unwrap();
        manager.await_ready(&mut container, timeout()).unwrap();

        assert_eq!(container.phase(), ContainerPhase::Ready);
        assert_eq!(runner.count("inspect"), 1);
        assert_eq!(clock.now(), Duration::ZERO);
        assert_eq!(container.teardown(), CleanupOutcome::Done);
    }

    #[test]
    fn test_waits_for_healthy() {
        let runner = FakeEngine::new(vec![
            CommandOutput::success("running|starting\n"),
            CommandOutput::success("running|starting\n"),
            CommandOutput::success("running|healthy\n"),
        ]);
        let engine = Engine::new(&runner);
        let clock = ManualClock::new();
        let manager = ContainerManager::new(&engine, &clock, Duration::from_millis(500));

        let mut container = manager.start_detached("app", "startup").unwrap();
        manager.await_ready(&mut container, timeout()).unwrap();
        assert_eq!(runner.count("inspect"), 3);
        assert_eq!(clock.now(), Duration::from_millis(1_000));
    }

    #[test]
    fn test_times_out_when_never_running() {
        let runner = FakeEngine::new(vec![]);
        let engine = Engine::new(&runner);
        let clock = ManualClock::new();
        let manager = ContainerManager::new(&engine, &clock, Duration::from_millis(500));

        let mut container = manager.start_detached("app", "startup").unwrap();
        let err = manager.await_ready(&mut container, timeout()).unwrap_err();
        assert!(matches!(err, ProbeError::ReadinessTimeout { timeout_ms: 3_000, .. }));
        assert_eq!(container.phase(), ContainerPhase::Failed);
        drop(container);
        assert_eq!(runner.count("stop"), 1);
        assert_eq!(runner.count("rm"), 1);
    }

    #[test]
    fn test_inspect_failure_aborts_without_polling_again() {
        let runner = FakeEngine::new(vec![CommandOutput::failure(1, "No such container")]);
        let engine = Engine::new(&runner);
        let clock = ManualClock::new();
        let manager = ContainerManager::new(&engine, &clock, Duration::from_millis(500));

        let mut container = manager.start_detached("app", "startup").unwrap();
        let err = manager.await_ready(&mut container, timeout()).unwrap_err();
        assert!(matches!(err, ProbeError::Launch { ref image, .. } if image == "app"));
        assert!(err.to_string().contains(container.name()));
        assert!(!err.to_string().contains("0123456789ab"));
        assert_eq!(runner.count("inspect"), 1);
        assert_eq!(clock.sleep_count(), 0);
    }

    #[test]
    fn test_exited_container_names_image_and_container() {
        let runner = FakeEngine::new(vec![CommandOutput::success("exited|\n")]);
        let engine = Engine::new(&runner);
        let clock = ManualClock::new();
        let manager = ContainerManager::new(&engine, &clock, Duration::from_millis(500));

        let mut container = manager.start_detached("shop-api:1.4", "startup").unwrap();
        let err = manager.await_ready(&mut container, timeout()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'shop-api:1.4'"));
        assert!(msg.contains(&format!("container {} exited", container.name())));
    }

    #[test]
    fn test_failed_launch_removes_the_named_container() {
        let mut runner = FakeEngine::new(vec![]);
        runner.fail_launch = true;
        let engine = Engine::new(&runner);
        let clock = ManualClock::new();
        let manager = ContainerManager::new(&engine, &clock, Duration::from_millis(500));

        let err = manager.start_detached("app", "startup").unwrap_err();
        assert!(matches!(err, ProbeError::Launch { .. }));
        assert!(err.to_string().contains("OCI runtime create failed"));
        assert_eq!(runner.count("stop"), 0);
        let removed = runner.removed.borrow();
        assert_eq!(removed.len(), 1);
        assert!(removed[0].ends_with("-startup-1"));
    }

    #[test]
    fn test_failed_create_removes_the_named_container() {
        let mut runner = FakeEngine::new(vec![]);
        runner.fail_launch = true;
        let engine = Engine::new(&runner);
        let clock = ManualClock::new();
        let manager = ContainerManager::new(&engine, &clock, Duration::from_millis(500));

        assert!(manager.create("app", "secrets").is_err());
        let removed = runner.removed.borrow();
        assert_eq!(removed.len(), 1);
        assert!(removed[0].ends_with("-secrets-1"));
    }

    #[test]
    fn test_failed_stop_still_removes() {
        let mut runner = FakeEngine::new(vec![]);
        runner.fail_stop = true;
        let engine = Engine::new(&runner);
        let clock = ManualClock::new();
        let manager = ContainerManager::new(&engine, &clock, Duration::from_millis(500));

        let container = manager.start_detached("app", "memory").unwrap();
        let outcome = container.teardown();
        assert!(outcome.is_failed());
        assert_eq!(runner.count("stop"), 1);
        assert_eq!(runner.count("rm"), 1);
    }

    #[test]
    fn test_teardown_then_drop_cleans_once() {
        let runner = FakeEngine::new(vec![]);
        let engine = Engine::new(&runner);
        let clock = ManualClock::new();
        let manager = ContainerManager::new(&engine, &clock, Duration::from_millis(500));

        let container = manager.start_detached("app", "cpu").unwrap();
        container.teardown();
        assert_eq!(runner.count("stop"), 1);
        assert_eq!(runner.count("rm"), 1);
    }

    #[test]
    fn test_created_container_is_removed_without_stop() {
        let runner = FakeEngine::new(vec![]);
        let engine = Engine::new(&runner);
        let clock = ManualClock::new();
        let manager = ContainerManager::new(&engine, &clock, Duration::from_millis(500));

        let container = manager.create("app", "secrets").unwrap();
        assert_eq!(container.phase(), ContainerPhase::Created);
        drop(container);
        assert_eq!(runner.count("stop"), 0);
        assert_eq!(runner.count("rm"), 1);
    }

    #[test]
    fn test_names_are_unique_per_launch() {
        let runner = FakeEngine::new(vec![]);
        let engine = Engine::new(&runner);
        let clock = ManualClock::new();
        let manager = ContainerManager::new(&engine, &clock, Duration::from_millis(500));
        let a = manager.start_detached("app", "startup").unwrap();
        let b = manager.start_detached("app", "startup").unwrap();
        assert_ne!(a.name(), b.name());
    }
}
