pub mod build;
pub mod cpu;
pub mod disk;
pub mod image_profile;
pub mod memory;
pub mod network;
pub mod permissions;
pub mod secrets;
pub mod startup;
pub mod vulnerability;

use crate::clock::Clock;
use crate::config::ProbeConfig;
use crate::engine::Engine;
use crate::error::Result;
use crate::lifecycle::{ContainerGuard, ContainerManager};
use std::time::Duration;

/// What every probe gets: the engine, a clock, config and the image under test.
pub struct ProbeContext<'e> {
    pub engine: &'e Engine<'e>,
    pub containers: ContainerManager<'e>,
    pub clock: &'e dyn Clock,
    pub config: &'e ProbeConfig,
    pub image: &'e str,
}

impl<'e> ProbeContext<'e> {
    pub fn new(
        engine: &'e Engine<'e>,
        clock: &'e dyn Clock,
        config: &'e ProbeConfig,
        image: &'e str,
    ) -> Self {
        Self {
            engine,
            containers: ContainerManager::new(engine, clock, config.probes.poll_interval()),
            clock,
            config,
            image,
        }
    }

    /// Run `f` and return its result with the wall-clock time it took, in ms.
    pub fn timed<T>(&self, f: impl FnOnce() -> T) -> (T, f64) {
        let start = self.clock.now();
        let value = f();
        let elapsed = self.clock.elapsed_since(start);
        (value, duration_ms(elapsed))
    }

    /// Start a detached container, hand it to `f`, and tear it down whatever `f` returns.
    pub fn with_container<T>(
        &self,
        name_hint: &str,
        f: impl FnOnce(&ContainerGuard<'e>) -> Result<T>,
    ) -> Result<T> {
        let container = self.containers.start_detached(self.image, name_hint)?;
        let result = f(&container);
        container.teardown();
        result
    }

    /// Like `with_container`, but waits `warmup` before calling `f`.
    pub fn with_warm_container<T>(
        &self,
        name_hint: &str,
        f: impl FnOnce(&ContainerGuard<'e>) -> Result<T>,
    ) -> Result<T> {
        self.with_container(name_hint, |container| {
            self.clock.sleep(self.config.probes.warmup());
            f(container)
        })
    }
}

pub(crate) fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1_000.0
}
