// driver.rs - Tick-driven real-time evolution of a spin system.
//
// The driver owns no scheduling primitive: the host (event loop, timer,
// plain loop) calls `tick` at whatever cadence it wants, and the borrow on
// the spin system guarantees nothing else mutates it during a tick.

use rand::Rng;

use crate::config::DriverConfig;
use crate::error::{Error, Result};
use crate::spin::SpinSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    Stopped,
}

/// Published to the presentation collaborator once per tick.
#[derive(Debug, Clone)]
pub struct TickSnapshot {
    pub spins: Vec<i8>,
    pub magnetization: f64,
    pub abs_magnetization: f64,
    pub energy: f64,
    pub energy_per_node: f64,
    /// Fraction of attempted flips accepted during this tick.
    pub acceptance_rate: f64,
}

/// State machine for the continuous animation loop.
///
/// Stopping halts further ticks but leaves the spin state untouched, so a
/// restarted driver continues from wherever the system was left.
#[derive(Debug, Clone)]
pub struct SimulationDriver {
    state: DriverState,
    temperature: f64,
    sweeps_per_tick: usize,
}

impl SimulationDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            state: DriverState::Idle,
            temperature: config.temperature,
            sweeps_per_tick: config.sweeps_per_tick,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn sweeps_per_tick(&self) -> usize {
        self.sweeps_per_tick
    }

    /// Begin (or resume) ticking. No-op when already running.
    pub fn start(&mut self) {
        self.state = DriverState::Running;
    }

    /// Halt further ticks. Idempotent; an idle driver stays idle.
    pub fn stop(&mut self) {
        if self.state == DriverState::Running {
            self.state = DriverState::Stopped;
        }
    }

    /// Live parameter update; takes effect on the next tick.
    pub fn set_temperature(&mut self, temperature: f64) -> Result<()> {
        if !(temperature > 0.0) {
            return Err(Error::Config(format!(
                "temperature must be positive, got {temperature}"
            )));
        }
        self.temperature = temperature;
        Ok(())
    }

    /// Live parameter update; takes effect on the next tick.
    pub fn set_sweeps_per_tick(&mut self, sweeps: usize) -> Result<()> {
        if sweeps == 0 {
            return Err(Error::Config("sweeps per tick must be at least 1".into()));
        }
        self.sweeps_per_tick = sweeps;
        Ok(())
    }

    /// Advance the system by one tick and publish a snapshot. Returns `None`
    /// unless the driver is running.
    pub fn tick(&mut self, system: &mut SpinSystem, rng: &mut impl Rng) -> Option<TickSnapshot> {
        if self.state != DriverState::Running {
            return None;
        }
        let attempted = self.sweeps_per_tick * system.n();
        let accepted = system.run_sweeps(self.temperature, self.sweeps_per_tick, rng);
        Some(TickSnapshot {
            spins: system.spins().to_vec(),
            magnetization: system.magnetization(),
            abs_magnetization: system.abs_magnetization(),
            energy: system.energy(),
            energy_per_node: system.energy_per_node(),
            acceptance_rate: accepted as f64 / attempted as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CouplingGraph, LatticeKind};
    use crate::spin::{SpinInit, SpinSystem, FERROMAGNETIC_COUPLING};
    use rand::SeedableRng;
    use rand_pcg::Pcg64;
    use std::sync::Arc;

    fn system(rng: &mut Pcg64) -> SpinSystem {
        let graph = Arc::new(CouplingGraph::lattice(LatticeKind::Square, 4).unwrap());
        SpinSystem::new(graph, FERROMAGNETIC_COUPLING, SpinInit::Random, rng)
    }

    #[test]
    fn ticks_only_while_running() {
        let mut rng = Pcg64::seed_from_u64(1);
        let mut sys = system(&mut rng);
        let mut driver = SimulationDriver::new(DriverConfig::new(2.0, 2).unwrap());

        assert_eq!(driver.state(), DriverState::Idle);
        assert!(driver.tick(&mut sys, &mut rng).is_none());

        driver.start();
        assert_eq!(driver.state(), DriverState::Running);
        let snap = driver.tick(&mut sys, &mut rng).unwrap();
        assert_eq!(snap.spins.len(), 16);
        assert!((0.0..=1.0).contains(&snap.acceptance_rate));
        assert!((snap.magnetization.abs() - snap.abs_magnetization).abs() < 1e-12);

        driver.stop();
        assert_eq!(driver.state(), DriverState::Stopped);
        assert!(driver.tick(&mut sys, &mut rng).is_none());
        // Idempotent.
        driver.stop();
        assert_eq!(driver.state(), DriverState::Stopped);
    }

    #[test]
    fn stop_preserves_spin_state() {
        let mut rng = Pcg64::seed_from_u64(2);
        let mut sys = system(&mut rng);
        let mut driver = SimulationDriver::new(DriverConfig::new(2.0, 1).unwrap());
        driver.start();
        let snap = driver.tick(&mut sys, &mut rng).unwrap();
        driver.stop();
        assert_eq!(sys.spins(), snap.spins.as_slice());
    }

    #[test]
    fn live_parameter_updates() {
        let mut driver = SimulationDriver::new(DriverConfig::new(2.0, 1).unwrap());
        driver.start();
        driver.set_temperature(1.5).unwrap();
        driver.set_sweeps_per_tick(4).unwrap();
        assert_eq!(driver.temperature(), 1.5);
        assert_eq!(driver.sweeps_per_tick(), 4);
        assert_eq!(driver.state(), DriverState::Running);

        assert!(driver.set_temperature(0.0).is_err());
        assert!(driver.set_sweeps_per_tick(0).is_err());
        // Rejected updates leave the previous values in place.
        assert_eq!(driver.temperature(), 1.5);
        assert_eq!(driver.sweeps_per_tick(), 4);
    }

    #[test]
    fn restart_after_stop() {
        let mut rng = Pcg64::seed_from_u64(3);
        let mut sys = system(&mut rng);
        let mut driver = SimulationDriver::new(DriverConfig::new(2.0, 1).unwrap());
        driver.start();
        driver.tick(&mut sys, &mut rng);
        driver.stop();
        driver.start();
        assert!(driver.tick(&mut sys, &mut rng).is_some());
    }
}
