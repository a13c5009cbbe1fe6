// spin.rs - Mutable spin assignment with cached total energy and
// single-spin-flip Metropolis dynamics.

use std::sync::Arc;

use rand::Rng;

use crate::graph::CouplingGraph;

/// Default coupling constant. Negative J favors parallel alignment
/// (ferromagnetic).
pub const FERROMAGNETIC_COUPLING: f64 = -1.0;

/// Initial spin assignment policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinInit {
    /// i.i.d. ±1 with equal probability.
    Random,
    AllUp,
    AllDown,
}

/// Returned by `metropolis_step`, allows O(1) bookkeeping in the caller.
#[derive(Debug, Clone, Copy)]
pub struct StepInfo {
    pub accepted: bool,
    pub delta_e: f64,
}

/// Spin state over a shared read-only coupling graph.
///
/// Total energy is E = (J/2) Σ_i Σ_{j∈N(i)} w_ij s_i s_j (the 1/2 corrects
/// double counting over the symmetric neighbor enumeration); with J < 0 the
/// aligned state is the ground state. The cached value is advanced by the
/// per-flip delta on every accepted move and rebuilt from scratch on resets.
#[derive(Debug, Clone)]
pub struct SpinSystem {
    graph: Arc<CouplingGraph>,
    spins: Vec<i8>,
    coupling: f64,
    energy: f64,
}

impl SpinSystem {
    pub fn new(
        graph: Arc<CouplingGraph>,
        coupling: f64,
        init: SpinInit,
        rng: &mut impl Rng,
    ) -> Self {
        let spins = match init {
            SpinInit::Random => (0..graph.n())
                .map(|_| if rng.gen::<f64>() < 0.5 { 1 } else { -1 })
                .collect(),
            SpinInit::AllUp => vec![1; graph.n()],
            SpinInit::AllDown => vec![-1; graph.n()],
        };
        let mut system = Self {
            graph,
            spins,
            coupling,
            energy: 0.0,
        };
        system.energy = system.recomputed_energy();
        system
    }

    /// Number of spins.
    #[inline(always)]
    pub fn n(&self) -> usize {
        self.spins.len()
    }

    pub fn graph(&self) -> &CouplingGraph {
        &self.graph
    }

    pub fn coupling(&self) -> f64 {
        self.coupling
    }

    pub fn spins(&self) -> &[i8] {
        &self.spins
    }

    /// Cached total energy.
    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn energy_per_node(&self) -> f64 {
        self.energy / self.n() as f64
    }

    /// Total energy rebuilt from the spin assignment. Matches `energy()` up
    /// to floating-point accumulation error.
    pub fn recomputed_energy(&self) -> f64 {
        let mut sum = 0.0;
        for i in 0..self.n() {
            let si = self.spins[i] as f64;
            for &(j, w) in self.graph.neighbors(i) {
                sum += w * si * self.spins[j] as f64;
            }
        }
        0.5 * self.coupling * sum
    }

    /// Weighted sum of neighboring spins of node `i`. O(degree).
    #[inline]
    fn local_field(&self, i: usize) -> f64 {
        self.graph
            .neighbors(i)
            .iter()
            .map(|&(j, w)| w * self.spins[j] as f64)
            .sum()
    }

    /// Energy change if the spin of node `i` were flipped, without mutating
    /// state: ΔE = -2 J s_i Σ_{j∈N(i)} w_ij s_j. O(degree).
    pub fn flip_delta(&self, i: usize) -> f64 {
        -2.0 * self.coupling * self.spins[i] as f64 * self.local_field(i)
    }

    /// One Metropolis step: pick a node uniformly at random, accept the flip
    /// if ΔE ≤ 0, otherwise with probability exp(-ΔE/T). At T ≤ 0 an
    /// energy-increasing flip is never accepted (greedy quench).
    pub fn metropolis_step(&mut self, temperature: f64, rng: &mut impl Rng) -> StepInfo {
        let i = rng.gen_range(0..self.n());
        let delta_e = self.flip_delta(i);

        let accepted = if delta_e <= 0.0 {
            true
        } else if temperature <= 0.0 {
            false
        } else {
            rng.gen::<f64>() < (-delta_e / temperature).exp()
        };

        if accepted {
            self.spins[i] = -self.spins[i];
            self.energy += delta_e;
        }
        StepInfo { accepted, delta_e }
    }

    /// Run `sweeps * n` Metropolis steps (one sweep = one attempted update
    /// per node on average). Returns the number of accepted flips. The chain
    /// is inherently serial: every step depends on the state left by the
    /// previous one.
    pub fn run_sweeps(&mut self, temperature: f64, sweeps: usize, rng: &mut impl Rng) -> usize {
        let steps = sweeps * self.n();
        let mut accepted = 0;
        for _ in 0..steps {
            if self.metropolis_step(temperature, rng).accepted {
                accepted += 1;
            }
        }
        accepted
    }

    /// Mean spin value, in [-1, 1].
    pub fn magnetization(&self) -> f64 {
        self.spins.iter().map(|&s| s as f64).sum::<f64>() / self.n() as f64
    }

    /// |mean spin|, in [0, 1]. The order parameter: the signed mean vanishes
    /// by symmetry in finite samples.
    pub fn abs_magnetization(&self) -> f64 {
        self.magnetization().abs()
    }

    /// Reassign every spin i.i.d. ±1 and rebuild the energy from scratch.
    pub fn reset_random(&mut self, rng: &mut impl Rng) {
        for s in &mut self.spins {
            *s = if rng.gen::<f64>() < 0.5 { 1 } else { -1 };
        }
        self.energy = self.recomputed_energy();
    }

    /// Set every spin to `value` (+1 or -1) and rebuild the energy from
    /// scratch.
    pub fn reset_uniform(&mut self, value: i8) {
        assert!(value == 1 || value == -1, "spin value must be +1 or -1");
        for s in &mut self.spins {
            *s = value;
        }
        self.energy = self.recomputed_energy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LatticeKind;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn square5() -> Arc<CouplingGraph> {
        Arc::new(CouplingGraph::lattice(LatticeKind::Square, 5).unwrap())
    }

    #[test]
    fn cached_energy_tracks_recomputation() {
        let mut rng = Pcg64::seed_from_u64(7);
        let mut system = SpinSystem::new(square5(), FERROMAGNETIC_COUPLING, SpinInit::Random, &mut rng);

        for step in 0..5_000 {
            system.metropolis_step(2.27, &mut rng);
            if step % 500 == 0 {
                let scratch = system.recomputed_energy();
                let scale = scratch.abs().max(1.0);
                assert!(
                    (system.energy() - scratch).abs() / scale < 1e-6,
                    "cached {} vs scratch {}",
                    system.energy(),
                    scratch
                );
            }
        }
    }

    #[test]
    fn spins_stay_in_domain() {
        let mut rng = Pcg64::seed_from_u64(11);
        let mut system = SpinSystem::new(square5(), FERROMAGNETIC_COUPLING, SpinInit::Random, &mut rng);
        system.run_sweeps(3.0, 20, &mut rng);
        assert!(system.spins().iter().all(|&s| s == 1 || s == -1));
    }

    #[test]
    fn magnetization_bounds() {
        let mut rng = Pcg64::seed_from_u64(13);
        let mut system = SpinSystem::new(square5(), FERROMAGNETIC_COUPLING, SpinInit::Random, &mut rng);
        for _ in 0..50 {
            system.run_sweeps(1.8, 1, &mut rng);
            let m = system.magnetization();
            assert!((-1.0..=1.0).contains(&m));
            let am = system.abs_magnetization();
            assert!((0.0..=1.0).contains(&am));
        }
    }

    #[test]
    fn aligned_energy_closed_form() {
        let mut rng = Pcg64::seed_from_u64(17);
        let graph = square5();
        let total_weight = graph.total_edge_weight();
        let mut system = SpinSystem::new(graph, FERROMAGNETIC_COUPLING, SpinInit::Random, &mut rng);

        system.reset_uniform(1);
        let expected = FERROMAGNETIC_COUPLING * total_weight;
        assert!((system.recomputed_energy() - expected).abs() < 1e-9);
        assert!((system.energy() - expected).abs() < 1e-9);

        system.reset_uniform(-1);
        assert!((system.energy() - expected).abs() < 1e-9);
    }

    #[test]
    fn flip_delta_matches_recomputation() {
        let mut rng = Pcg64::seed_from_u64(19);
        let mut system = SpinSystem::new(square5(), FERROMAGNETIC_COUPLING, SpinInit::Random, &mut rng);

        for i in [0, 7, 12, 24] {
            let predicted = system.flip_delta(i);
            let before = system.recomputed_energy();
            system.spins[i] = -system.spins[i];
            let after = system.recomputed_energy();
            system.spins[i] = -system.spins[i];
            assert!((predicted - (after - before)).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_temperature_never_climbs() {
        let mut rng = Pcg64::seed_from_u64(23);
        let mut system = SpinSystem::new(square5(), FERROMAGNETIC_COUPLING, SpinInit::AllUp, &mut rng);
        let ground = system.energy();

        // From the ground state every flip raises the energy, so a quench
        // at T = 0 must leave the state untouched.
        let accepted = system.run_sweeps(0.0, 10, &mut rng);
        assert_eq!(accepted, 0);
        assert_eq!(system.magnetization(), 1.0);
        assert!((system.energy() - ground).abs() < 1e-12);
    }

    #[test]
    fn weighted_graph_energy() {
        let graph = Arc::new(
            CouplingGraph::from_edges(3, &[(0, 1, 2.0), (1, 2, 0.5)]).unwrap(),
        );
        let mut rng = Pcg64::seed_from_u64(29);
        let mut system = SpinSystem::new(graph, FERROMAGNETIC_COUPLING, SpinInit::AllUp, &mut rng);
        assert!((system.energy() - (-2.5)).abs() < 1e-12);

        // Flipping the middle spin breaks both bonds.
        assert!((system.flip_delta(1) - 5.0).abs() < 1e-12);
        system.reset_uniform(-1);
        assert!((system.energy() - (-2.5)).abs() < 1e-12);
    }
}
