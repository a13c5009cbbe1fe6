pub mod error;
pub mod stats;
pub mod config;
pub mod graph;
pub mod spin;
pub mod driver;
pub mod sweep;
pub mod critical;

#[cfg(test)]
mod scenario_tests {
    //! Statistical end-to-end check: sweep a small square lattice across the
    //! transition and recover the known critical temperature.

    use std::sync::Arc;

    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    use crate::config::SweepConfig;
    use crate::critical;
    use crate::graph::{CouplingGraph, LatticeKind};
    use crate::spin::{SpinInit, SpinSystem, FERROMAGNETIC_COUPLING};
    use crate::sweep::{generate_schedule, CancelToken, SweepEngine, SweepOutcome};

    #[test]
    fn square_lattice_sweep_recovers_critical_temperature() {
        let graph = Arc::new(CouplingGraph::lattice(LatticeKind::Square, 5).unwrap());
        let mut rng = Pcg64::seed_from_u64(20260806);
        let mut system = SpinSystem::new(
            graph,
            FERROMAGNETIC_COUPLING,
            SpinInit::Random,
            &mut rng,
        );

        let config = SweepConfig {
            t_min: 1.5,
            t_max: 3.0,
            points: 9,
            equilibration_sweeps: 5000,
            measurement_sweeps: 500,
            trials: 50,
        };
        let schedule = generate_schedule(config.t_min, config.t_max, config.points).unwrap();
        let mut engine = SweepEngine::new(config).unwrap();
        let cancel = CancelToken::new();

        let outcome = engine.run(&mut system, &schedule, &mut rng, &cancel, |_, _| {});
        assert_eq!(outcome, SweepOutcome::Completed);
        assert_eq!(engine.measurements().len(), 9);

        // Mean |m| should fall with temperature, up to statistical slack.
        let table = engine.measurements();
        for pair in table.windows(2) {
            assert!(
                pair[1].mean_abs_magnetization <= pair[0].mean_abs_magnetization + 0.05,
                "|m| rose from {:.3} at T = {:.2} to {:.3} at T = {:.2}",
                pair[0].mean_abs_magnetization,
                pair[0].temperature,
                pair[1].mean_abs_magnetization,
                pair[1].temperature
            );
        }
        // Deep in the ordered phase the lattice is close to saturated.
        assert!(table[0].mean_abs_magnetization > 0.8);

        let cp = critical::estimate(table).expect("enough points for an estimate");
        let theory = LatticeKind::Square.critical_temperature();
        assert!(
            (cp.temperature - theory).abs() < 0.3,
            "estimate {:.3} too far from {theory}",
            cp.temperature
        );
    }
}
