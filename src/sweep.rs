// sweep.rs - Temperature sweep: equilibrate, measure, aggregate per point,
// with cooperative cancellation and progress reporting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info};

use crate::config::SweepConfig;
use crate::error::{Error, Result};
use crate::spin::SpinSystem;
use crate::stats::OnlineStats;

/// Upper bound on sweeps run between cancellation checks during
/// equilibration.
const EQUILIBRATION_CHUNK: usize = 2000;

/// Schedule temperatures closer than this to an existing measurement are
/// treated as the same point and skipped.
pub const TEMPERATURE_MATCH_TOL: f64 = 0.01;

/// Fraction of adaptive-schedule points concentrated inside the focus
/// window.
const ADAPTIVE_FOCUS_SHARE: f64 = 0.7;

/// Shared cooperative cancellation flag. Checked at chunk and trial
/// boundaries; there is no preemption mid-chunk.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// How a sweep ended. Cancellation is a normal termination mode: recorded
/// measurements are retained either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed,
    Cancelled,
}

/// Progress snapshot passed to the observer alongside the measurement table.
#[derive(Debug, Clone, Copy)]
pub struct SweepProgress {
    /// Overall completion in [0, 1], including the in-flight point.
    pub fraction: f64,
    /// Temperature currently being worked on (or just finished).
    pub temperature: f64,
    pub completed_points: usize,
    pub total_points: usize,
}

/// Aggregated statistics for one temperature point.
#[derive(Debug, Clone, Copy)]
pub struct TemperatureMeasurement {
    pub temperature: f64,
    pub mean_abs_magnetization: f64,
    /// Sample standard deviation over the trials.
    pub std_magnetization: f64,
    pub mean_energy_per_node: f64,
}

impl TemperatureMeasurement {
    /// Error band [mean - sd, mean + sd], lower edge clamped to zero.
    pub fn error_band(&self) -> (f64, f64) {
        let lo = (self.mean_abs_magnetization - self.std_magnetization).max(0.0);
        let hi = self.mean_abs_magnetization + self.std_magnetization;
        (lo, hi)
    }
}

/// `count` evenly spaced temperatures from `t_max` down to `t_min`:
/// the conventional sweep starts hot and cools.
pub fn generate_schedule(t_min: f64, t_max: f64, count: usize) -> Result<Vec<f64>> {
    validate_range(t_min, t_max, count)?;
    let step = (t_max - t_min) / (count - 1) as f64;
    Ok((0..count).map(|i| t_max - i as f64 * step).collect())
}

/// Two-stage schedule: roughly 70% of points inside
/// `[center - margin, center + margin]` (clamped to the range), the rest
/// split between the regions below and above. Returned hot-to-cold.
pub fn generate_adaptive_schedule(
    t_min: f64,
    t_max: f64,
    count: usize,
    center: f64,
    margin: f64,
) -> Result<Vec<f64>> {
    validate_range(t_min, t_max, count)?;
    if !(margin > 0.0) || !center.is_finite() {
        return Err(Error::Config(format!(
            "adaptive window must have a finite center and positive margin, got center = {center}, margin = {margin}"
        )));
    }

    let lo = (center - margin).max(t_min);
    let hi = (center + margin).min(t_max);
    if !(hi > lo) {
        // Window collapsed outside the range; fall back to uniform.
        return generate_schedule(t_min, t_max, count);
    }

    let focus_n = ((count as f64 * ADAPTIVE_FOCUS_SHARE).round() as usize).clamp(1, count);
    let mut below_n = (count - focus_n) / 2;
    let mut above_n = count - focus_n - below_n;
    if lo - t_min < TEMPERATURE_MATCH_TOL {
        above_n += below_n;
        below_n = 0;
    }
    if t_max - hi < TEMPERATURE_MATCH_TOL {
        below_n += above_n;
        above_n = 0;
    }

    let mut temps = linspace(lo, hi, count - below_n - above_n);
    if below_n > 0 {
        // Endpoints at `lo` belong to the focus window; drop the duplicate.
        let side = linspace(t_min, lo, below_n + 1);
        temps.extend_from_slice(&side[..below_n]);
    }
    if above_n > 0 {
        let side = linspace(hi, t_max, above_n + 1);
        temps.extend_from_slice(&side[1..]);
    }
    temps.sort_by(|a, b| b.partial_cmp(a).unwrap());
    Ok(temps)
}

fn validate_range(t_min: f64, t_max: f64, count: usize) -> Result<()> {
    if !(t_min > 0.0) {
        return Err(Error::Config(format!(
            "temperature must be positive, got t_min = {t_min}"
        )));
    }
    if !(t_max > t_min) {
        return Err(Error::Config(format!(
            "temperature range is empty: [{t_min}, {t_max}]"
        )));
    }
    if count < 2 {
        return Err(Error::Config(format!(
            "a schedule needs at least 2 points, got {count}"
        )));
    }
    Ok(())
}

fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![0.5 * (a + b)],
        _ => {
            let step = (b - a) / (n - 1) as f64;
            (0..n).map(|i| a + i as f64 * step).collect()
        }
    }
}

/// Drives a spin system across a temperature schedule and accumulates the
/// per-temperature measurement table, sorted ascending by temperature.
///
/// The engine holds the system only for the duration of `run`; the exclusive
/// `&mut` borrow is the hand-off contract with the animation driver.
#[derive(Debug)]
pub struct SweepEngine {
    config: SweepConfig,
    measurements: Vec<TemperatureMeasurement>,
}

impl SweepEngine {
    pub fn new(config: SweepConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            measurements: Vec::new(),
        })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Recorded measurements, ascending by temperature.
    pub fn measurements(&self) -> &[TemperatureMeasurement] {
        &self.measurements
    }

    /// Forget all recorded measurements (fresh, non-continuation sweep).
    pub fn clear_measurements(&mut self) {
        self.measurements.clear();
    }

    /// Whether a temperature within the match tolerance has been recorded.
    pub fn is_measured(&self, temperature: f64) -> bool {
        self.measurements
            .iter()
            .any(|m| (m.temperature - temperature).abs() < TEMPERATURE_MATCH_TOL)
    }

    /// Work through `schedule`, appending one measurement per new
    /// temperature. Already-measured temperatures are skipped, so a second
    /// run with an adaptive schedule continues the same table. On
    /// cancellation the in-flight point is discarded, never half-recorded.
    pub fn run(
        &mut self,
        system: &mut SpinSystem,
        schedule: &[f64],
        rng: &mut impl Rng,
        cancel: &CancelToken,
        mut on_progress: impl FnMut(&[TemperatureMeasurement], SweepProgress),
    ) -> SweepOutcome {
        let total = schedule.len();
        if total == 0 {
            return SweepOutcome::Completed;
        }
        info!(points = total, "temperature sweep started");

        let mut completed = 0usize;
        for &temperature in schedule {
            if cancel.is_cancelled() {
                info!(completed, "sweep cancelled");
                return SweepOutcome::Cancelled;
            }
            if self.is_measured(temperature) {
                completed += 1;
                debug!(temperature, "already measured, skipping");
                on_progress(
                    &self.measurements,
                    SweepProgress {
                        fraction: completed as f64 / total as f64,
                        temperature,
                        completed_points: completed,
                        total_points: total,
                    },
                );
                continue;
            }

            let config = &self.config;
            let measurements = &self.measurements;
            let point = measure_point(config, system, temperature, rng, cancel, &mut |frac| {
                on_progress(
                    measurements,
                    SweepProgress {
                        fraction: (completed as f64 + frac) / total as f64,
                        temperature,
                        completed_points: completed,
                        total_points: total,
                    },
                );
            });

            match point {
                Some(m) => {
                    completed += 1;
                    debug!(
                        temperature,
                        mean_abs_magnetization = m.mean_abs_magnetization,
                        "temperature point measured"
                    );
                    let pos = self
                        .measurements
                        .partition_point(|x| x.temperature < m.temperature);
                    self.measurements.insert(pos, m);
                    on_progress(
                        &self.measurements,
                        SweepProgress {
                            fraction: completed as f64 / total as f64,
                            temperature,
                            completed_points: completed,
                            total_points: total,
                        },
                    );
                }
                None => {
                    info!(completed, temperature, "sweep cancelled mid-point");
                    return SweepOutcome::Cancelled;
                }
            }
        }

        info!(points = completed, "temperature sweep complete");
        SweepOutcome::Completed
    }
}

/// Equilibrate, then measure `trials` times. Returns `None` when cancelled;
/// the partially measured point is dropped.
fn measure_point(
    config: &SweepConfig,
    system: &mut SpinSystem,
    temperature: f64,
    rng: &mut impl Rng,
    cancel: &CancelToken,
    on_point_progress: &mut dyn FnMut(f64),
) -> Option<TemperatureMeasurement> {
    let point_sweeps =
        (config.equilibration_sweeps + config.trials * config.measurement_sweeps) as f64;
    let mut done = 0usize;

    let mut remaining = config.equilibration_sweeps;
    while remaining > 0 {
        if cancel.is_cancelled() {
            return None;
        }
        let chunk = remaining.min(EQUILIBRATION_CHUNK);
        system.run_sweeps(temperature, chunk, rng);
        remaining -= chunk;
        done += chunk;
        on_point_progress(done as f64 / point_sweeps);
    }

    let mut mag = OnlineStats::default();
    let mut energy = OnlineStats::default();
    for _ in 0..config.trials {
        if cancel.is_cancelled() {
            return None;
        }
        system.run_sweeps(temperature, config.measurement_sweeps, rng);
        mag.push(system.abs_magnetization());
        energy.push(system.energy_per_node());
        done += config.measurement_sweeps;
        on_point_progress(done as f64 / point_sweeps);
    }

    Some(TemperatureMeasurement {
        temperature,
        mean_abs_magnetization: mag.mean(),
        std_magnetization: mag.std(),
        mean_energy_per_node: energy.mean(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CouplingGraph, LatticeKind};
    use crate::spin::{SpinInit, SpinSystem, FERROMAGNETIC_COUPLING};
    use rand::SeedableRng;
    use rand_pcg::Pcg64;
    use std::sync::Arc;

    fn quick_config() -> SweepConfig {
        SweepConfig {
            t_min: 1.0,
            t_max: 3.0,
            points: 10,
            equilibration_sweeps: 5,
            measurement_sweeps: 2,
            trials: 3,
        }
    }

    fn small_system(rng: &mut Pcg64) -> SpinSystem {
        let graph = Arc::new(CouplingGraph::lattice(LatticeKind::Square, 3).unwrap());
        SpinSystem::new(graph, FERROMAGNETIC_COUPLING, SpinInit::Random, rng)
    }

    #[test]
    fn schedule_is_descending_and_inclusive() {
        let temps = generate_schedule(1.0, 3.0, 5).unwrap();
        assert_eq!(temps.len(), 5);
        assert!((temps[0] - 3.0).abs() < 1e-12);
        assert!((temps[4] - 1.0).abs() < 1e-12);
        assert!(temps.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn schedule_rejects_bad_ranges() {
        assert!(generate_schedule(0.0, 3.0, 5).is_err());
        assert!(generate_schedule(2.0, 2.0, 5).is_err());
        assert!(generate_schedule(1.0, 3.0, 1).is_err());
    }

    #[test]
    fn adaptive_schedule_clusters_around_center() {
        let temps = generate_adaptive_schedule(1.0, 4.0, 20, 2.3, 0.5).unwrap();
        assert_eq!(temps.len(), 20);
        assert!(temps.windows(2).all(|w| w[0] > w[1]));
        assert!(temps.iter().all(|&t| (1.0..=4.0).contains(&t)));

        let in_window = temps.iter().filter(|&&t| (1.8..=2.8).contains(&t)).count();
        assert!(
            in_window as f64 >= 0.6 * temps.len() as f64,
            "{in_window}/20 points inside the focus window"
        );
    }

    #[test]
    fn adaptive_schedule_handles_edge_centers() {
        // Window clamped against the lower end: no "below" region remains.
        let temps = generate_adaptive_schedule(1.0, 4.0, 11, 1.1, 0.5).unwrap();
        assert_eq!(temps.len(), 11);
        assert!(temps.iter().all(|&t| (1.0..=4.0).contains(&t)));

        // Window entirely outside the range falls back to uniform.
        let temps = generate_adaptive_schedule(1.0, 4.0, 5, 10.0, 0.5).unwrap();
        assert_eq!(temps.len(), 5);
        assert!((temps[0] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn sweep_records_every_point_sorted() {
        let mut rng = Pcg64::seed_from_u64(5);
        let mut system = small_system(&mut rng);
        let mut engine = SweepEngine::new(quick_config()).unwrap();
        let schedule = generate_schedule(1.0, 3.0, 10).unwrap();
        let cancel = CancelToken::new();

        let mut last_fraction = 0.0;
        let outcome = engine.run(&mut system, &schedule, &mut rng, &cancel, |_, p| {
            assert!(p.fraction >= last_fraction - 1e-12);
            last_fraction = p.fraction;
        });

        assert_eq!(outcome, SweepOutcome::Completed);
        assert_eq!(engine.measurements().len(), 10);
        assert!((last_fraction - 1.0).abs() < 1e-12);
        assert!(engine
            .measurements()
            .windows(2)
            .all(|w| w[0].temperature < w[1].temperature));
        for m in engine.measurements() {
            assert!((0.0..=1.0).contains(&m.mean_abs_magnetization));
            assert!(m.std_magnetization >= 0.0);
        }
    }

    #[test]
    fn cancellation_keeps_completed_points_only() {
        let mut rng = Pcg64::seed_from_u64(6);
        let mut system = small_system(&mut rng);
        let mut engine = SweepEngine::new(quick_config()).unwrap();
        let schedule = generate_schedule(1.0, 3.0, 10).unwrap();
        let cancel = CancelToken::new();

        let observer_cancel = cancel.clone();
        let outcome = engine.run(&mut system, &schedule, &mut rng, &cancel, |table, _| {
            if table.len() >= 3 {
                observer_cancel.cancel();
            }
        });

        assert_eq!(outcome, SweepOutcome::Cancelled);
        assert_eq!(engine.measurements().len(), 3);
    }

    #[test]
    fn continuation_skips_measured_temperatures() {
        let mut rng = Pcg64::seed_from_u64(7);
        let mut system = small_system(&mut rng);
        let mut engine = SweepEngine::new(quick_config()).unwrap();
        let cancel = CancelToken::new();

        engine.run(&mut system, &[2.0], &mut rng, &cancel, |_, _| {});
        assert_eq!(engine.measurements().len(), 1);

        // 2.005 is within the match tolerance of the recorded 2.0.
        let outcome = engine.run(&mut system, &[2.005, 1.0], &mut rng, &cancel, |_, _| {});
        assert_eq!(outcome, SweepOutcome::Completed);
        assert_eq!(engine.measurements().len(), 2);
        assert!(engine.is_measured(2.0));
        assert!(engine.is_measured(1.0));

        engine.clear_measurements();
        assert!(engine.measurements().is_empty());
    }

    #[test]
    fn error_band_clamps_at_zero() {
        let m = TemperatureMeasurement {
            temperature: 2.5,
            mean_abs_magnetization: 0.05,
            std_magnetization: 0.2,
            mean_energy_per_node: -0.5,
        };
        let (lo, hi) = m.error_band();
        assert_eq!(lo, 0.0);
        assert!((hi - 0.25).abs() < 1e-12);
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = quick_config();
        config.trials = 0;
        assert!(SweepEngine::new(config).is_err());
    }
}
