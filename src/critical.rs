// critical.rs - Critical-temperature estimation from a measurement table:
// smooth, differentiate, locate the steepest magnetization drop, refine.

use nalgebra::{Matrix3, Vector3};
use tracing::debug;

use crate::sweep::TemperatureMeasurement;

/// Minimum number of measurements required for an estimate.
pub const MIN_MEASUREMENTS: usize = 6;

const UNCERTAINTY_FLOOR: f64 = 0.02;
const UNCERTAINTY_CEIL: f64 = 0.2;

/// Estimated critical temperature with an uncertainty half-width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticalPoint {
    pub temperature: f64,
    pub uncertainty: f64,
}

/// Estimate the critical temperature from per-temperature magnetization
/// statistics. Returns `None` with fewer than `MIN_MEASUREMENTS` points.
///
/// Magnetization falls monotonically with temperature, so the steepest drop
/// of the smoothed curve marks the transition. The discrete peak is refined
/// by the vertex of an exact parabola through the three slopes around it,
/// and the uncertainty is the half-width at half-maximum of the slope peak.
pub fn estimate(measurements: &[TemperatureMeasurement]) -> Option<CriticalPoint> {
    if measurements.len() < MIN_MEASUREMENTS {
        return None;
    }

    let mut points: Vec<(f64, f64)> = measurements
        .iter()
        .map(|m| (m.temperature, m.mean_abs_magnetization))
        .collect();
    points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    let temps: Vec<f64> = points.iter().map(|p| p.0).collect();
    let mags: Vec<f64> = points.iter().map(|p| p.1).collect();
    let smoothed = smooth3(&mags);

    // Negated discrete slope at pair midpoints: positive where the
    // magnetization is falling.
    let mut slope_t = Vec::with_capacity(temps.len() - 1);
    let mut slope = Vec::with_capacity(temps.len() - 1);
    for i in 1..temps.len() {
        let dt = temps[i] - temps[i - 1];
        if dt <= 0.0 {
            continue;
        }
        slope_t.push(0.5 * (temps[i] + temps[i - 1]));
        slope.push((smoothed[i - 1] - smoothed[i]) / dt);
    }
    if slope.len() < 2 {
        return None;
    }

    let (peak_idx, &peak_slope) = slope
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())?;

    let t_min = *temps.first().unwrap();
    let t_max = *temps.last().unwrap();
    let span = t_max - t_min;

    if peak_slope <= 0.0 {
        // The curve never falls: no transition in range. Keep the formal
        // location but flag a wide relative uncertainty.
        let temperature = slope_t[peak_idx];
        debug!(temperature, "no falling edge found in magnetization curve");
        return Some(CriticalPoint {
            temperature,
            uncertainty: clamp_uncertainty(0.05 * temperature),
        });
    }

    let mut temperature = slope_t[peak_idx];
    if peak_idx > 0 && peak_idx + 1 < slope.len() {
        if let Some(vertex) = parabola_vertex(
            (slope_t[peak_idx - 1], slope[peak_idx - 1]),
            (slope_t[peak_idx], slope[peak_idx]),
            (slope_t[peak_idx + 1], slope[peak_idx + 1]),
        ) {
            if vertex >= t_min && vertex <= t_max {
                temperature = vertex;
            }
        }
    }

    let uncertainty = half_width_at_half_max(&slope_t, &slope, peak_idx)
        .unwrap_or_else(|| span / measurements.len() as f64);
    debug!(temperature, uncertainty, "critical point estimated");

    Some(CriticalPoint {
        temperature,
        uncertainty: clamp_uncertainty(uncertainty),
    })
}

/// Centered moving average of window 3; edge points copied unsmoothed.
fn smooth3(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut out = values.to_vec();
    for i in 1..n.saturating_sub(1) {
        out[i] = (values[i - 1] + values[i] + values[i + 1]) / 3.0;
    }
    out
}

/// Vertex abscissa of the exact parabola through three points, provided the
/// parabola opens downward.
fn parabola_vertex(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64)) -> Option<f64> {
    let m = Matrix3::new(
        p0.0 * p0.0,
        p0.0,
        1.0,
        p1.0 * p1.0,
        p1.0,
        1.0,
        p2.0 * p2.0,
        p2.0,
        1.0,
    );
    let rhs = Vector3::new(p0.1, p1.1, p2.1);
    let coeffs = m.lu().solve(&rhs)?;
    let (a, b) = (coeffs[0], coeffs[1]);
    if a >= 0.0 {
        return None;
    }
    Some(-b / (2.0 * a))
}

/// Half-width at half-maximum of the slope peak. Walks outward from the
/// peak until the slope drops below half its maximum; `None` when the peak
/// sits at (or spills over) a boundary of the slope array.
fn half_width_at_half_max(slope_t: &[f64], slope: &[f64], peak_idx: usize) -> Option<f64> {
    let half = slope[peak_idx] / 2.0;

    let mut left = None;
    for i in (0..peak_idx).rev() {
        if slope[i] < half {
            left = Some(slope_t[i]);
            break;
        }
    }
    let mut right = None;
    for i in peak_idx + 1..slope.len() {
        if slope[i] < half {
            right = Some(slope_t[i]);
            break;
        }
    }

    match (left, right) {
        (Some(l), Some(r)) => Some(0.5 * (r - l)),
        _ => None,
    }
}

fn clamp_uncertainty(u: f64) -> f64 {
    u.clamp(UNCERTAINTY_FLOOR, UNCERTAINTY_CEIL)
}
