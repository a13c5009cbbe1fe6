// config.rs - Validated run parameters (single source of truth).

use crate::error::{Error, Result};

/// Parameters of a temperature sweep.
#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    /// Lower end of the temperature range (exclusive zero).
    pub t_min: f64,
    /// Upper end of the temperature range.
    pub t_max: f64,
    /// Number of temperature points in a uniform schedule.
    pub points: usize,
    /// Sweeps discarded at each temperature before measuring.
    pub equilibration_sweeps: usize,
    /// Sweeps run between consecutive measurements of one trial.
    pub measurement_sweeps: usize,
    /// Independent measurements taken per temperature.
    pub trials: usize,
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.t_min > 0.0) {
            return Err(Error::Config(format!(
                "temperature must be positive, got t_min = {}",
                self.t_min
            )));
        }
        if !(self.t_max > self.t_min) {
            return Err(Error::Config(format!(
                "temperature range is empty: [{}, {}]",
                self.t_min, self.t_max
            )));
        }
        if self.points < 2 {
            return Err(Error::Config(format!(
                "a sweep needs at least 2 temperature points, got {}",
                self.points
            )));
        }
        if self.measurement_sweeps == 0 {
            return Err(Error::Config(
                "measurement sweeps must be at least 1".into(),
            ));
        }
        if self.trials == 0 {
            return Err(Error::Config("trial count must be at least 1".into()));
        }
        Ok(())
    }
}

/// Parameters of the real-time animation driver.
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    pub temperature: f64,
    pub sweeps_per_tick: usize,
}

impl DriverConfig {
    pub fn new(temperature: f64, sweeps_per_tick: usize) -> Result<Self> {
        if !(temperature > 0.0) {
            return Err(Error::Config(format!(
                "temperature must be positive, got {temperature}"
            )));
        }
        if sweeps_per_tick == 0 {
            return Err(Error::Config("sweeps per tick must be at least 1".into()));
        }
        Ok(Self {
            temperature,
            sweeps_per_tick,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SweepConfig {
        SweepConfig {
            t_min: 1.0,
            t_max: 3.0,
            points: 10,
            equilibration_sweeps: 100,
            measurement_sweeps: 10,
            trials: 5,
        }
    }

    #[test]
    fn accepts_sane_parameters() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        let mut c = base();
        c.t_min = 0.0;
        assert!(c.validate().is_err());

        let mut c = base();
        c.t_max = c.t_min;
        assert!(c.validate().is_err());

        let mut c = base();
        c.points = 1;
        assert!(c.validate().is_err());

        let mut c = base();
        c.trials = 0;
        assert!(c.validate().is_err());

        let mut c = base();
        c.measurement_sweeps = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn driver_config_guards() {
        assert!(DriverConfig::new(2.0, 3).is_ok());
        assert!(DriverConfig::new(0.0, 3).is_err());
        assert!(DriverConfig::new(-1.0, 3).is_err());
        assert!(DriverConfig::new(2.0, 0).is_err());
    }
}
