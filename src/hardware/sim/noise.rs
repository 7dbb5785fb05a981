//! Error model of the simulated robot.
//!
//! Each motion command draws one slip factor, the ratio of the distance or
//! angle actually covered to the commanded one, so a whole turn lands short
//! or long by the same proportion. Rotations also draw a gyro drift rate,
//! the error the gyro accumulates per degree turned. Sensor readings get
//! independent zero-mean Gaussian noise.

use crate::config::NoiseConfig;
use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::StandardNormal;

/// Seeded source of slip, drift and sensor noise.
#[derive(Clone, Debug)]
pub struct SimNoise {
    rng: SmallRng,
    config: NoiseConfig,
}

impl SimNoise {
    /// Seed 0 draws from OS entropy; any other seed replays the same run.
    pub fn new(seed: u64, config: NoiseConfig) -> Self {
        let rng = match seed {
            0 => SmallRng::from_entropy(),
            seed => SmallRng::seed_from_u64(seed),
        };
        Self { rng, config }
    }

    fn normal(&mut self, stddev: f32) -> f32 {
        if stddev <= 0.0 {
            return 0.0;
        }
        stddev * self.rng.sample::<f32, _>(StandardNormal)
    }

    /// Actual over commanded distance for one travel command
    pub fn travel_slip(&mut self) -> f32 {
        let stddev = self.config.travel_slip;
        (1.0 + self.normal(stddev)).max(0.0)
    }

    /// Actual over commanded angle for one rotate command
    pub fn rotation_slip(&mut self) -> f32 {
        let stddev = self.config.rotation_slip;
        (1.0 + self.normal(stddev)).max(0.0)
    }

    /// Gyro error per degree turned, signed
    pub fn drift_rate(&mut self) -> f32 {
        let stddev = self.config.gyro_drift_per_deg;
        self.normal(stddev)
    }

    pub fn ultrasonic(&mut self, distance_m: f32) -> f32 {
        let stddev = self.config.ultrasonic_stddev_m;
        distance_m + self.normal(stddev)
    }

    pub fn gyro(&mut self, heading_deg: f32) -> f32 {
        let stddev = self.config.gyro_stddev_deg;
        heading_deg + self.normal(stddev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_replays_the_same_run() {
        let mut first = SimNoise::new(42, NoiseConfig::default());
        let mut second = SimNoise::new(42, NoiseConfig::default());
        for _ in 0..50 {
            assert_eq!(first.rotation_slip(), second.rotation_slip());
            assert_eq!(first.drift_rate(), second.drift_rate());
            assert_eq!(first.ultrasonic(0.2), second.ultrasonic(0.2));
        }
    }

    #[test]
    fn test_disabled_model_is_exact() {
        let mut noise = SimNoise::new(3, NoiseConfig::disabled());
        assert_eq!(noise.travel_slip(), 1.0);
        assert_eq!(noise.rotation_slip(), 1.0);
        assert_eq!(noise.drift_rate(), 0.0);
        assert_eq!(noise.ultrasonic(0.42), 0.42);
        assert_eq!(noise.gyro(270.0), 270.0);
    }

    #[test]
    fn test_rotation_slip_centres_on_commanded_angle() {
        let config = NoiseConfig {
            rotation_slip: 0.05,
            ..NoiseConfig::disabled()
        };
        let mut noise = SimNoise::new(7, config);
        let turns: Vec<f32> = (0..5000).map(|_| 90.0 * noise.rotation_slip()).collect();
        let mean = turns.iter().sum::<f32>() / turns.len() as f32;
        assert!((mean - 90.0).abs() < 0.5, "mean turn = {}", mean);
        // Slip never reverses a command
        assert!(turns.iter().all(|turn| *turn >= 0.0));
        assert!(turns.iter().any(|turn| *turn < 90.0));
        assert!(turns.iter().any(|turn| *turn > 90.0));
    }
}
