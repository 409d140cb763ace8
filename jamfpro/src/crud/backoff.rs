//! Capped exponential backoff with optional jitter

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    /// Fraction of the base delay added at random, e.g. 0.5 adds up to 50%
    pub jitter: Option<f64>,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
            jitter: None,
        }
    }

    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = Some(factor);
        self
    }

    /// Settings used by ID lookups and availability polling
    pub fn jittered_lookup() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30), 2.0).with_jitter(0.5)
    }

    /// Delay before the retry that follows failed attempt `attempt` (0-based)
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial.as_secs_f64() * self.multiplier.powi(exponent);

        if !scaled.is_finite() || scaled >= self.max.as_secs_f64() {
            return self.max;
        }

        Duration::from_secs_f64(scaled.max(0.0)).min(self.max)
    }

    /// Base delay plus jitter, if configured
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);

        match self.jitter {
            Some(factor) if factor > 0.0 && factor.is_finite() => {
                let extra = rand::rng().random_range(0.0..factor);
                base + base.mul_f64(extra)
            }
            _ => base,
        }
    }
}
