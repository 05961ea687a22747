use super::TickSource;
use crate::models::tick::Tick;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;

/// Seeded geometric random walk used by the demo host and scenario tests.
pub struct RandomWalkSource {
    price: f64,
    timestamp: i64,
    interval_ms: i64,
    drift: f64,                  // per-tick fractional drift
    noise: Option<Normal>,       // per-tick return noise; None = deterministic
    half_spread: f64,            // fractional
    rng: StdRng,
    remaining: Option<usize>,
}

impl RandomWalkSource {
    pub fn new(start_price: f64, start_timestamp: i64, interval_ms: i64, seed: u64) -> Self {
        Self {
            price: start_price,
            timestamp: start_timestamp,
            interval_ms: interval_ms.max(1),
            drift: 0.0,
            noise: None,
            half_spread: 0.0001,
            rng: StdRng::seed_from_u64(seed),
            remaining: None,
        }
    }

    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    /// Per-tick return standard deviation. Non-positive values disable noise.
    pub fn with_volatility(mut self, std_dev: f64) -> Self {
        self.noise = Normal::new(0.0, std_dev).ok().filter(|_| std_dev > 0.0);
        self
    }

    pub fn with_limit(mut self, ticks: usize) -> Self {
        self.remaining = Some(ticks);
        self
    }
}

impl TickSource for RandomWalkSource {
    fn next_tick(&mut self) -> Option<Tick> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        let shock = match &self.noise {
            Some(normal) => normal.sample(&mut self.rng),
            None => 0.0,
        };
        self.price = (self.price * (1.0 + self.drift + shock)).max(f64::MIN_POSITIVE);
        self.timestamp += self.interval_ms;

        let volume = self.rng.gen_range(0.1..5.0);
        let spread = self.price * self.half_spread;
        Some(
            Tick::new(self.price, volume, self.timestamp)
                .with_quote(self.price - spread, self.price + spread),
        )
    }
}

impl Iterator for RandomWalkSource {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        self.next_tick()
    }
}
