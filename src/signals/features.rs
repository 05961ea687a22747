use crate::config::FeatureConfig;
use crate::models::evolution::MarketConditions;
use crate::models::signal::VolatilityState;
use crate::signals::tick_buffer::TickBuffer;
use statrs::statistics::Statistics;

/// Derives momentum, volatility regime and the flat band from a tick buffer.
///
/// With fewer than two ticks every estimate is neutral: momentum 0,
/// volatility Medium.
#[derive(Debug, Clone)]
pub struct FeatureEstimator {
    config: FeatureConfig,
}

impl FeatureEstimator {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Standard deviation of per-tick returns over the volatility window.
    /// None until at least two returns exist.
    pub fn volatility(&self, buffer: &TickBuffer) -> Option<f64> {
        let returns = buffer.returns(self.config.volatility_window);
        if returns.len() < 2 {
            return None;
        }
        let sd = returns.iter().std_dev();
        sd.is_finite().then_some(sd)
    }

    pub fn volatility_bucket(&self, buffer: &TickBuffer) -> VolatilityState {
        match self.volatility(buffer) {
            Some(sd) => VolatilityState::from_std_dev(
                sd,
                self.config.vol_low_threshold,
                self.config.vol_high_threshold,
            ),
            None => VolatilityState::Medium,
        }
    }

    pub fn dead_zone_threshold(&self) -> f64 {
        self.config.dead_zone()
    }

    /// Price change over the last K ticks normalised by the volatility expected
    /// over K ticks, squashed into [-1, 1].
    ///
    /// While warming, the lookback shrinks to whatever history is available.
    pub fn momentum(&self, buffer: &TickBuffer) -> f64 {
        if buffer.len() < 2 {
            return 0.0;
        }
        let lookback = self.config.momentum_lookback.min(buffer.len() - 1);
        let (Some(latest), Some(base)) = (buffer.latest(), buffer.back(lookback)) else {
            return 0.0;
        };

        let pct_change = (latest.price - base.price) / base.price;
        let sigma = self.volatility(buffer).unwrap_or(0.0);
        let expected_move = (sigma * (lookback as f64).sqrt()).max(self.dead_zone_threshold());

        (pct_change / expected_move).tanh()
    }

    /// Expected absolute fractional move over `horizon_ms`, assuming returns
    /// scale with the square root of the number of ticks in the horizon.
    pub fn expected_move(&self, buffer: &TickBuffer, horizon_ms: u32) -> f64 {
        let Some(sigma) = self.volatility(buffer) else {
            return 0.0;
        };
        let ticks_per_horizon = buffer
            .mean_interval_ms(self.config.volatility_window)
            .filter(|interval| *interval > 0.0)
            .map(|interval| f64::from(horizon_ms) / interval)
            .unwrap_or(1.0)
            .max(1.0);
        sigma * ticks_per_horizon.sqrt()
    }

    /// Conditions snapshot handed along with outcomes to the evolution engine.
    pub fn market_conditions(&self, buffer: &TickBuffer) -> MarketConditions {
        let volumes: Vec<f64> = buffer
            .last_n(self.config.volatility_window)
            .map(|t| t.volume)
            .collect();
        let volume = if volumes.is_empty() {
            0.0
        } else {
            volumes.iter().mean()
        };
        MarketConditions {
            volatility: self.volatility(buffer).unwrap_or(0.0),
            trend: self.momentum(buffer),
            volume,
        }
        .sanitized()
    }
}
