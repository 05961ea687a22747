use crate::config::{Config, FeatureConfig, PredictionConfig};
use crate::engine::learner::Learner;
use crate::models::evolution::MarketConditions;
use crate::models::learning::{EnginePhase, LearningState, Stats};
use crate::models::prediction::TickPrediction;
use crate::models::signal::Direction;
use crate::models::tick::Tick;
use crate::signals::features::FeatureEstimator;
use crate::signals::tick_buffer::TickBuffer;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Streaming direction forecaster for a single symbol.
///
/// Single writer: `process_tick` and `generate_prediction` take `&mut self`
/// and must not interleave. Hosts running several symbols own one engine per
/// task and share only the evolution handle.
pub struct PredictionEngine {
    symbol: String,
    features: FeatureEstimator,
    buffer: TickBuffer,
    learner: Learner,
    pending: Vec<TickPrediction>,
    archive: VecDeque<TickPrediction>,
    archive_capacity: usize,
    tick_count: u64,
    rejected_ticks: u64,
    last_timestamp: Option<i64>,
}

impl PredictionEngine {
    pub fn new(symbol: impl Into<String>, features: FeatureConfig, prediction: PredictionConfig) -> Self {
        Self {
            symbol: symbol.into(),
            buffer: TickBuffer::new(features.buffer_capacity),
            features: FeatureEstimator::new(features),
            archive: VecDeque::with_capacity(prediction.archive_capacity),
            archive_capacity: prediction.archive_capacity.max(1),
            learner: Learner::new(prediction),
            pending: Vec::new(),
            tick_count: 0,
            rejected_ticks: 0,
            last_timestamp: None,
        }
    }

    pub fn from_config(symbol: impl Into<String>, config: &Config) -> Self {
        Self::new(symbol, config.features.clone(), config.prediction.clone())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Ingest one tick and resolve every pending prediction that has come due.
    ///
    /// Malformed or out-of-order ticks are dropped with a warning and leave the
    /// engine untouched. Returns the predictions resolved by this tick, in the
    /// order they were issued.
    pub fn process_tick(&mut self, tick: Tick) -> Vec<TickPrediction> {
        if let Err(reason) =
            tick.validate(self.last_timestamp, self.features.config().allow_equal_timestamps)
        {
            self.rejected_ticks += 1;
            warn!("[{}] Tick rejected: {reason}", self.symbol);
            return Vec::new();
        }

        self.buffer.append(tick);
        self.tick_count += 1;
        self.last_timestamp = Some(tick.timestamp);
        self.learner
            .observe_volatility(self.features.volatility_bucket(&self.buffer));

        self.resolve_due(&tick)
    }

    fn resolve_due(&mut self, tick: &Tick) -> Vec<TickPrediction> {
        if !self.pending.iter().any(|p| p.is_due(tick.timestamp)) {
            return Vec::new();
        }

        let dead_zone = self.features.dead_zone_threshold();
        let (due, still_pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.is_due(tick.timestamp));
        self.pending = still_pending;

        let mut resolved = Vec::with_capacity(due.len());
        for mut prediction in due {
            if !prediction.resolve(tick.price, tick.timestamp, dead_zone) {
                continue;
            }
            self.learner.record(&prediction, dead_zone);
            debug!(
                "[{}] Prediction {} resolved: predicted={:?} actual={:?} change={:.5}",
                self.symbol,
                prediction.id,
                prediction.predicted_direction,
                prediction.actual_direction,
                prediction.price_change.unwrap_or(0.0),
            );
            self.archive(prediction.clone());
            resolved.push(prediction);
        }
        resolved
    }

    fn archive(&mut self, prediction: TickPrediction) {
        if self.archive.len() >= self.archive_capacity {
            self.archive.pop_front();
        }
        self.archive.push_back(prediction);
    }

    /// Issue a new pending prediction from the latest tick.
    ///
    /// Returns None before the first tick. `horizon_ms` overrides the
    /// self-tuned horizon for this prediction only.
    pub fn generate_prediction(&mut self, horizon_ms: Option<u32>) -> Option<TickPrediction> {
        let latest = *self.buffer.latest()?;
        let state = self.learner.state();

        let horizon = horizon_ms.unwrap_or(state.adaptive_horizon_ms);
        let multiplier = state.confidence_multiplier;
        let dead_zone = self.features.dead_zone_threshold();

        let momentum = self.features.momentum(&self.buffer);
        let raw_signal = momentum * multiplier + state.momentum_bias;
        let direction = Direction::classify(raw_signal, dead_zone);
        let magnitude = self.features.expected_move(&self.buffer, horizon) * multiplier;
        let confidence = (0.5 + raw_signal.abs() * multiplier).clamp(0.0, 1.0);

        let prediction = TickPrediction::new(
            latest.timestamp,
            latest.price,
            horizon,
            direction,
            magnitude,
            confidence,
        );
        debug!(
            "[{}] Prediction {}: {:?} mag={:.5} conf={:.3} horizon={}ms momentum={:.3}",
            self.symbol, prediction.id, direction, magnitude, confidence, horizon, momentum,
        );
        self.pending.push(prediction.clone());
        Some(prediction)
    }

    pub fn state(&self) -> &LearningState {
        self.learner.state()
    }

    pub fn stats(&self) -> Stats {
        *self.learner.stats()
    }

    pub fn pending_predictions(&self) -> &[TickPrediction] {
        &self.pending
    }

    /// Last `n` resolved predictions, most recent last.
    pub fn recent_predictions(&self, n: usize) -> Vec<TickPrediction> {
        let skip = self.archive.len().saturating_sub(n);
        self.archive.iter().skip(skip).cloned().collect()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn rejected_ticks(&self) -> u64 {
        self.rejected_ticks
    }

    pub fn phase(&self) -> EnginePhase {
        match self.buffer.len() {
            0 => EnginePhase::Empty,
            n if n < self.features.config().momentum_lookback => EnginePhase::Warming,
            _ => EnginePhase::Active,
        }
    }

    pub fn market_conditions(&self) -> MarketConditions {
        self.features.market_conditions(&self.buffer)
    }

    /// Drop all ticks, predictions and learned state. Evolution state is not
    /// owned here and is unaffected.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.pending.clear();
        self.archive.clear();
        self.learner.reset();
        self.tick_count = 0;
        self.rejected_ticks = 0;
        self.last_timestamp = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::signal::VolatilityState;

    fn engine() -> PredictionEngine {
        PredictionEngine::from_config("TEST", &Config::default())
    }

    #[test]
    fn test_no_prediction_before_first_tick() {
        let mut e = engine();
        assert_eq!(e.phase(), EnginePhase::Empty);
        assert!(e.generate_prediction(None).is_none());
        assert!(e.pending_predictions().is_empty());
    }

    #[test]
    fn test_phases() {
        let mut e = engine();
        e.process_tick(Tick::new(100.0, 1.0, 0));
        assert_eq!(e.phase(), EnginePhase::Warming);
        for i in 1..20 {
            e.process_tick(Tick::new(100.0, 1.0, i * 100));
        }
        assert_eq!(e.phase(), EnginePhase::Active);
    }

    #[test]
    fn test_single_tick_predicts_flat() {
        let mut e = engine();
        e.process_tick(Tick::new(100.0, 1.0, 1_000));
        let p = e.generate_prediction(Some(2_000)).expect("prediction");
        assert_eq!(p.predicted_direction, Direction::Flat);
        assert_eq!(p.resolve_at, 3_000);
        assert_eq!(p.entry_price, 100.0);
        assert!((p.confidence - 0.5).abs() < 1e-12);
        assert_eq!(e.pending_predictions().len(), 1);
    }

    #[test]
    fn test_resolves_on_first_due_tick() {
        let mut e = engine();
        e.process_tick(Tick::new(100.0, 1.0, 0));
        e.generate_prediction(Some(1_000));

        assert!(e.process_tick(Tick::new(100.0, 1.0, 999)).is_empty());
        let resolved = e.process_tick(Tick::new(100.0, 1.0, 1_500));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].actual_direction, Some(Direction::Flat));
        assert_eq!(resolved[0].was_correct, Some(true));
        assert_eq!(resolved[0].resolved_at, Some(1_500));
        assert!(e.pending_predictions().is_empty());
        assert_eq!(e.recent_predictions(5).len(), 1);
        assert_eq!(e.state().total_predictions, 1);

        // Later ticks never touch an archived prediction again.
        assert!(e.process_tick(Tick::new(110.0, 1.0, 3_000)).is_empty());
        assert_eq!(e.recent_predictions(5)[0].was_correct, Some(true));
    }

    #[test]
    fn test_rejected_tick_leaves_state_untouched() {
        let mut e = engine();
        e.process_tick(Tick::new(100.0, 1.0, 1_000));
        e.process_tick(Tick::new(f64::NAN, 1.0, 2_000));
        e.process_tick(Tick::new(-5.0, 1.0, 2_000));
        e.process_tick(Tick::new(100.0, 1.0, 500));
        assert_eq!(e.tick_count(), 1);
        assert_eq!(e.rejected_ticks(), 3);
    }

    #[test]
    fn test_equal_timestamps_follow_config() {
        let mut strict = engine();
        strict.process_tick(Tick::new(100.0, 1.0, 1_000));
        strict.process_tick(Tick::new(100.1, 1.0, 1_000));
        assert_eq!(strict.tick_count(), 1);
        assert_eq!(strict.rejected_ticks(), 1);

        let features = FeatureConfig {
            allow_equal_timestamps: true,
            ..FeatureConfig::default()
        };
        let mut lenient = PredictionEngine::new("TEST", features, PredictionConfig::default());
        lenient.process_tick(Tick::new(100.0, 1.0, 1_000));
        lenient.process_tick(Tick::new(100.1, 1.0, 1_000));
        assert_eq!(lenient.tick_count(), 2);
    }

    #[test]
    fn test_timestamps_near_max_do_not_overflow() {
        let mut e = engine();
        e.process_tick(Tick::new(100.0, 1.0, i64::MAX - 10));
        let p = e.generate_prediction(None).expect("prediction");
        assert_eq!(p.resolve_at, i64::MAX);

        assert!(e.process_tick(Tick::new(100.0, 1.0, i64::MAX - 5)).is_empty());
        assert_eq!(e.pending_predictions().len(), 1);
        e.generate_prediction(None).expect("second prediction");

        let resolved = e.process_tick(Tick::new(100.0, 1.0, i64::MAX));
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|p| p.actual_direction == Some(Direction::Flat)));
        assert_eq!(e.state().multi_level.timing.avg_score, 1.0);
    }

    #[test]
    fn test_confidence_uses_bias_and_multiplier() {
        let features = FeatureConfig {
            momentum_lookback: 1,
            ..FeatureConfig::default()
        };
        let mut e = PredictionEngine::new("TEST", features, PredictionConfig::default());

        // Nine confident Up calls, each resolved correct one tick later.
        let mut price = 100.0;
        for i in 0..11 {
            e.process_tick(Tick::new(price, 1.0, i * 100));
            if (1..10).contains(&i) {
                e.generate_prediction(Some(100));
            }
            if i < 10 {
                price *= 1.001;
            }
        }
        assert_eq!(e.state().total_predictions, 9);

        let bias = 1.0 - 0.98_f64.powi(9);
        let multiplier = 1.02_f64.powi(9);
        assert!((e.state().momentum_bias - bias).abs() < 1e-9);
        assert!((e.state().confidence_multiplier - multiplier).abs() < 1e-9);

        // Last tick repeats the previous price, so momentum is zero and the
        // signal is the bias alone.
        let p = e.generate_prediction(Some(100)).expect("prediction");
        assert_eq!(p.predicted_direction, Direction::Up);
        assert!((p.confidence - (0.5 + bias * multiplier)).abs() < 1e-9);
    }

    #[test]
    fn test_volatility_state_tracks_ticks() {
        let mut e = engine();
        e.process_tick(Tick::new(100.0, 1.0, 0));
        assert_eq!(e.state().volatility_state, VolatilityState::Medium);

        for i in 1..10 {
            e.process_tick(Tick::new(100.0, 1.0, i * 100));
        }
        assert_eq!(e.state().volatility_state, VolatilityState::Low);

        for i in 10..20 {
            let price = if i % 2 == 0 { 100.0 } else { 101.0 };
            e.process_tick(Tick::new(price, 1.0, i * 100));
        }
        assert_eq!(e.state().volatility_state, VolatilityState::High);

        e.process_tick(Tick::new(f64::NAN, 1.0, 5_000));
        assert_eq!(e.state().volatility_state, VolatilityState::High);
    }

    #[test]
    fn test_archive_is_bounded_and_ordered() {
        let mut e = engine();
        e.process_tick(Tick::new(100.0, 1.0, 0));
        for i in 0..30 {
            e.generate_prediction(Some(1_000));
            e.process_tick(Tick::new(100.0, 1.0, (i + 1) * 1_000));
        }
        let recent = e.recent_predictions(100);
        assert_eq!(recent.len(), 20);
        assert!(recent.windows(2).all(|w| w[0].created_at < w[1].created_at));

        let last_three = e.recent_predictions(3);
        assert_eq!(last_three.len(), 3);
        assert_eq!(last_three[2].id, recent[19].id);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut e = engine();
        for i in 0..10 {
            e.process_tick(Tick::new(100.0 + i as f64, 1.0, i * 500));
            e.generate_prediction(Some(1_000));
        }
        e.reset();
        let once = (e.state().clone(), e.stats(), e.tick_count(), e.phase());
        e.reset();
        let twice = (e.state().clone(), e.stats(), e.tick_count(), e.phase());
        assert_eq!(once, twice);
        assert_eq!(e.tick_count(), 0);
        assert!(e.pending_predictions().is_empty());
        assert!(e.recent_predictions(20).is_empty());
        assert_eq!(e.state(), &LearningState::default());
    }
}
