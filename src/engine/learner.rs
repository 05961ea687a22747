use crate::config::PredictionConfig;
use crate::models::learning::{LearningState, Stats};
use crate::models::prediction::TickPrediction;
use crate::models::signal::{Direction, VolatilityState};
use std::collections::VecDeque;
use tracing::debug;

const TREND_EPSILON: f64 = 1e-9;

/// Folds resolved predictions into `LearningState` and retunes the
/// confidence multiplier, horizon and momentum bias.
#[derive(Debug, Clone)]
pub struct Learner {
    config: PredictionConfig,
    state: LearningState,
    stats: Stats,
    recent_outcomes: VecDeque<bool>,
    calibration_seeded: bool,
}

impl Learner {
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            state: LearningState::new(&config),
            stats: Stats::default(),
            recent_outcomes: VecDeque::with_capacity(config.recent_window),
            calibration_seeded: false,
            config,
        }
    }

    pub fn state(&self) -> &LearningState {
        &self.state
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn observe_volatility(&mut self, volatility: VolatilityState) {
        self.state.volatility_state = volatility;
    }

    /// Update every counter and tuned parameter from one resolved prediction.
    ///
    /// `dead_zone` bounds the magnitude score denominator so flat calls with a
    /// zero predicted magnitude are still scored.
    pub fn record(&mut self, prediction: &TickPrediction, dead_zone: f64) {
        let Some(correct) = prediction.was_correct else {
            return;
        };
        let actual = prediction.actual_direction.unwrap_or(Direction::Flat);
        let resolved_at = prediction.resolved_at.unwrap_or(prediction.resolve_at);
        let price_change = prediction.price_change.unwrap_or(0.0);

        self.record_counters(correct);
        self.record_recent(correct);
        self.stats.record(prediction.predicted_direction, correct);

        let ml = &mut self.state.multi_level;
        ml.direction.record(correct);

        let magnitude_score = magnitude_score(prediction.predicted_magnitude, price_change, dead_zone);
        ml.magnitude.record(magnitude_score);

        let previous_timing = ml.timing.avg_score;
        let had_timing = ml.timing.samples > 0;
        let timing_score = timing_score(resolved_at, prediction.resolve_at, prediction.horizon_ms);
        ml.timing.record(timing_score);
        let timing_fell = had_timing && ml.timing.avg_score < previous_timing - TREND_EPSILON;

        self.update_calibration(prediction.confidence);
        self.update_composite();
        self.adapt_confidence_multiplier();
        self.adapt_horizon(timing_fell, prediction.predicted_direction, actual);
        self.adapt_momentum_bias(prediction.predicted_direction, correct);

        debug!(
            "Resolved {:?}->{:?} correct={} acc={:.3} recent={:.3} mult={:.3} horizon={}ms bias={:.3}",
            prediction.predicted_direction,
            actual,
            correct,
            self.state.accuracy,
            self.state.recent_accuracy,
            self.state.confidence_multiplier,
            self.state.adaptive_horizon_ms,
            self.state.momentum_bias,
        );
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    fn record_counters(&mut self, correct: bool) {
        let s = &mut self.state;
        s.total_predictions += 1;
        if correct {
            s.correct_predictions += 1;
            s.streak += 1;
            s.best_streak = s.best_streak.max(s.streak);
        } else {
            s.streak = 0;
        }
        s.accuracy = s.correct_predictions as f64 / s.total_predictions as f64;
    }

    fn record_recent(&mut self, correct: bool) {
        if self.recent_outcomes.len() >= self.config.recent_window {
            self.recent_outcomes.pop_front();
        }
        self.recent_outcomes.push_back(correct);
        let hits = self.recent_outcomes.iter().filter(|c| **c).count();
        self.state.recent_accuracy = hits as f64 / self.recent_outcomes.len() as f64;
    }

    fn update_calibration(&mut self, confidence: f64) {
        let alpha = self.config.confidence_ema_alpha;
        let cal = &mut self.state.multi_level.confidence_calibration;
        let confidence = confidence.clamp(0.0, 1.0);
        cal.predicted = if self.calibration_seeded {
            alpha * confidence + (1.0 - alpha) * cal.predicted
        } else {
            confidence
        };
        self.calibration_seeded = true;
        cal.actual = self.state.recent_accuracy;
        cal.calibration_error = cal.predicted - cal.actual;
    }

    fn update_composite(&mut self) {
        let w = &self.config.composite_weights;
        let ml = &mut self.state.multi_level;
        let calibration_score = (1.0 - ml.confidence_calibration.calibration_error.abs()).clamp(0.0, 1.0);
        let score = (w.direction * ml.direction.accuracy
            + w.magnitude * ml.magnitude.avg_score
            + w.timing * ml.timing.avg_score
            + w.calibration * calibration_score)
            .clamp(0.0, 1.0);

        let delta = score - ml.composite.avg_score;
        ml.composite.trend = if delta > TREND_EPSILON {
            1.0
        } else if delta < -TREND_EPSILON {
            -1.0
        } else {
            0.0
        };
        ml.composite.avg_score = score;
    }

    fn adapt_confidence_multiplier(&mut self) {
        let c = &self.config;
        let error = self.state.multi_level.confidence_calibration.calibration_error;
        let mut multiplier = self.state.confidence_multiplier;

        if error > c.overconfidence_threshold {
            multiplier *= 1.0 - c.adapt_step;
        } else if error < -c.overconfidence_threshold
            || (error.abs() <= c.calibration_tolerance
                && self.state.recent_accuracy >= c.high_accuracy_threshold)
        {
            multiplier *= 1.0 + c.adapt_step;
        }

        self.state.confidence_multiplier =
            multiplier.clamp(c.min_confidence_multiplier, c.max_confidence_multiplier);
    }

    /// Shorten when timing quality falls; lengthen when a directional call
    /// resolved flat before the move materialised.
    fn adapt_horizon(&mut self, timing_fell: bool, predicted: Direction, actual: Direction) {
        let c = &self.config;
        let mut horizon = f64::from(self.state.adaptive_horizon_ms);

        if timing_fell {
            horizon *= 1.0 - c.adapt_step;
        } else if predicted.is_directional() && actual == Direction::Flat {
            horizon *= 1.0 + c.adapt_step;
        }

        let bounded = horizon
            .round()
            .clamp(f64::from(c.min_horizon_ms), f64::from(c.max_horizon_ms));
        self.state.adaptive_horizon_ms = bounded as u32;
    }

    fn adapt_momentum_bias(&mut self, predicted: Direction, correct: bool) {
        if !predicted.is_directional() {
            return;
        }
        let step = self.config.momentum_bias_step;
        let bias = &mut self.state.momentum_bias;
        if correct {
            *bias += step * (predicted.sign() - *bias);
        } else {
            *bias *= 1.0 - step;
        }
        *bias = bias.clamp(-1.0, 1.0);
    }
}

/// 1 when the realised move matches the predicted size, falling to 0 as the
/// gap reaches the predicted size (or the dead zone, whichever is larger).
pub fn magnitude_score(predicted_magnitude: f64, price_change: f64, dead_zone: f64) -> f64 {
    let scale = predicted_magnitude.max(dead_zone);
    if scale <= 0.0 {
        return 0.0;
    }
    (1.0 - (predicted_magnitude - price_change.abs()).abs() / scale).clamp(0.0, 1.0)
}

/// 1 when resolved exactly at `resolve_at`, decaying linearly with lateness
/// measured in horizons.
pub fn timing_score(resolved_at: i64, resolve_at: i64, horizon_ms: u32) -> f64 {
    if horizon_ms == 0 {
        return 1.0;
    }
    let lateness = resolved_at.saturating_sub(resolve_at).unsigned_abs() as f64;
    (1.0 - lateness / f64::from(horizon_ms)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(
        predicted: Direction,
        exit_price: f64,
        confidence: f64,
        lateness_ms: i64,
    ) -> TickPrediction {
        let mut p = TickPrediction::new(0, 100.0, 1_000, predicted, 0.001, confidence);
        p.resolve(exit_price, 1_000 + lateness_ms, 0.00025);
        p
    }

    #[test]
    fn test_accuracy_identity_and_streaks() {
        let mut learner = Learner::new(PredictionConfig::default());
        for _ in 0..3 {
            learner.record(&resolved(Direction::Up, 100.2, 0.7, 0), 0.00025);
        }
        learner.record(&resolved(Direction::Up, 99.8, 0.7, 0), 0.00025);

        let s = learner.state();
        assert_eq!(s.total_predictions, 4);
        assert_eq!(s.correct_predictions, 3);
        assert!((s.accuracy - 0.75).abs() < 1e-12);
        assert_eq!(s.streak, 0);
        assert_eq!(s.best_streak, 3);
        assert!((s.recent_accuracy - 0.75).abs() < 1e-12);
        assert_eq!(s.multi_level.direction.total, 4);
    }

    #[test]
    fn test_recent_window_slides() {
        let config = PredictionConfig {
            recent_window: 2,
            ..PredictionConfig::default()
        };
        let mut learner = Learner::new(config);
        learner.record(&resolved(Direction::Up, 99.0, 0.6, 0), 0.00025);
        learner.record(&resolved(Direction::Up, 101.0, 0.6, 0), 0.00025);
        learner.record(&resolved(Direction::Up, 101.0, 0.6, 0), 0.00025);
        assert_eq!(learner.state().recent_accuracy, 1.0);
        assert!(learner.state().accuracy < 1.0);
    }

    #[test]
    fn test_overconfidence_shrinks_multiplier() {
        let mut learner = Learner::new(PredictionConfig::default());
        for _ in 0..30 {
            learner.record(&resolved(Direction::Up, 99.0, 0.95, 0), 0.00025);
        }
        let s = learner.state();
        assert!(s.multi_level.confidence_calibration.calibration_error > 0.5);
        assert!(s.confidence_multiplier < 1.0);
        assert!(s.confidence_multiplier >= 0.5);
    }

    #[test]
    fn test_multiplier_bounded_above() {
        let mut learner = Learner::new(PredictionConfig::default());
        // Always correct with low stated confidence: underconfident, keeps growing.
        for _ in 0..500 {
            learner.record(&resolved(Direction::Up, 101.0, 0.5, 0), 0.00025);
        }
        assert_eq!(learner.state().confidence_multiplier, 2.0);
    }

    #[test]
    fn test_premature_flat_lengthens_horizon() {
        let mut learner = Learner::new(PredictionConfig::default());
        learner.record(&resolved(Direction::Up, 100.0, 0.6, 0), 0.00025);
        assert_eq!(learner.state().adaptive_horizon_ms, 5_100);
    }

    #[test]
    fn test_late_resolution_shortens_horizon() {
        let mut learner = Learner::new(PredictionConfig::default());
        learner.record(&resolved(Direction::Flat, 100.0, 0.5, 0), 0.00025);
        learner.record(&resolved(Direction::Flat, 100.0, 0.5, 500), 0.00025);
        assert!(learner.state().multi_level.timing.avg_score < 1.0);
        assert_eq!(learner.state().adaptive_horizon_ms, 4_900);
    }

    #[test]
    fn test_momentum_bias_follows_correct_direction() {
        let mut learner = Learner::new(PredictionConfig::default());
        for _ in 0..10 {
            learner.record(&resolved(Direction::Down, 99.0, 0.6, 0), 0.00025);
        }
        let bias = learner.state().momentum_bias;
        assert!(bias < 0.0 && bias >= -1.0);

        learner.record(&resolved(Direction::Down, 101.0, 0.6, 0), 0.00025);
        assert!(learner.state().momentum_bias > bias);
    }

    #[test]
    fn test_scores() {
        assert_eq!(magnitude_score(0.001, 0.001, 0.00025), 1.0);
        assert_eq!(magnitude_score(0.001, -0.001, 0.00025), 1.0);
        assert_eq!(magnitude_score(0.001, 0.003, 0.00025), 0.0);
        assert_eq!(magnitude_score(0.0, 0.0, 0.00025), 1.0);
        assert_eq!(timing_score(1_000, 1_000, 1_000), 1.0);
        assert!((timing_score(1_500, 1_000, 1_000) - 0.5).abs() < 1e-12);
        assert_eq!(timing_score(5_000, 1_000, 1_000), 0.0);
        assert_eq!(timing_score(i64::MAX, i64::MIN, 1_000), 0.0);
        assert_eq!(timing_score(i64::MIN, i64::MAX, 1_000), 0.0);
    }

    #[test]
    fn test_composite_weights() {
        let mut learner = Learner::new(PredictionConfig::default());

        // Correct, on time, exact size. Calibration: 0.7 stated vs 1.0 observed.
        learner.record(&resolved(Direction::Up, 100.1, 0.7, 0), 0.00025);
        let c = learner.state().multi_level.composite;
        assert!((c.avg_score - (0.4 + 0.2 + 0.2 + 0.2 * 0.7)).abs() < 1e-9);
        assert_eq!(c.trend, 1.0);

        // Wrong direction, same size. Calibration EMA 0.68 vs 0.5 observed.
        learner.record(&resolved(Direction::Down, 100.1, 0.5, 0), 0.00025);
        let ml = &learner.state().multi_level;
        assert!((ml.confidence_calibration.predicted - 0.68).abs() < 1e-12);
        assert!((ml.confidence_calibration.calibration_error - 0.18).abs() < 1e-12);
        let expected = 0.4 * 0.5 + 0.2 * 1.0 + 0.2 * 1.0 + 0.2 * (1.0 - 0.18);
        assert!((ml.composite.avg_score - expected).abs() < 1e-9);
        assert_eq!(ml.composite.trend, -1.0);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut learner = Learner::new(PredictionConfig::default());
        learner.record(&resolved(Direction::Up, 101.0, 0.7, 0), 0.00025);
        learner.reset();
        assert_eq!(learner.state(), &LearningState::default());
        assert_eq!(learner.stats(), &Stats::default());
    }
}
