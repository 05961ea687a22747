use super::signal::{Direction, VolatilityState};
use crate::config::PredictionConfig;
use serde::{Deserialize, Serialize};

/// Aggregate outcome counters and self-tuned parameters of one prediction engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningState {
    pub total_predictions: u64,
    pub correct_predictions: u64,
    pub accuracy: f64,
    pub streak: u32,
    pub best_streak: u32,
    pub recent_accuracy: f64,

    pub confidence_multiplier: f64, // [0.5, 2.0]
    pub adaptive_horizon_ms: u32,   // [1000, 60000]
    pub volatility_state: VolatilityState,
    pub momentum_bias: f64,         // [-1, 1]

    pub multi_level: MultiLevelMetrics,
}

impl LearningState {
    pub fn new(config: &PredictionConfig) -> Self {
        Self {
            total_predictions: 0,
            correct_predictions: 0,
            accuracy: 0.0,
            streak: 0,
            best_streak: 0,
            recent_accuracy: 0.0,
            confidence_multiplier: config.initial_confidence_multiplier,
            adaptive_horizon_ms: config.default_horizon_ms,
            volatility_state: VolatilityState::Medium,
            momentum_bias: 0.0,
            multi_level: MultiLevelMetrics::default(),
        }
    }
}

impl Default for LearningState {
    fn default() -> Self {
        Self::new(&PredictionConfig::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiLevelMetrics {
    pub direction: DirectionStats,
    pub magnitude: ScoreAverage,
    pub timing: ScoreAverage,
    pub confidence_calibration: Calibration,
    pub composite: Composite,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionStats {
    pub correct: u64,
    pub total: u64,
    pub accuracy: f64,
}

impl DirectionStats {
    pub fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
        self.accuracy = self.correct as f64 / self.total as f64;
    }
}

/// Running mean of a score in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreAverage {
    pub avg_score: f64,
    pub samples: u64,
}

impl ScoreAverage {
    pub fn record(&mut self, score: f64) {
        self.samples += 1;
        self.avg_score += (score - self.avg_score) / self.samples as f64;
        self.avg_score = self.avg_score.clamp(0.0, 1.0);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub predicted: f64,         // EMA of stated confidence
    pub actual: f64,            // recent accuracy
    pub calibration_error: f64, // predicted - actual; positive = overconfident
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Composite {
    pub avg_score: f64,
    pub trend: f64, // -1, 0 or 1
}

/// Accuracy broken down by the direction that was predicted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub up: DirectionStats,
    pub down: DirectionStats,
    pub flat: DirectionStats,
    pub overall: DirectionStats,
}

impl Stats {
    pub fn record(&mut self, predicted: Direction, correct: bool) {
        match predicted {
            Direction::Up => self.up.record(correct),
            Direction::Down => self.down.record(correct),
            Direction::Flat => self.flat.record(correct),
        }
        self.overall.record(correct);
    }

    pub fn for_direction(&self, direction: Direction) -> &DirectionStats {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
            Direction::Flat => &self.flat,
        }
    }
}

/// Engine warm-up phase, derived from how many ticks are buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnginePhase {
    Empty,
    Warming,
    Active,
}
