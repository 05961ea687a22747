use super::signal::Direction;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directional forecast over a fixed horizon.
///
/// Pending until the first tick with `timestamp >= resolve_at` arrives; the
/// outcome fields are then written exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickPrediction {
    pub id: Uuid,
    pub created_at: i64,
    pub entry_price: f64,
    pub horizon_ms: u32,
    pub predicted_direction: Direction,
    pub predicted_magnitude: f64, // fractional, e.g. 0.0015
    pub confidence: f64,          // [0, 1]
    pub resolve_at: i64,
    pub actual_direction: Option<Direction>,
    pub was_correct: Option<bool>,
    pub resolved_at: Option<i64>,
    /// Fractional move observed at resolution.
    pub price_change: Option<f64>,
}

impl TickPrediction {
    pub fn new(
        created_at: i64,
        entry_price: f64,
        horizon_ms: u32,
        predicted_direction: Direction,
        predicted_magnitude: f64,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at,
            entry_price,
            horizon_ms,
            predicted_direction,
            predicted_magnitude,
            confidence,
            resolve_at: created_at.saturating_add(i64::from(horizon_ms)),
            actual_direction: None,
            was_correct: None,
            resolved_at: None,
            price_change: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.was_correct.is_none()
    }

    pub fn is_due(&self, timestamp: i64) -> bool {
        self.is_pending() && timestamp >= self.resolve_at
    }

    /// Write the outcome. A second call is a logic error: it trips a debug
    /// assertion and is ignored in release builds.
    pub fn resolve(&mut self, exit_price: f64, timestamp: i64, dead_zone: f64) -> bool {
        debug_assert!(
            self.was_correct.is_none(),
            "prediction {} resolved twice",
            self.id
        );
        if self.was_correct.is_some() {
            return false;
        }

        let change = (exit_price - self.entry_price) / self.entry_price;
        let actual = Direction::classify(change, dead_zone);
        self.actual_direction = Some(actual);
        self.was_correct = Some(actual == self.predicted_direction);
        self.resolved_at = Some(timestamp);
        self.price_change = Some(change);
        true
    }
}
