use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    /// Classify a signed fractional change against a symmetric dead zone.
    pub fn classify(change: f64, dead_zone: f64) -> Self {
        if change > dead_zone {
            Direction::Up
        } else if change < -dead_zone {
            Direction::Down
        } else {
            Direction::Flat
        }
    }

    pub fn is_directional(&self) -> bool {
        !matches!(self, Direction::Flat)
    }

    /// +1 for Up, -1 for Down, 0 for Flat.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
            Direction::Flat => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityState {
    Low,
    #[default]
    Medium,
    High,
}

impl VolatilityState {
    /// Classify a per-tick return standard deviation.
    pub fn from_std_dev(std_dev: f64, low_threshold: f64, high_threshold: f64) -> Self {
        match std_dev {
            x if x < low_threshold => VolatilityState::Low,
            x if x > high_threshold => VolatilityState::High,
            _ => VolatilityState::Medium,
        }
    }
}
