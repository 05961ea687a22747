use crate::engine::prediction::PredictionEngine;
use crate::models::evolution::EvolutionState;
use crate::models::learning::{LearningState, Stats};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Versioned, opaque state blob handed to external persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u32,
    pub symbol: String,
    pub taken_at: DateTime<Utc>,
    pub tick_count: u64,
    pub learning: LearningState,
    pub stats: Stats,
    pub evolution: Option<EvolutionState>,
}

impl SessionSnapshot {
    pub fn capture(engine: &PredictionEngine, evolution: Option<EvolutionState>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            symbol: engine.symbol().to_string(),
            taken_at: Utc::now(),
            tick_count: engine.tick_count(),
            learning: engine.state().clone(),
            stats: engine.stats(),
            evolution,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        anyhow::ensure!(
            snapshot.version == SNAPSHOT_VERSION,
            "Unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
            snapshot.version
        );
        Ok(snapshot)
    }
}
