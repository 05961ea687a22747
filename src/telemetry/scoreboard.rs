use crate::models::evolution::EvolutionState;
use crate::models::learning::{DirectionStats, Stats};
use crate::models::prediction::TickPrediction;
use crate::models::signal::Direction;
use dashmap::DashMap;
use tracing::info;

/// Cross-symbol tally of resolved predictions for periodic log summaries.
pub struct AccuracyScoreboard {
    per_symbol: DashMap<String, Stats>,
}

impl AccuracyScoreboard {
    pub fn new() -> Self {
        Self {
            per_symbol: DashMap::new(),
        }
    }

    pub fn record(&self, symbol: &str, prediction: &TickPrediction) {
        let Some(correct) = prediction.was_correct else {
            return;
        };
        self.per_symbol
            .entry(symbol.to_string())
            .or_default()
            .record(prediction.predicted_direction, correct);
    }

    pub fn symbol_stats(&self, symbol: &str) -> Option<Stats> {
        self.per_symbol.get(symbol).map(|s| *s)
    }

    /// Aggregate across every symbol.
    pub fn overall(&self) -> DirectionStats {
        let mut total = DirectionStats::default();
        for entry in self.per_symbol.iter() {
            total.correct += entry.overall.correct;
            total.total += entry.overall.total;
        }
        if total.total > 0 {
            total.accuracy = total.correct as f64 / total.total as f64;
        }
        total
    }

    pub fn log_summary(&self, evolution: Option<&EvolutionState>) {
        let overall = self.overall();
        info!(
            "=== ACCURACY SUMMARY === resolved={} correct={} accuracy={:.1}%",
            overall.total,
            overall.correct,
            overall.accuracy * 100.0,
        );

        for entry in self.per_symbol.iter() {
            let breakdown: Vec<String> = [Direction::Up, Direction::Down, Direction::Flat]
                .into_iter()
                .map(|d| {
                    let s = entry.for_direction(d);
                    format!("{d:?} {}/{} ({:.1}%)", s.correct, s.total, s.accuracy * 100.0)
                })
                .collect();
            info!("  {}: {}", entry.key(), breakdown.join(", "));
        }

        if let Some(evo) = evolution {
            info!(
                "  Evolution: generation={} fitness={:.4} outcomes={} patterns={}",
                evo.generation,
                evo.fitness_score,
                evo.total_predictions,
                evo.learned_patterns.len(),
            );
        }
    }
}

impl Default for AccuracyScoreboard {
    fn default() -> Self {
        Self::new()
    }
}
