use super::prediction::TickPrediction;
use super::signal::Direction;
use crate::error::EvolutionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name, allowed range and seed value of one gene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneSpec {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub seed: f64,
}

impl GeneSpec {
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

pub static GENE_SPECS: [GeneSpec; 6] = [
    GeneSpec { name: "momentum_weight", min: 0.0, max: 2.0, seed: 1.0 },
    GeneSpec { name: "confidence_decay", min: 0.5, max: 1.0, seed: 0.95 },
    GeneSpec { name: "mutation_rate", min: 0.01, max: 0.5, seed: 0.10 },
    GeneSpec { name: "volatility_sensitivity", min: 0.0, max: 2.0, seed: 1.0 },
    GeneSpec { name: "horizon_scale", min: 0.25, max: 4.0, seed: 1.0 },
    GeneSpec { name: "exploration_bias", min: 0.0, max: 1.0, seed: 0.10 },
];

/// Fixed-key gene vector. Serialises as a name to value map; deserialising
/// goes through `from_map`, so unknown, missing or out-of-range genes fail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct Genes {
    pub momentum_weight: f64,
    pub confidence_decay: f64,
    pub mutation_rate: f64,
    pub volatility_sensitivity: f64,
    pub horizon_scale: f64,
    pub exploration_bias: f64,
}

impl TryFrom<BTreeMap<String, f64>> for Genes {
    type Error = EvolutionError;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        Self::from_map(&map)
    }
}

impl From<Genes> for BTreeMap<String, f64> {
    fn from(genes: Genes) -> Self {
        genes.to_map()
    }
}

impl Default for Genes {
    fn default() -> Self {
        Self::seed()
    }
}

impl Genes {
    pub fn seed() -> Self {
        Self {
            momentum_weight: GENE_SPECS[0].seed,
            confidence_decay: GENE_SPECS[1].seed,
            mutation_rate: GENE_SPECS[2].seed,
            volatility_sensitivity: GENE_SPECS[3].seed,
            horizon_scale: GENE_SPECS[4].seed,
            exploration_bias: GENE_SPECS[5].seed,
        }
    }

    /// Build from a dynamic map. Every known key is required and no other key is allowed.
    pub fn from_map(map: &BTreeMap<String, f64>) -> Result<Self, EvolutionError> {
        if let Some(unknown) = map
            .keys()
            .find(|k| !GENE_SPECS.iter().any(|s| s.name == k.as_str()))
        {
            return Err(EvolutionError::UnknownGene(unknown.clone()));
        }

        let mut genes = Self::seed();
        for (spec, slot) in genes.slots_mut() {
            *slot = *map
                .get(spec.name)
                .ok_or(EvolutionError::MissingGene(spec.name))?;
        }
        genes.validate()?;
        Ok(genes)
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.values()
            .into_iter()
            .map(|(spec, v)| (spec.name.to_string(), v))
            .collect()
    }

    pub fn validate(&self) -> Result<(), EvolutionError> {
        for (spec, value) in self.values() {
            if !value.is_finite() || value < spec.min || value > spec.max {
                return Err(EvolutionError::GeneOutOfRange {
                    name: spec.name,
                    value,
                    min: spec.min,
                    max: spec.max,
                });
            }
        }
        Ok(())
    }

    pub fn values(&self) -> [(&'static GeneSpec, f64); 6] {
        [
            (&GENE_SPECS[0], self.momentum_weight),
            (&GENE_SPECS[1], self.confidence_decay),
            (&GENE_SPECS[2], self.mutation_rate),
            (&GENE_SPECS[3], self.volatility_sensitivity),
            (&GENE_SPECS[4], self.horizon_scale),
            (&GENE_SPECS[5], self.exploration_bias),
        ]
    }

    pub(crate) fn slots_mut(&mut self) -> [(&'static GeneSpec, &mut f64); 6] {
        [
            (&GENE_SPECS[0], &mut self.momentum_weight),
            (&GENE_SPECS[1], &mut self.confidence_decay),
            (&GENE_SPECS[2], &mut self.mutation_rate),
            (&GENE_SPECS[3], &mut self.volatility_sensitivity),
            (&GENE_SPECS[4], &mut self.horizon_scale),
            (&GENE_SPECS[5], &mut self.exploration_bias),
        ]
    }
}

/// Market context attached to an outcome. Missing or non-finite fields read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConditions {
    pub volatility: f64,
    pub trend: f64,
    pub volume: f64,
}

impl MarketConditions {
    pub fn sanitized(&self) -> Self {
        let clean = |x: f64| if x.is_finite() { x } else { 0.0 };
        Self {
            volatility: clean(self.volatility),
            trend: clean(self.trend),
            volume: clean(self.volume),
        }
    }
}

/// One resolved outcome handed to the evolution engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSample {
    pub predicted: Direction,
    pub actual: Direction,
    pub confidence: f64,
    #[serde(default)]
    pub market_conditions: Option<MarketConditions>,
}

impl OutcomeSample {
    /// Bridge from a resolved prediction. Returns None while it is still pending.
    pub fn from_prediction(
        prediction: &TickPrediction,
        conditions: MarketConditions,
    ) -> Option<Self> {
        Some(Self {
            predicted: prediction.predicted_direction,
            actual: prediction.actual_direction?,
            confidence: prediction.confidence,
            market_conditions: Some(conditions),
        })
    }

    pub fn is_correct(&self) -> bool {
        self.predicted == self.actual
    }

    pub fn conditions(&self) -> MarketConditions {
        self.market_conditions.unwrap_or_default().sanitized()
    }
}

/// Summary of the market conditions seen around a mutation. Informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub generation: u32,
    pub volatility: f64,
    pub trend: f64,
    pub volume: f64,
    pub accuracy: f64,
    pub samples: usize,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionState {
    pub generation: u32,
    pub fitness_score: f64,
    pub genes: Genes,
    pub learned_patterns: Vec<LearnedPattern>,
    pub adaptation_history: Vec<OutcomeSample>,
    pub total_predictions: u64,
    pub last_mutation_at: Option<DateTime<Utc>>,
}
