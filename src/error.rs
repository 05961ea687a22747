use thiserror::Error;

/// Reasons a tick is dropped at the engine boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TickRejection {
    #[error("price is not finite: {0}")]
    NonFinitePrice(f64),
    #[error("price must be positive, got {0}")]
    NonPositivePrice(f64),
    #[error("volume must be finite and non-negative, got {0}")]
    InvalidVolume(f64),
    #[error("tick at {got}ms is older than last accepted tick at {last}ms")]
    OutOfOrder { last: i64, got: i64 },
    #[error("duplicate timestamp {0}ms")]
    DuplicateTimestamp(i64),
}

/// Construction-time failures of the evolution engine and its gene vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvolutionError {
    #[error("unknown gene key: {0}")]
    UnknownGene(String),
    #[error("missing gene key: {0}")]
    MissingGene(&'static str),
    #[error("gene {name} = {value} outside [{min}, {max}]")]
    GeneOutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("cooling rate must be positive and finite, got {0}")]
    InvalidCoolingRate(f64),
    #[error("mutation interval must be at least 1")]
    InvalidInterval,
    #[error("fitness alpha must be in (0, 1], got {0}")]
    InvalidAlpha(f64),
    #[error("history cap must be at least 1")]
    InvalidHistoryCap,
    #[error("perturbation scale must be positive and finite, got {0}")]
    InvalidScale(f64),
}
