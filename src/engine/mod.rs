pub mod evolution;
pub mod learner;
pub mod prediction;
pub mod snapshot;

pub use evolution::{EvolutionEngine, SharedEvolution};
pub use prediction::PredictionEngine;
pub use snapshot::SessionSnapshot;
