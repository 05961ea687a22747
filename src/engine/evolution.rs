use crate::config::EvolutionConfig;
use crate::error::EvolutionError;
use crate::models::evolution::{
    EvolutionState, Genes, LearnedPattern, MarketConditions, OutcomeSample,
};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// Slow-cadence optimizer over the gene vector.
///
/// Fitness is an EMA of confidence-weighted correctness. A generation is
/// triggered every `mutation_interval` outcomes, or earlier when fitness has
/// not set a new epoch high for `stagnation_window` outcomes. Perturbations
/// shrink as generations accumulate (annealing).
pub struct EvolutionEngine {
    config: EvolutionConfig,
    seed_genes: Genes,
    genes: Genes,
    generation: u32,
    fitness_score: f64,
    total_predictions: u64,
    history: VecDeque<OutcomeSample>,
    learned_patterns: VecDeque<LearnedPattern>,
    last_mutation_at: Option<DateTime<Utc>>,
    epoch_best_fitness: f64,
    samples_since_improvement: usize,
    rng: StdRng,
}

impl EvolutionEngine {
    /// Validate the configuration and seed genes. This is the only fallible
    /// entry point; every later call absorbs bad input.
    pub fn init(config: EvolutionConfig, seed_genes: Genes) -> Result<Self, EvolutionError> {
        if !(config.cooling_rate.is_finite() && config.cooling_rate > 0.0) {
            return Err(EvolutionError::InvalidCoolingRate(config.cooling_rate));
        }
        if config.mutation_interval == 0 {
            return Err(EvolutionError::InvalidInterval);
        }
        if !(config.fitness_alpha > 0.0 && config.fitness_alpha <= 1.0) {
            return Err(EvolutionError::InvalidAlpha(config.fitness_alpha));
        }
        if config.history_cap == 0 {
            return Err(EvolutionError::InvalidHistoryCap);
        }
        if !(config.base_perturbation_scale.is_finite() && config.base_perturbation_scale > 0.0) {
            return Err(EvolutionError::InvalidScale(config.base_perturbation_scale));
        }
        seed_genes.validate()?;

        Ok(Self {
            rng: Self::make_rng(config.seed),
            history: VecDeque::with_capacity(config.history_cap),
            learned_patterns: VecDeque::with_capacity(config.pattern_cap),
            config,
            seed_genes,
            genes: seed_genes,
            generation: 0,
            fitness_score: 0.0,
            total_predictions: 0,
            last_mutation_at: None,
            epoch_best_fitness: 0.0,
            samples_since_improvement: 0,
        })
    }

    pub fn with_seed_genes(config: EvolutionConfig) -> Result<Self, EvolutionError> {
        Self::init(config, Genes::seed())
    }

    fn make_rng(seed: Option<u64>) -> StdRng {
        match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        }
    }

    /// Fold one resolved outcome into fitness and, when due, run a generation.
    /// Returns true when this call mutated the genes.
    pub fn process_outcome(&mut self, sample: OutcomeSample) -> bool {
        let confidence = if sample.confidence.is_finite() {
            sample.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let sample = OutcomeSample {
            confidence,
            market_conditions: Some(sample.conditions()),
            ..sample
        };

        if self.history.len() >= self.config.history_cap {
            self.history.pop_front();
        }
        self.history.push_back(sample);
        self.total_predictions += 1;

        let reward = if sample.is_correct() { confidence } else { -confidence };
        let alpha = self.config.fitness_alpha;
        self.fitness_score = (self.fitness_score * (1.0 - alpha) + reward * alpha).clamp(-1.0, 1.0);

        if self.fitness_score > self.epoch_best_fitness + IMPROVEMENT_EPSILON {
            self.epoch_best_fitness = self.fitness_score;
            self.samples_since_improvement = 0;
        } else {
            self.samples_since_improvement += 1;
        }

        let interval_due = self.total_predictions % self.config.mutation_interval == 0;
        let stagnant = self.config.stagnation_window > 0
            && self.samples_since_improvement >= self.config.stagnation_window;

        if interval_due || stagnant {
            self.mutate(if interval_due { "interval" } else { "stagnation" });
            return true;
        }
        false
    }

    fn mutate(&mut self, trigger: &str) {
        self.generation += 1;
        let scale = self.perturbation_scale();
        // Rate is read before the pass so a mutating rate gene cannot affect its own generation.
        let rate = self.genes.mutation_rate.clamp(0.0, 1.0);

        let mut mutated = 0usize;
        for (spec, slot) in self.genes.slots_mut() {
            if !self.rng.gen_bool(rate) {
                continue;
            }
            let sign = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            let delta = sign * self.rng.gen::<f64>() * scale * spec.range();
            *slot = (*slot + delta).clamp(spec.min, spec.max);
            mutated += 1;
            debug!("Gene {} -> {:.4} (delta {:+.4})", spec.name, *slot, delta);
        }

        self.last_mutation_at = Some(Utc::now());
        self.epoch_best_fitness = self.fitness_score;
        self.samples_since_improvement = 0;
        self.record_pattern();

        info!(
            "Evolution generation {} ({trigger}): fitness={:.4} genes_mutated={} scale={:.4}",
            self.generation, self.fitness_score, mutated, scale
        );
    }

    /// `base / (1 + generation * cooling_rate)`.
    pub fn perturbation_scale(&self) -> f64 {
        self.config.base_perturbation_scale
            / (1.0 + f64::from(self.generation) * self.config.cooling_rate)
    }

    fn record_pattern(&mut self) {
        let window = self.config.stagnation_window.max(1).min(self.history.len());
        if window == 0 || self.config.pattern_cap == 0 {
            return;
        }

        let recent = self.history.iter().skip(self.history.len() - window);
        let mut sum = MarketConditions::default();
        let mut correct = 0usize;
        for sample in recent {
            let c = sample.conditions();
            sum.volatility += c.volatility;
            sum.trend += c.trend;
            sum.volume += c.volume;
            if sample.is_correct() {
                correct += 1;
            }
        }
        let n = window as f64;

        if self.learned_patterns.len() >= self.config.pattern_cap {
            self.learned_patterns.pop_front();
        }
        self.learned_patterns.push_back(LearnedPattern {
            generation: self.generation,
            volatility: sum.volatility / n,
            trend: sum.trend / n,
            volume: sum.volume / n,
            accuracy: correct as f64 / n,
            samples: window,
            recorded_at: Utc::now(),
        });
    }

    /// Detached copy of the current state.
    pub fn state(&self) -> EvolutionState {
        EvolutionState {
            generation: self.generation,
            fitness_score: self.fitness_score,
            genes: self.genes,
            learned_patterns: self.learned_patterns.iter().cloned().collect(),
            adaptation_history: self.history.iter().copied().collect(),
            total_predictions: self.total_predictions,
            last_mutation_at: self.last_mutation_at,
        }
    }

    pub fn genes(&self) -> Genes {
        self.genes
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn fitness_score(&self) -> f64 {
        self.fitness_score
    }

    /// Re-seed genes and clear all history. A configured RNG seed is reapplied
    /// so a reset run replays identically.
    pub fn reset(&mut self) {
        self.genes = self.seed_genes;
        self.generation = 0;
        self.fitness_score = 0.0;
        self.total_predictions = 0;
        self.history.clear();
        self.learned_patterns.clear();
        self.last_mutation_at = None;
        self.epoch_best_fitness = 0.0;
        self.samples_since_improvement = 0;
        self.rng = Self::make_rng(self.config.seed);
        info!("Evolution engine reset to seed genes");
    }
}

/// Process-wide handle to one `EvolutionEngine`. Clones share the same engine;
/// every call is serialised by the inner mutex.
#[derive(Clone)]
pub struct SharedEvolution {
    inner: Arc<Mutex<EvolutionEngine>>,
}

impl SharedEvolution {
    pub fn new(engine: EvolutionEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn init(config: EvolutionConfig, seed_genes: Genes) -> Result<Self, EvolutionError> {
        EvolutionEngine::init(config, seed_genes).map(Self::new)
    }

    // Every mutation leaves the engine consistent, so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, EvolutionEngine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn process_outcome(&self, sample: OutcomeSample) -> bool {
        self.lock().process_outcome(sample)
    }

    pub fn state(&self) -> EvolutionState {
        self.lock().state()
    }

    pub fn genes(&self) -> Genes {
        self.lock().genes()
    }

    pub fn reset(&self) {
        self.lock().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::signal::Direction;

    fn seeded_config() -> EvolutionConfig {
        EvolutionConfig {
            seed: Some(7),
            ..EvolutionConfig::default()
        }
    }

    fn sample(correct: bool, confidence: f64) -> OutcomeSample {
        OutcomeSample {
            predicted: Direction::Up,
            actual: if correct { Direction::Up } else { Direction::Down },
            confidence,
            market_conditions: Some(MarketConditions {
                volatility: 0.001,
                trend: 0.5,
                volume: 10.0,
            }),
        }
    }

    #[test]
    fn test_init_rejects_bad_config() {
        let config = EvolutionConfig {
            cooling_rate: 0.0,
            ..EvolutionConfig::default()
        };
        assert_eq!(
            EvolutionEngine::with_seed_genes(config).err(),
            Some(EvolutionError::InvalidCoolingRate(0.0))
        );

        let config = EvolutionConfig {
            mutation_interval: 0,
            ..EvolutionConfig::default()
        };
        assert_eq!(
            EvolutionEngine::with_seed_genes(config).err(),
            Some(EvolutionError::InvalidInterval)
        );

        let genes = Genes {
            mutation_rate: 2.0,
            ..Genes::seed()
        };
        assert!(matches!(
            EvolutionEngine::init(EvolutionConfig::default(), genes),
            Err(EvolutionError::GeneOutOfRange { .. })
        ));
    }

    #[test]
    fn test_fitness_rewards_confident_correct() {
        let mut engine = EvolutionEngine::with_seed_genes(seeded_config()).expect("init");
        engine.process_outcome(sample(true, 0.9));
        assert!((engine.fitness_score() - 0.045).abs() < 1e-12);

        let mut engine = EvolutionEngine::with_seed_genes(seeded_config()).expect("init");
        engine.process_outcome(sample(false, 0.9));
        assert!((engine.fitness_score() + 0.045).abs() < 1e-12);

        let mut engine = EvolutionEngine::with_seed_genes(seeded_config()).expect("init");
        engine.process_outcome(sample(false, 0.2));
        assert!(engine.fitness_score() > -0.045);
    }

    #[test]
    fn test_mutation_on_interval() {
        let config = EvolutionConfig {
            mutation_interval: 10,
            stagnation_window: 1_000,
            ..seeded_config()
        };
        let mut engine = EvolutionEngine::with_seed_genes(config).expect("init");
        for _ in 0..9 {
            assert!(!engine.process_outcome(sample(true, 0.9)));
        }
        assert!(engine.process_outcome(sample(true, 0.9)));
        let state = engine.state();
        assert_eq!(state.generation, 1);
        assert!(state.last_mutation_at.is_some());
        assert_eq!(state.learned_patterns.len(), 1);
        assert!((state.learned_patterns[0].accuracy - 1.0).abs() < 1e-12);
        assert!((state.learned_patterns[0].volume - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_mutation_on_stagnation() {
        let config = EvolutionConfig {
            mutation_interval: 10_000,
            stagnation_window: 5,
            ..seeded_config()
        };
        let mut engine = EvolutionEngine::with_seed_genes(config).expect("init");
        for _ in 0..5 {
            engine.process_outcome(sample(false, 0.9));
        }
        assert_eq!(engine.generation(), 1);
    }

    #[test]
    fn test_history_is_bounded() {
        let config = EvolutionConfig {
            history_cap: 25,
            ..seeded_config()
        };
        let mut engine = EvolutionEngine::with_seed_genes(config).expect("init");
        for i in 0..100 {
            engine.process_outcome(sample(i % 3 == 0, 0.7));
        }
        let state = engine.state();
        assert_eq!(state.adaptation_history.len(), 25);
        assert_eq!(state.total_predictions, 100);
    }

    #[test]
    fn test_genes_stay_in_range() {
        let config = EvolutionConfig {
            mutation_interval: 1,
            base_perturbation_scale: 5.0,
            ..seeded_config()
        };
        let mut engine = EvolutionEngine::init(
            config,
            Genes {
                mutation_rate: 0.5,
                ..Genes::seed()
            },
        )
        .expect("init");
        for i in 0..300 {
            engine.process_outcome(sample(i % 2 == 0, 0.8));
            assert!(engine.genes().validate().is_ok());
        }
        assert_eq!(engine.generation(), 300);
    }

    #[test]
    fn test_cooling_shrinks_scale() {
        let config = EvolutionConfig {
            mutation_interval: 1,
            ..seeded_config()
        };
        let mut engine = EvolutionEngine::with_seed_genes(config).expect("init");
        let initial = engine.perturbation_scale();
        for _ in 0..20 {
            engine.process_outcome(sample(true, 0.5));
        }
        assert!(engine.perturbation_scale() < initial);
        assert!((engine.perturbation_scale() - 0.10 / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_nan_confidence_and_missing_conditions_absorbed() {
        let mut engine = EvolutionEngine::with_seed_genes(seeded_config()).expect("init");
        engine.process_outcome(OutcomeSample {
            predicted: Direction::Flat,
            actual: Direction::Flat,
            confidence: f64::NAN,
            market_conditions: None,
        });
        let state = engine.state();
        assert_eq!(state.fitness_score, 0.0);
        assert_eq!(
            state.adaptation_history[0].market_conditions,
            Some(MarketConditions::default())
        );
    }

    #[test]
    fn test_reset_replays_identically() {
        let config = EvolutionConfig {
            mutation_interval: 5,
            ..seeded_config()
        };
        let mut engine = EvolutionEngine::with_seed_genes(config).expect("init");
        for i in 0..50 {
            engine.process_outcome(sample(i % 2 == 0, 0.9));
        }
        let first = engine.genes();

        engine.reset();
        assert_eq!(engine.genes(), Genes::seed());
        assert_eq!(engine.generation(), 0);
        assert!(engine.state().adaptation_history.is_empty());

        for i in 0..50 {
            engine.process_outcome(sample(i % 2 == 0, 0.9));
        }
        assert_eq!(engine.genes(), first);
    }

    #[tokio::test]
    async fn test_shared_handle_serialises_tasks() {
        let shared = SharedEvolution::init(seeded_config(), Genes::seed()).expect("init");
        let mut handles = Vec::new();
        for t in 0..4 {
            let evo = shared.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..250 {
                    evo.process_outcome(sample((i + t) % 2 == 0, 0.9));
                }
            }));
        }
        for h in handles {
            h.await.expect("task");
        }
        let state = shared.state();
        assert_eq!(state.total_predictions, 1_000);
        assert_eq!(state.adaptation_history.len(), 500);
        assert!(state.generation >= 20);
    }
}
