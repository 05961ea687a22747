use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub features: FeatureConfig,
    pub prediction: PredictionConfig,
    pub evolution: EvolutionConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub buffer_capacity: usize,       // Rolling tick history (e.g. 500)
    pub momentum_lookback: usize,     // K ticks for momentum (e.g. 20)
    pub volatility_window: usize,     // Ticks for return std dev (e.g. 50)
    pub vol_low_threshold: f64,       // Std dev below this = Low (e.g. 0.0005 = 0.05%)
    pub vol_high_threshold: f64,      // Std dev above this = High (e.g. 0.002 = 0.2%)
    pub allow_equal_timestamps: bool, // Accept repeated ms timestamps; off = strictly increasing
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    pub archive_capacity: usize,      // Resolved predictions kept (e.g. 20)
    pub recent_window: usize,         // Outcomes in recentAccuracy (e.g. 20)
    pub default_horizon_ms: u32,      // Starting adaptive horizon (e.g. 5000)
    pub min_horizon_ms: u32,
    pub max_horizon_ms: u32,
    pub initial_confidence_multiplier: f64,
    pub min_confidence_multiplier: f64,
    pub max_confidence_multiplier: f64,
    pub adapt_step: f64,              // Relative step per resolution (e.g. 0.02)
    pub momentum_bias_step: f64,      // Bias pull per resolution (e.g. 0.02)
    pub confidence_ema_alpha: f64,    // EMA factor for predicted confidence (e.g. 0.1)
    pub calibration_tolerance: f64,   // |error| below this counts as calibrated (e.g. 0.05)
    pub overconfidence_threshold: f64, // error above this shrinks the multiplier (e.g. 0.15)
    pub high_accuracy_threshold: f64, // recentAccuracy needed to grow the multiplier (e.g. 0.6)
    pub composite_weights: CompositeWeights,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeWeights {
    pub direction: f64,
    pub magnitude: f64,
    pub timing: f64,
    pub calibration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    pub fitness_alpha: f64,           // EMA factor for fitness (e.g. 0.05)
    pub mutation_interval: u64,       // Mutate every N outcomes (e.g. 50)
    pub stagnation_window: usize,     // Non-improving samples before mutating (e.g. 20)
    pub base_perturbation_scale: f64, // Fraction of gene range at generation 0 (e.g. 0.10)
    pub cooling_rate: f64,            // Annealing cooldown per generation (e.g. 0.05)
    pub history_cap: usize,           // adaptation_history bound (e.g. 500)
    pub pattern_cap: usize,           // learned_patterns bound (e.g. 50)
    pub seed: Option<u64>,            // Deterministic RNG when set
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub latency_samples: usize,
    pub summary_interval_secs: u64,
    pub symbols: Vec<String>,
    pub run_secs: Option<u64>,
    pub tick_interval_ms: u64,
    pub prediction_interval_ms: u64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 500,
            momentum_lookback: 20,
            volatility_window: 50,
            vol_low_threshold: 0.0005,
            vol_high_threshold: 0.002,
            allow_equal_timestamps: false,
        }
    }
}

impl FeatureConfig {
    /// Half the low-volatility boundary; moves inside it count as flat.
    pub fn dead_zone(&self) -> f64 {
        self.vol_low_threshold / 2.0
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            archive_capacity: 20,
            recent_window: 20,
            default_horizon_ms: 5_000,
            min_horizon_ms: 1_000,
            max_horizon_ms: 60_000,
            initial_confidence_multiplier: 1.0,
            min_confidence_multiplier: 0.5,
            max_confidence_multiplier: 2.0,
            adapt_step: 0.02,
            momentum_bias_step: 0.02,
            confidence_ema_alpha: 0.1,
            calibration_tolerance: 0.05,
            overconfidence_threshold: 0.15,
            high_accuracy_threshold: 0.6,
            composite_weights: CompositeWeights::default(),
        }
    }
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            direction: 0.4,
            magnitude: 0.2,
            timing: 0.2,
            calibration: 0.2,
        }
    }
}

impl CompositeWeights {
    pub fn total(&self) -> f64 {
        self.direction + self.magnitude + self.timing + self.calibration
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            fitness_alpha: 0.05,
            mutation_interval: 50,
            stagnation_window: 20,
            base_perturbation_scale: 0.10,
            cooling_rate: 0.05,
            history_cap: 500,
            pattern_cap: 50,
            seed: None,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            latency_samples: 1000,
            summary_interval_secs: 10,
            symbols: vec!["BTCUSDT".into(), "ETHUSDT".into()],
            run_secs: None,
            tick_interval_ms: 250,
            prediction_interval_ms: 2_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables (.env file) with defaults.
    ///
    /// Optional env vars:
    ///   TICKCAST_DEFAULT_HORIZON_MS: starting adaptive horizon
    ///   TICKCAST_MOMENTUM_LOOKBACK: K ticks used for momentum
    ///   TICKCAST_MUTATION_INTERVAL: outcomes between forced mutations
    ///   TICKCAST_EVOLUTION_SEED: fixed RNG seed for reproducible runs
    ///   TICKCAST_SYMBOLS: comma-separated symbols for the demo host
    ///   TICKCAST_RUN_SECS: stop the demo host after N seconds
    ///   RUST_LOG: log level (default: info)
    pub fn load_or_default() -> Self {
        let _ = dotenv::dotenv();

        let mut config = Self::default();

        if let Some(horizon) = env_parse::<u32>("TICKCAST_DEFAULT_HORIZON_MS") {
            config.prediction.default_horizon_ms = horizon;
        }

        if let Some(lookback) = env_parse::<usize>("TICKCAST_MOMENTUM_LOOKBACK") {
            config.features.momentum_lookback = lookback;
        }

        if let Some(interval) = env_parse::<u64>("TICKCAST_MUTATION_INTERVAL") {
            config.evolution.mutation_interval = interval;
        }

        if let Some(seed) = env_parse::<u64>("TICKCAST_EVOLUTION_SEED") {
            config.evolution.seed = Some(seed);
        }

        if let Ok(symbols) = std::env::var("TICKCAST_SYMBOLS") {
            let parsed: Vec<String> = symbols
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.telemetry.symbols = parsed;
            }
        }

        config.telemetry.run_secs = env_parse::<u64>("TICKCAST_RUN_SECS");

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.telemetry.log_level = level;
        }

        config
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let f = &self.features;
        anyhow::ensure!(f.buffer_capacity >= 2, "buffer_capacity must be at least 2");
        anyhow::ensure!(f.momentum_lookback >= 1, "momentum_lookback must be at least 1");
        anyhow::ensure!(f.volatility_window >= 2, "volatility_window must be at least 2");
        anyhow::ensure!(
            f.vol_low_threshold > 0.0 && f.vol_low_threshold < f.vol_high_threshold,
            "volatility thresholds must satisfy 0 < low < high"
        );

        let p = &self.prediction;
        anyhow::ensure!(p.archive_capacity >= 1, "archive_capacity must be at least 1");
        anyhow::ensure!(p.recent_window >= 1, "recent_window must be at least 1");
        anyhow::ensure!(
            p.min_horizon_ms > 0 && p.min_horizon_ms <= p.max_horizon_ms,
            "horizon bounds must satisfy 0 < min <= max"
        );
        anyhow::ensure!(
            (p.min_horizon_ms..=p.max_horizon_ms).contains(&p.default_horizon_ms),
            "default_horizon_ms {} outside [{}, {}]",
            p.default_horizon_ms,
            p.min_horizon_ms,
            p.max_horizon_ms
        );
        anyhow::ensure!(
            p.min_confidence_multiplier > 0.0
                && p.min_confidence_multiplier <= p.initial_confidence_multiplier
                && p.initial_confidence_multiplier <= p.max_confidence_multiplier,
            "confidence multiplier must satisfy 0 < min <= initial <= max"
        );
        anyhow::ensure!(
            p.adapt_step > 0.0 && p.adapt_step < 1.0,
            "adapt_step must be in (0, 1)"
        );
        anyhow::ensure!(
            p.momentum_bias_step > 0.0 && p.momentum_bias_step < 1.0,
            "momentum_bias_step must be in (0, 1)"
        );
        anyhow::ensure!(
            p.confidence_ema_alpha > 0.0 && p.confidence_ema_alpha <= 1.0,
            "confidence_ema_alpha must be in (0, 1]"
        );
        let total = p.composite_weights.total();
        anyhow::ensure!(
            (total - 1.0).abs() < 0.01,
            "Composite weights must sum to 1.0, got {total}"
        );

        let e = &self.evolution;
        anyhow::ensure!(e.cooling_rate > 0.0, "cooling_rate must be positive");
        anyhow::ensure!(e.mutation_interval >= 1, "mutation_interval must be at least 1");
        anyhow::ensure!(
            e.fitness_alpha > 0.0 && e.fitness_alpha <= 1.0,
            "fitness_alpha must be in (0, 1]"
        );
        anyhow::ensure!(e.history_cap >= 1, "history_cap must be at least 1");

        anyhow::ensure!(
            !self.telemetry.symbols.is_empty(),
            "at least one symbol is required"
        );
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
