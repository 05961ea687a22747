use tickcast::config::Config;
use tickcast::engine::{PredictionEngine, SessionSnapshot, SharedEvolution};
use tickcast::feeds::{RandomWalkSource, TickSource};
use tickcast::models::evolution::{Genes, OutcomeSample};
use tickcast::telemetry::latency::{
    LatencyTracker, OP_GENERATE_PREDICTION, OP_PROCESS_OUTCOME, OP_PROCESS_TICK,
};
use tickcast::telemetry::scoreboard::AccuracyScoreboard;

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("================================================");
    info!("  TICKCAST v{}", env!("CARGO_PKG_VERSION"));
    info!("  Adaptive tick-horizon forecaster");
    info!("================================================");

    let config = Config::load_or_default();
    config.validate()?;

    info!("--- Prediction configuration ---");
    info!("  Symbols:          {:?}", config.telemetry.symbols);
    info!("  Default horizon:  {}ms", config.prediction.default_horizon_ms);
    info!("  Momentum K:       {}", config.features.momentum_lookback);
    info!("  Dead zone:        {:.4}%", config.features.dead_zone() * 100.0);
    info!("--- Evolution configuration ---");
    info!("  Mutation every:   {} outcomes", config.evolution.mutation_interval);
    info!("  Stagnation:       {} outcomes", config.evolution.stagnation_window);
    info!("  Seed:             {:?}", config.evolution.seed);

    // Process-wide optimizer; construction is the only fatal failure point.
    let evolution = SharedEvolution::init(config.evolution.clone(), Genes::seed())?;

    let latency = Arc::new(LatencyTracker::new(config.telemetry.latency_samples));
    let scoreboard = Arc::new(AccuracyScoreboard::new());
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let start_ms = chrono::Utc::now().timestamp_millis();
    let mut tasks = Vec::new();

    // === One engine per symbol, each owned by its own task ===
    for (idx, symbol) in config.telemetry.symbols.iter().enumerate() {
        let symbol = symbol.clone();
        let mut engine = PredictionEngine::from_config(symbol.clone(), &config);
        let mut source = RandomWalkSource::new(
            100.0 * (idx as f64 + 1.0),
            start_ms,
            config.telemetry.tick_interval_ms as i64,
            config.evolution.seed.unwrap_or(0).wrapping_add(idx as u64),
        )
        .with_drift(0.000_02)
        .with_volatility(0.0008);

        let evolution = evolution.clone();
        let latency = latency.clone();
        let scoreboard = scoreboard.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        let tick_every = Duration::from_millis(config.telemetry.tick_interval_ms);
        let predict_every = Duration::from_millis(config.telemetry.prediction_interval_ms);

        tasks.push(tokio::spawn(async move {
            let mut tick_interval = tokio::time::interval(tick_every);
            let mut predict_interval = tokio::time::interval(predict_every);

            loop {
                tokio::select! {
                    _ = tick_interval.tick() => {
                        let Some(tick) = source.next_tick() else {
                            warn!("[{symbol}] Tick source exhausted");
                            break;
                        };
                        let resolved = latency.time(OP_PROCESS_TICK, || engine.process_tick(tick));
                        if resolved.is_empty() {
                            continue;
                        }
                        let conditions = engine.market_conditions();
                        for prediction in &resolved {
                            scoreboard.record(&symbol, prediction);
                            if let Some(sample) = OutcomeSample::from_prediction(prediction, conditions) {
                                latency.time(OP_PROCESS_OUTCOME, || evolution.process_outcome(sample));
                            }
                        }
                    }
                    _ = predict_interval.tick() => {
                        let prediction = latency.time(OP_GENERATE_PREDICTION, || engine.generate_prediction(None));
                        if let Some(p) = prediction {
                            debug!(
                                "[{symbol}] {:?} conf={:.2} horizon={}ms phase={:?}",
                                p.predicted_direction, p.confidence, p.horizon_ms, engine.phase()
                            );
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }

            let snapshot = SessionSnapshot::capture(&engine, None);
            match snapshot.to_json() {
                Ok(json) => debug!("[{symbol}] Final snapshot: {json}"),
                Err(e) => error!("[{symbol}] Snapshot serialization failed: {e}"),
            }
            info!(
                "[{symbol}] Stopped: ticks={} rejected={} resolved={} accuracy={:.1}% best_streak={}",
                engine.tick_count(),
                engine.rejected_ticks(),
                engine.state().total_predictions,
                engine.state().accuracy * 100.0,
                engine.state().best_streak,
            );
        }));
    }

    // === Periodic summary ===
    {
        let evolution = evolution.clone();
        let latency = latency.clone();
        let scoreboard = scoreboard.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        let every = Duration::from_secs(config.telemetry.summary_interval_secs.max(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        scoreboard.log_summary(Some(&evolution.state()));
                        latency.log_summary();
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });
    }

    info!("Running. Press Ctrl+C to shutdown.");
    match config.telemetry.run_secs {
        Some(secs) => {
            tokio::select! {
                result = tokio::signal::ctrl_c() => result?,
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    info!("Run time of {secs}s elapsed");
                }
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }

    info!("Shutdown signal received. Cleaning up...");
    let _ = shutdown_tx.send(());
    for task in tasks {
        if let Err(e) = task.await {
            error!("Symbol task failed: {e}");
        }
    }

    scoreboard.log_summary(Some(&evolution.state()));
    latency.log_summary();

    info!("TICKCAST shutdown complete.");
    Ok(())
}
