//! Turn driver binary for the Saga narrative progression engine.
//!
//! Loads configuration and a forest snapshot, wires the built-in condition
//! evaluator and effect executor into a scheduler, and advances turns until
//! the story ends or the turn budget runs out.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `saga-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Load the forest file
//! 4. Build the scheduler and initialize the forest
//! 5. Run the turn loop
//! 6. Log the result

mod driver;
mod error;
mod forest_file;

use std::path::Path;

use saga_core::Scheduler;
use saga_core::config::{LoggingConfig, SagaConfig};
use saga_core::evaluator::StateConditionEvaluator;
use saga_core::executor::StateEffectExecutor;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::driver::{Autoplay, NotificationLogger, TurnCallback};
use crate::error::EngineError;

/// Application entry point for the turn driver.
///
/// # Errors
///
/// Returns an error if configuration, logging, or the forest file cannot
/// be loaded.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!("saga-engine starting");
    info!(
        forest_path = %config.run.forest_path.display(),
        policy = ?config.engine.auto_branch_policy,
        seed = config.engine.seed,
        max_turns = config.run.max_turns,
        turn_interval_ms = config.run.turn_interval_ms,
        "Configuration loaded"
    );

    // 3. Load the forest.
    let trees = forest_file::load(&config.run.forest_path).map_err(EngineError::from)?;
    info!(trees = trees.len(), "Forest file loaded");

    // 4. Build the scheduler.
    let mut scheduler = Scheduler::new(
        Box::new(StateConditionEvaluator::new()),
        Box::new(StateEffectExecutor::new()),
        &config.engine,
    );
    scheduler.initialize_forest(trees, config.run.start_turn);

    // 5. Run the story.
    let mut logger = NotificationLogger::default();
    let mut autoplay = Autoplay::default();
    let callback: &mut dyn TurnCallback = if config.run.autoplay {
        info!("Autoplay enabled");
        &mut autoplay
    } else {
        &mut logger
    };
    let result = driver::run_story(&mut scheduler, &config.run, callback).await;

    // 6. Log results.
    driver::log_story_end(&result, &scheduler);
    if config.run.autoplay {
        info!(
            tasks_completed = autoplay.tasks_completed,
            choices_made = autoplay.choices_made,
            "Autoplay finished"
        );
    }
    info!(
        end_reason = ?result.end_reason,
        total_turns = result.total_turns,
        notifications = logger.logged.saturating_add(autoplay.logger.logged),
        "saga-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from `saga-config.yaml` in the working directory.
fn load_config() -> Result<SagaConfig, EngineError> {
    let config_path = Path::new("saga-config.yaml");
    if config_path.exists() {
        Ok(SagaConfig::from_file(config_path)?)
    } else {
        // Still applies environment overrides.
        Ok(SagaConfig::parse("")?)
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| EngineError::Logging {
        message: format!("{e}"),
    })
}
