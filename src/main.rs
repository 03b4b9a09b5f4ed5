use dotenv::dotenv;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pickbot::config::Settings;
use pickbot::infra::LoggingObserver;
use pickbot::planners::rl::{EnvConfig, QLearningConfig, QLearningPolicy, TrainConfig, Trainer, WarehouseEnv};
use pickbot::simulation::{Simulation, SimulationConfig};
use pickbot::state::{FacilityBuilder, OrderGenerator};

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pickbot=debug,info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging()?;

    let settings = Settings::from_env();
    info!("Settings: {:?}", settings);

    let builder = FacilityBuilder::default()
        .with_seed(settings.seed)
        .with_robots(settings.robots)
        .with_obstacles(settings.obstacles);
    let world = builder.build_world();

    let policy = if settings.use_rl {
        let mut policy = QLearningPolicy::new(QLearningConfig::default(), settings.seed);
        let mut env = WarehouseEnv::new(
            world.clone(),
            OrderGenerator::new(settings.seed),
            EnvConfig {
                max_steps: settings.max_steps,
                orders_per_episode: settings.orders_per_episode,
            },
        );
        Trainer::new(TrainConfig {
            episodes: settings.episodes,
            metrics_dir: settings.metrics_dir.clone(),
            ..TrainConfig::default()
        })
        .train(&mut env, &mut policy);

        if let Err(e) = policy.save_q_tables(&settings.qtable_path) {
            warn!("Error saving Q-tables: {}", e);
        }
        if settings.load_qtables
            && let Err(e) = policy.load_q_tables(&settings.qtable_path)
        {
            warn!("Error loading Q-tables: {}", e);
        }
        Some(policy)
    } else {
        None
    };

    let mut simulation = Simulation::new(
        world,
        OrderGenerator::new(settings.seed.wrapping_add(1)),
        SimulationConfig::default(),
    )
    .with_observer(Box::new(LoggingObserver));
    if let Some(policy) = policy {
        simulation = simulation.with_policy(policy);
    }

    let summary = simulation.run(settings.run_ticks);
    info!(
        "Done: {}/{} orders completed, {} collisions",
        summary.orders_completed, summary.orders_submitted, summary.collisions
    );

    Ok(())
}
