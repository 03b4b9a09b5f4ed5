//! Episodic Q-learning loop

use std::path::PathBuf;

use tracing::{info, warn};

use super::env::WarehouseEnv;
use super::metrics::{CsvLogger, EpisodeStats, TrainingMetrics};
use super::policy::QLearningPolicy;

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Number of training episodes
    pub episodes: usize,
    /// Console log frequency (episodes)
    pub log_every: usize,
    /// Episodes averaged in the final summary
    pub summary_window: usize,
    /// CSV metrics directory, if any
    pub metrics_dir: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            episodes: 100,
            log_every: 10,
            summary_window: 10,
            metrics_dir: None,
        }
    }
}

pub struct Trainer {
    config: TrainConfig,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn train(&self, env: &mut WarehouseEnv, policy: &mut QLearningPolicy) -> TrainingMetrics {
        let episodes = self.config.episodes;
        let orders_target = env.config().orders_per_episode;
        info!(
            "Starting training for {} episodes with {} orders per episode",
            episodes, orders_target
        );

        let mut metrics = TrainingMetrics::new(self.config.summary_window);
        let mut logger = self.config.metrics_dir.as_ref().and_then(|dir| {
            CsvLogger::new(dir)
                .map_err(|e| warn!("Metrics disabled, cannot create {}: {}", dir.display(), e))
                .ok()
        });

        for episode in 0..episodes {
            let mut stats = self.run_episode(env, policy, episode);
            policy.update_learning_parameters(episode, episodes);
            stats.epsilon = policy.epsilon();
            metrics.record_episode(&stats);

            if episode == 0 || (self.config.log_every > 0 && (episode + 1) % self.config.log_every == 0) {
                metrics.log_episode(&stats, episodes);
            }
            if let Some(csv) = logger.as_mut()
                && let Err(e) = csv.log_episode(&stats)
            {
                warn!("Failed to write metrics to {}: {}", csv.log_dir().display(), e);
            }
        }

        metrics.log_summary(orders_target, policy.epsilon());
        metrics
    }

    /// Reset the environment and step it until done or out of steps.
    pub fn run_episode(
        &self,
        env: &mut WarehouseEnv,
        policy: &mut QLearningPolicy,
        episode: usize,
    ) -> EpisodeStats {
        env.reset();
        let mut stats = EpisodeStats {
            episode,
            orders_target: env.config().orders_per_episode,
            ..EpisodeStats::default()
        };

        for _ in 0..env.config().max_steps {
            let result = env.step(policy);
            stats.steps += 1;
            stats.total_reward += result.reward;
            stats.collisions += result.collisions;
            stats.items_collected += result.items_collected;
            stats.orders_completed += result.orders_completed;

            if result.done {
                info!(
                    "Episode {}: {} of {} orders completed in {} steps",
                    episode + 1,
                    stats.orders_completed,
                    stats.orders_target,
                    stats.steps
                );
                break;
            }
            if result.truncated {
                break;
            }
        }

        stats.robot_rewards = env.world().robots.iter().map(|r| (r.id, r.reward)).collect();
        stats
    }
}
