//! Training metrics and CSV logging

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::state::RobotId;

/// Moving average calculator
#[derive(Debug, Clone)]
pub struct MovingAverage {
    values: VecDeque<f64>,
    window_size: usize,
    sum: f64,
}

impl MovingAverage {
    pub fn new(window_size: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(window_size),
            window_size,
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() >= self.window_size
            && let Some(old) = self.values.pop_front()
        {
            self.sum -= old;
        }
        self.values.push_back(value);
        self.sum += value;
    }

    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What happened during one training episode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeStats {
    pub episode: usize,
    pub steps: usize,
    pub total_reward: f64,
    pub collisions: usize,
    pub items_collected: usize,
    pub orders_completed: usize,
    pub orders_target: usize,
    /// Exploration rate after the episode's schedule update
    pub epsilon: f64,
    pub robot_rewards: Vec<(RobotId, f64)>,
}

/// Training metrics tracker
#[derive(Debug)]
pub struct TrainingMetrics {
    /// Per-episode history
    pub rewards: Vec<f64>,
    pub collisions: Vec<usize>,
    pub items_collected: Vec<usize>,
    pub orders_completed: Vec<usize>,
    /// Windowed averages for the summary
    pub recent_rewards: MovingAverage,
    pub recent_collisions: MovingAverage,
    pub recent_orders: MovingAverage,
    pub total_steps: usize,
    start_time: Instant,
}

impl TrainingMetrics {
    pub fn new(window_size: usize) -> Self {
        Self {
            rewards: Vec::new(),
            collisions: Vec::new(),
            items_collected: Vec::new(),
            orders_completed: Vec::new(),
            recent_rewards: MovingAverage::new(window_size),
            recent_collisions: MovingAverage::new(window_size),
            recent_orders: MovingAverage::new(window_size),
            total_steps: 0,
            start_time: Instant::now(),
        }
    }

    pub fn record_episode(&mut self, stats: &EpisodeStats) {
        self.rewards.push(stats.total_reward);
        self.collisions.push(stats.collisions);
        self.items_collected.push(stats.items_collected);
        self.orders_completed.push(stats.orders_completed);
        self.recent_rewards.push(stats.total_reward);
        self.recent_collisions.push(stats.collisions as f64);
        self.recent_orders.push(stats.orders_completed as f64);
        self.total_steps += stats.steps;
    }

    pub fn episodes(&self) -> usize {
        self.rewards.len()
    }

    /// Get training duration in seconds
    pub fn training_duration_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn steps_per_second(&self) -> f64 {
        let duration = self.training_duration_secs();
        if duration > 0.0 {
            self.total_steps as f64 / duration
        } else {
            0.0
        }
    }

    /// Log one episode to console
    pub fn log_episode(&self, stats: &EpisodeStats, total_episodes: usize) {
        tracing::info!(
            "Episode {}/{} | Reward {:.2} | Collisions {} | Items {} | Orders {}/{} | Epsilon {:.4}",
            stats.episode + 1,
            total_episodes,
            stats.total_reward,
            stats.collisions,
            stats.items_collected,
            stats.orders_completed,
            stats.orders_target,
            stats.epsilon
        );
        for (robot, reward) in &stats.robot_rewards {
            tracing::info!("  Robot {} reward: {:.2}", robot, reward);
        }
    }

    /// Log the end-of-training summary over the recent window
    pub fn log_summary(&self, orders_target: usize, final_epsilon: f64) {
        tracing::info!(
            "Training completed in {:.2}s ({} steps, {:.1} steps/s)",
            self.training_duration_secs(),
            self.total_steps,
            self.steps_per_second()
        );
        tracing::info!("Final exploration rate: {:.4}", final_epsilon);
        tracing::info!(
            "Final {} episodes - Avg reward: {:.2}, Avg collisions: {:.2}, Avg orders completed: {:.2}/{}",
            self.recent_rewards.len(),
            self.recent_rewards.average(),
            self.recent_collisions.average(),
            self.recent_orders.average(),
            orders_target
        );
    }
}

impl Default for TrainingMetrics {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Appends `step,value` rows to one CSV file per series
pub struct CsvLogger {
    log_dir: PathBuf,
}

impl CsvLogger {
    pub fn new<P: AsRef<Path>>(log_dir: P) -> io::Result<Self> {
        fs::create_dir_all(log_dir.as_ref())?;
        Ok(Self {
            log_dir: log_dir.as_ref().to_path_buf(),
        })
    }

    pub fn series_path(&self, tag: &str) -> PathBuf {
        self.log_dir.join(format!("{}.csv", tag.replace('/', "_")))
    }

    /// Log a scalar value
    pub fn log_scalar(&mut self, tag: &str, value: f64, step: usize) -> io::Result<()> {
        let csv_path = self.series_path(tag);
        let file_exists = csv_path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&csv_path)?;

        if !file_exists {
            writeln!(file, "step,value")?;
        }
        writeln!(file, "{},{}", step, value)
    }

    pub fn log_episode(&mut self, stats: &EpisodeStats) -> io::Result<()> {
        let step = stats.episode;
        self.log_scalar("episode/reward", stats.total_reward, step)?;
        self.log_scalar("episode/collisions", stats.collisions as f64, step)?;
        self.log_scalar("episode/items", stats.items_collected as f64, step)?;
        self.log_scalar("episode/orders", stats.orders_completed as f64, step)?;
        self.log_scalar("episode/steps", stats.steps as f64, step)?;
        self.log_scalar("schedule/epsilon", stats.epsilon, step)
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average() {
        let mut avg = MovingAverage::new(3);

        avg.push(1.0);
        assert!((avg.average() - 1.0).abs() < 1e-9);

        avg.push(2.0);
        assert!((avg.average() - 1.5).abs() < 1e-9);

        avg.push(3.0);
        assert!((avg.average() - 2.0).abs() < 1e-9);

        avg.push(4.0); // Pushes out 1.0
        assert!((avg.average() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_training_metrics_history() {
        let mut metrics = TrainingMetrics::new(2);
        for (episode, reward) in [10.0, 20.0, 40.0].into_iter().enumerate() {
            metrics.record_episode(&EpisodeStats {
                episode,
                steps: 100,
                total_reward: reward,
                collisions: episode,
                orders_completed: 1,
                orders_target: 2,
                ..EpisodeStats::default()
            });
        }

        assert_eq!(metrics.episodes(), 3);
        assert_eq!(metrics.total_steps, 300);
        assert_eq!(metrics.collisions, vec![0, 1, 2]);
        assert!((metrics.recent_rewards.average() - 30.0).abs() < 1e-9);
        assert!((metrics.recent_collisions.average() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_csv_logger_writes_header_once() {
        let dir = std::env::temp_dir().join(format!("pickbot-metrics-{}", std::process::id()));
        let mut logger = CsvLogger::new(&dir).unwrap();
        logger.log_scalar("episode/reward", 1.5, 0).unwrap();
        logger.log_scalar("episode/reward", -2.0, 1).unwrap();

        let text = std::fs::read_to_string(logger.series_path("episode/reward")).unwrap();
        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(text, "step,value\n0,1.5\n1,-2\n");
    }
}
