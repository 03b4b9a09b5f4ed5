use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Trimmed and parsed raw value, `None` when missing or unparsable.
fn parse_env_value<T: FromStr>(raw: Option<String>) -> Option<T> {
    raw.and_then(|val| val.trim().parse::<T>().ok())
}

fn get_env_var<T: FromStr>(key: &str) -> Option<T> {
    parse_env_value(env::var(key).ok())
}

/// Runtime settings for the `pickbot` binary.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub seed: u64,
    pub episodes: usize,
    pub max_steps: usize,
    pub orders_per_episode: usize,
    pub qtable_path: PathBuf,
    /// Reload the saved tables before the run, as a round-trip check
    pub load_qtables: bool,
    pub run_ticks: u64,
    pub use_rl: bool,
    pub metrics_dir: Option<PathBuf>,
    pub robots: usize,
    /// Random floor obstacles placed by the layout
    pub obstacles: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 42,
            episodes: 100,
            max_steps: 1000,
            orders_per_episode: 2,
            qtable_path: PathBuf::from("robot_q_tables.txt"),
            load_qtables: false,
            run_ticks: 3600,
            use_rl: true,
            metrics_dir: None,
            robots: 3,
            obstacles: 10,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        Self {
            seed: get_env_var("PICKBOT_SEED").unwrap_or(defaults.seed),
            episodes: get_env_var("PICKBOT_EPISODES").unwrap_or(defaults.episodes),
            max_steps: get_env_var("PICKBOT_MAX_STEPS").unwrap_or(defaults.max_steps),
            orders_per_episode: get_env_var("PICKBOT_ORDERS_PER_EPISODE")
                .unwrap_or(defaults.orders_per_episode),
            qtable_path: env::var("PICKBOT_QTABLE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.qtable_path),
            load_qtables: get_env_var("PICKBOT_LOAD_QTABLES").unwrap_or(defaults.load_qtables),
            run_ticks: get_env_var("PICKBOT_RUN_TICKS").unwrap_or(defaults.run_ticks),
            use_rl: get_env_var("PICKBOT_USE_RL").unwrap_or(defaults.use_rl),
            metrics_dir: env::var("PICKBOT_METRICS_DIR").ok().map(PathBuf::from),
            robots: get_env_var("PICKBOT_ROBOTS").unwrap_or(defaults.robots),
            obstacles: get_env_var("PICKBOT_OBSTACLES").unwrap_or(defaults.obstacles),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_variables_fall_back_to_defaults() {
        assert_eq!(get_env_var::<u64>("PICKBOT_TEST_SURELY_UNSET"), None);
        let settings = Settings::default();
        assert_eq!(settings.seed, 42);
        assert_eq!(settings.qtable_path, PathBuf::from("robot_q_tables.txt"));
        assert!(settings.use_rl);
        assert_eq!(settings.robots, 3);
        assert_eq!(settings.obstacles, 10);
    }

    #[test]
    fn test_values_are_trimmed_and_parsed() {
        assert_eq!(parse_env_value::<usize>(Some(" 12 ".to_string())), Some(12));
        assert_eq!(parse_env_value::<bool>(Some("true".to_string())), Some(true));
        assert_eq!(parse_env_value::<f64>(Some("0.25\n".to_string())), Some(0.25));
    }

    #[test]
    fn test_bad_or_missing_values_are_none() {
        assert_eq!(parse_env_value::<bool>(Some("maybe".to_string())), None);
        assert_eq!(parse_env_value::<u64>(Some("-3".to_string())), None);
        assert_eq!(parse_env_value::<u64>(Some(String::new())), None);
        assert_eq!(parse_env_value::<u64>(None), None);
    }
}
