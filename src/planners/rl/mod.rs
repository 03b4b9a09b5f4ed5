//! Tabular Q-learning motion policy
//!
//! Each robot owns an independent `QTable` keyed by a coarse `DiscreteState`
//! (own cell, next waypoint, task state, nearby obstacles and robots). The
//! policy nudges busy robots one of eight compass steps per tick and learns
//! from a shaped reward; `Trainer` runs the epsilon/alpha decay schedule
//! over episodes of a `WarehouseEnv`.

pub mod action_space;
pub mod encoder;
pub mod env;
pub mod metrics;
pub mod persistence;
pub mod policy;
pub mod reward;
pub mod train;

pub use action_space::{ACTION_COUNT, ActionSpace, Heading};
pub use encoder::{DiscreteState, EncoderConfig, StateEncoder};
pub use env::{EnvConfig, StepResult, WarehouseEnv};
pub use metrics::{CsvLogger, EpisodeStats, MovingAverage, TrainingMetrics};
pub use persistence::{LoadReport, QTableError, read_q_tables, write_q_tables};
pub use policy::{ActOutcome, QLearningConfig, QLearningPolicy, QTable};
pub use reward::{RewardConfig, RewardModel};
pub use train::{TrainConfig, Trainer};
