//! Independent tabular Q-learner per robot, steering it one compass step at a time.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use super::action_space::{ACTION_COUNT, ActionSpace, Heading};
use super::encoder::{DiscreteState, StateEncoder};
use super::reward::RewardModel;
use crate::infra::Point;
use crate::state::{RobotId, World};

/// Sparse action values. Reads never insert; unseen states are all zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    values: HashMap<DiscreteState, [f64; ACTION_COUNT]>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, state: &DiscreteState) -> Option<&[f64; ACTION_COUNT]> {
        self.values.get(state)
    }

    pub fn value(&self, state: &DiscreteState, action: usize) -> f64 {
        self.values
            .get(state)
            .and_then(|row| row.get(action))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn max_value(&self, state: &DiscreteState) -> f64 {
        self.values
            .get(state)
            .map(|row| row.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            .unwrap_or(0.0)
    }

    pub fn set(&mut self, state: &DiscreteState, action: usize, value: f64) {
        if action >= ACTION_COUNT {
            return;
        }
        let row = self
            .values
            .entry(state.clone())
            .or_insert([0.0; ACTION_COUNT]);
        row[action] = value;
    }

    /// Number of states with a stored row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Every non-zero `(state, action, value)`, ordered by state then action.
    pub fn nonzero_entries(&self) -> Vec<(&DiscreteState, usize, f64)> {
        let mut states: Vec<&DiscreteState> = self.values.keys().collect();
        states.sort();
        states
            .into_iter()
            .flat_map(|state| {
                self.values[state]
                    .iter()
                    .enumerate()
                    .filter(|(_, value)| **value != 0.0)
                    .map(move |(action, value)| (state, action, *value))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct QLearningConfig {
    pub alpha: f64,
    pub gamma: f64,
    pub epsilon: f64,
    /// Epsilon at episode 0 of the decay schedule
    pub epsilon_start: f64,
    pub epsilon_floor: f64,
    pub alpha_floor: f64,
}

impl Default for QLearningConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.9,
            epsilon: 0.3,
            epsilon_start: 0.9,
            epsilon_floor: 0.05,
            alpha_floor: 0.01,
        }
    }
}

/// Summed outcome of one policy pass over the fleet.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActOutcome {
    pub total_reward: f64,
    pub collisions: usize,
    pub moves: usize,
}

pub struct QLearningPolicy {
    config: QLearningConfig,
    /// Alpha the schedule decays from
    initial_alpha: f64,
    tables: BTreeMap<RobotId, QTable>,
    encoder: StateEncoder,
    actions: ActionSpace,
    rewards: RewardModel,
    rng: StdRng,
}

impl QLearningPolicy {
    pub fn new(config: QLearningConfig, seed: u64) -> Self {
        Self {
            initial_alpha: config.alpha,
            config,
            tables: BTreeMap::new(),
            encoder: StateEncoder::default(),
            actions: ActionSpace::default(),
            rewards: RewardModel::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn alpha(&self) -> f64 {
        self.config.alpha
    }

    pub fn epsilon(&self) -> f64 {
        self.config.epsilon
    }

    pub fn tables(&self) -> &BTreeMap<RobotId, QTable> {
        &self.tables
    }

    pub fn table(&self, robot: RobotId) -> Option<&QTable> {
        self.tables.get(&robot)
    }

    pub fn table_mut(&mut self, robot: RobotId) -> &mut QTable {
        self.tables.entry(robot).or_default()
    }

    pub fn replace_tables(&mut self, tables: BTreeMap<RobotId, QTable>) {
        self.tables = tables;
    }

    /// Epsilon-greedy over `valid`. The greedy branch explores too when the
    /// state is unseen or every valid action is still exactly zero.
    pub fn choose_action(&mut self, robot: RobotId, state: &DiscreteState, valid: &[usize]) -> usize {
        let fallback = valid.first().copied().unwrap_or(0);

        if self.rng.random::<f64>() < self.config.epsilon {
            return valid.choose(&mut self.rng).copied().unwrap_or(fallback);
        }

        let row = self.tables.get(&robot).and_then(|table| table.get(state));
        let Some(row) = row.filter(|row| valid.iter().any(|&a| row[a] != 0.0)) else {
            return valid.choose(&mut self.rng).copied().unwrap_or(fallback);
        };

        let best = valid
            .iter()
            .map(|&a| row[a])
            .fold(f64::NEG_INFINITY, f64::max);
        let maximisers: Vec<usize> = valid.iter().copied().filter(|&a| row[a] == best).collect();
        maximisers.choose(&mut self.rng).copied().unwrap_or(fallback)
    }

    /// One-step Q-learning backup.
    pub fn update(
        &mut self,
        robot: RobotId,
        state: &DiscreteState,
        action: usize,
        reward: f64,
        next_state: &DiscreteState,
    ) {
        let (alpha, gamma) = (self.config.alpha, self.config.gamma);
        let table = self.table_mut(robot);
        let current = table.value(state, action);
        let next_max = table.max_value(next_state);
        table.set(state, action, current + alpha * (reward + gamma * next_max - current));
    }

    /// Move robot `index` one policy step, learn from it and return the reward.
    pub fn act(&mut self, world: &mut World, index: usize) -> Option<f64> {
        let snapshots = world.snapshots();
        let World {
            facility,
            robots,
            orders,
            ..
        } = world;
        let robot = robots.get_mut(index)?;

        let state = self.encoder.encode(robot, facility, &snapshots);
        let valid = self.actions.valid_actions(robot, facility, &snapshots);
        let action = self.choose_action(robot.id, &state, &valid);
        let heading = Heading::from_index(action)?;

        let old = robot.position;
        let proposed = self.actions.apply(old, heading);
        let new = Point::new(
            proposed.x.min(facility.width - robot.radius).max(robot.radius),
            proposed.y.min(facility.height - robot.radius).max(robot.radius),
        );
        robot.position = new;

        let next_state = self.encoder.encode(robot, facility, &snapshots);
        let order = robot.current_order().and_then(|id| orders.get(id.0));
        let reward = self
            .rewards
            .evaluate(robot, order, facility, &snapshots, old, new);
        robot.reward += reward;

        let id = robot.id;
        self.update(id, &state, action, reward, &next_state);
        Some(reward)
    }

    /// Policy step for every busy robot, ascending id.
    pub fn act_all(&mut self, world: &mut World) -> ActOutcome {
        let mut outcome = ActOutcome::default();
        for index in 0..world.robots.len() {
            if world.robots[index].is_idle() {
                continue;
            }
            if let Some(reward) = self.act(world, index) {
                outcome.total_reward += reward;
                outcome.moves += 1;
                if self.rewards.is_collision(reward) {
                    outcome.collisions += 1;
                }
            }
        }
        outcome
    }

    /// Decay exploration and learning rate after `episode` of `total`.
    pub fn update_learning_parameters(&mut self, episode: usize, total: usize) {
        if total == 0 {
            return;
        }
        let progress = episode as f64 / total as f64;
        self.config.epsilon = (self.config.epsilon_start * (1.0 - progress)).max(self.config.epsilon_floor);
        self.config.alpha = (self.initial_alpha * (1.0 - progress / 2.0)).max(self.config.alpha_floor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Rect;
    use crate::state::{Facility, ItemId, Robot, RobotState};

    fn state(x: i32) -> DiscreteState {
        DiscreteState {
            cell: (x, 0),
            target: (0, 0),
            mode: RobotState::Collecting,
            obstacles: Vec::new(),
            neighbors: Vec::new(),
        }
    }

    #[test]
    fn test_reads_do_not_insert() {
        let table = QTable::new();
        assert_eq!(table.value(&state(1), 3), 0.0);
        assert_eq!(table.max_value(&state(1)), 0.0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_single_update_matches_formula() {
        let mut policy = QLearningPolicy::new(QLearningConfig::default(), 0);
        policy.update(1, &state(1), 2, 100.0, &state(2));

        let value = policy.table(1).unwrap().value(&state(1), 2);
        assert!((value - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_full_learning_rate_replaces_prior() {
        let config = QLearningConfig {
            alpha: 1.0,
            gamma: 0.5,
            ..QLearningConfig::default()
        };
        for prior in [7.25, -40.0] {
            let mut policy = QLearningPolicy::new(config.clone(), 0);
            policy.table_mut(1).set(&state(1), 4, prior);
            policy.table_mut(1).set(&state(2), 0, 3.0);
            policy.table_mut(1).set(&state(2), 5, -8.0);

            policy.update(1, &state(1), 4, 2.0, &state(2));
            assert_eq!(policy.table(1).unwrap().value(&state(1), 4), 3.5);
        }
    }

    #[test]
    fn test_tables_are_per_robot() {
        let mut policy = QLearningPolicy::new(QLearningConfig::default(), 0);
        policy.update(1, &state(1), 0, 50.0, &state(2));
        assert!(policy.table(2).is_none());
        assert_eq!(policy.tables().len(), 1);
    }

    #[test]
    fn test_greedy_choice_picks_best_valid_action() {
        let config = QLearningConfig {
            epsilon: 0.0,
            ..QLearningConfig::default()
        };
        let mut policy = QLearningPolicy::new(config, 7);
        policy.table_mut(1).set(&state(1), 2, 5.0);
        policy.table_mut(1).set(&state(1), 6, 9.0);

        assert_eq!(policy.choose_action(1, &state(1), &[0, 2, 6]), 6);
        // Best action masked out
        assert_eq!(policy.choose_action(1, &state(1), &[0, 2]), 2);
    }

    #[test]
    fn test_unseen_or_zero_rows_explore_valid_actions() {
        let config = QLearningConfig {
            epsilon: 0.0,
            ..QLearningConfig::default()
        };
        let mut policy = QLearningPolicy::new(config, 7);
        policy.table_mut(1).set(&state(1), 5, 1.0);

        for _ in 0..50 {
            let a = policy.choose_action(1, &state(9), &[1, 3]);
            assert!(a == 1 || a == 3);
            let b = policy.choose_action(1, &state(1), &[0, 4]);
            assert!(b == 0 || b == 4);
        }
    }

    #[test]
    fn test_schedule_follows_decay_and_floors() {
        let mut policy = QLearningPolicy::new(QLearningConfig::default(), 0);

        policy.update_learning_parameters(0, 100);
        assert!((policy.epsilon() - 0.9).abs() < 1e-12);
        assert!((policy.alpha() - 0.1).abs() < 1e-12);

        policy.update_learning_parameters(50, 100);
        assert!((policy.epsilon() - 0.45).abs() < 1e-12);
        assert!((policy.alpha() - 0.075).abs() < 1e-12);

        policy.update_learning_parameters(99, 100);
        assert!((policy.epsilon() - 0.05).abs() < 1e-12);
        assert!((policy.alpha() - 0.0505).abs() < 1e-12);

        policy.update_learning_parameters(100, 100);
        assert_eq!(policy.epsilon(), 0.05);
        assert!(policy.alpha() >= 0.01);
    }

    #[test]
    fn test_act_moves_and_learns() {
        let mut facility = Facility::open(40, 40, 10.0);
        facility.add_obstacle(Rect::new(300.0, 300.0, 30.0, 30.0));
        facility.catalog.insert(ItemId(1), Point::new(105.0, 105.0));
        let mut world = World::new(facility, vec![Robot::new(1, Point::new(200.0, 200.0), 10.0, 0)]);
        let order = world.submit_order(vec![ItemId(1)], 0);
        world.robots[0].enqueue(order);
        world.robots[0].start_order(vec![Point::new(105.0, 105.0)]);

        let mut policy = QLearningPolicy::new(QLearningConfig::default(), 3);
        let outcome = policy.act_all(&mut world);

        assert_eq!(outcome.moves, 1);
        assert_eq!(outcome.collisions, 0);
        let moved = world.robots[0].position.distance(&Point::new(200.0, 200.0));
        assert!(moved > 1.9 && moved < 2.9);
        assert_eq!(world.robots[0].reward, outcome.total_reward);
        assert!(outcome.total_reward == 15.0 || outcome.total_reward == -10.0);
        assert_eq!(policy.table(1).unwrap().nonzero_entries().len(), 1);
    }

    #[test]
    fn test_idle_robots_do_not_act() {
        let facility = Facility::open(20, 20, 10.0);
        let mut world = World::new(facility, vec![Robot::new(1, Point::new(50.0, 50.0), 10.0, 0)]);
        let mut policy = QLearningPolicy::new(QLearningConfig::default(), 3);

        assert_eq!(policy.act_all(&mut world), ActOutcome::default());
        assert_eq!(world.robots[0].position, Point::new(50.0, 50.0));
    }
}
