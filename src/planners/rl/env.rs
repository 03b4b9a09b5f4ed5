//! Episodic training environment around a `World`

use crate::planners::fleet::{AgentController, Dispatcher, RobotEvent};
use crate::state::{OrderGenerator, World};

use super::policy::QLearningPolicy;

/// Environment configuration
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Maximum steps per episode
    pub max_steps: usize,
    /// Orders generated at the start of each episode
    pub orders_per_episode: usize,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            orders_per_episode: 2,
        }
    }
}

/// Step result from the environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepResult {
    /// Summed policy reward over all robots this step
    pub reward: f64,
    /// Policy moves that ended in a collision
    pub collisions: usize,
    pub items_collected: usize,
    pub orders_completed: usize,
    /// Target reached or nothing left to do
    pub done: bool,
    /// Hit max steps
    pub truncated: bool,
}

pub struct WarehouseEnv {
    world: World,
    dispatcher: Dispatcher,
    controller: AgentController,
    generator: OrderGenerator,
    config: EnvConfig,
    steps: usize,
    completed: usize,
}

impl WarehouseEnv {
    pub fn new(world: World, generator: OrderGenerator, config: EnvConfig) -> Self {
        Self {
            world,
            dispatcher: Dispatcher::default(),
            controller: AgentController::default(),
            generator,
            config,
            steps: 0,
            completed: 0,
        }
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Robots home, fresh batch of orders.
    pub fn reset(&mut self) {
        self.world.reset();
        for _ in 0..self.config.orders_per_episode {
            let (items, checkout) = self.generator.next_order(&self.world.facility);
            self.world.submit_order(items, checkout);
        }
        self.steps = 0;
        self.completed = 0;
    }

    /// Dispatch, let the policy nudge every busy robot, then run the controller.
    pub fn step(&mut self, policy: &mut QLearningPolicy) -> StepResult {
        self.dispatcher.assign(&mut self.world, &self.controller);
        let outcome = policy.act_all(&mut self.world);
        let events = self.controller.advance(&mut self.world);

        let items_collected = events
            .iter()
            .filter(|e| matches!(e, RobotEvent::ItemCollected { .. }))
            .count();
        let orders_completed = events
            .iter()
            .filter(|e| matches!(e, RobotEvent::OrderCompleted { .. }))
            .count();

        self.steps += 1;
        self.world.tick += 1;
        self.completed += orders_completed;

        StepResult {
            reward: outcome.total_reward,
            collisions: outcome.collisions,
            items_collected,
            orders_completed,
            done: self.completed >= self.config.orders_per_episode || self.world.is_quiescent(),
            truncated: self.steps >= self.config.max_steps,
        }
    }
}
