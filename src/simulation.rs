//! Headless run loop: order arrivals, dispatch, policy and controller steps.
//!
//! With a motion policy attached, a busy robot is moved twice per tick: once
//! by the policy's compass step and once by the controller's waypoint step.

use tracing::{debug, info};

use crate::infra::{LoggingObserver, SimulationObserver};
use crate::planners::fleet::{AgentController, Assignment, Dispatcher, RobotEvent};
use crate::planners::rl::{ActOutcome, QLearningPolicy};
use crate::state::{ItemId, OrderGenerator, OrderId, World};

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Ticks between automatic order arrivals
    pub order_interval: u64,
    /// No new orders while this many are outstanding
    pub max_outstanding: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            order_interval: 120,
            max_outstanding: 9,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub orders_submitted: usize,
    pub orders_completed: usize,
    pub items_collected: usize,
    pub collisions: usize,
    pub policy_reward: f64,
}

pub struct Simulation {
    world: World,
    dispatcher: Dispatcher,
    controller: AgentController,
    policy: Option<QLearningPolicy>,
    generator: OrderGenerator,
    observer: Box<dyn SimulationObserver>,
    config: SimulationConfig,
    order_timer: u64,
    summary: RunSummary,
}

impl Simulation {
    pub fn new(world: World, generator: OrderGenerator, config: SimulationConfig) -> Self {
        Self {
            world,
            dispatcher: Dispatcher::default(),
            controller: AgentController::default(),
            policy: None,
            generator,
            observer: Box::new(LoggingObserver),
            config,
            order_timer: 0,
            summary: RunSummary::default(),
        }
    }

    pub fn with_policy(mut self, policy: QLearningPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn SimulationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn policy(&self) -> Option<&QLearningPolicy> {
        self.policy.as_ref()
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn submit_order(&mut self, items: Vec<ItemId>, checkout: usize) -> OrderId {
        let id = self.world.submit_order(items, checkout);
        self.summary.orders_submitted += 1;
        if let Some(order) = self.world.order(id) {
            self.observer.on_order_submitted(order);
        }
        id
    }

    /// Count the order timer up and generate an order when it fires and the backlog allows.
    pub fn generate_orders(&mut self) -> Option<OrderId> {
        self.order_timer += 1;
        if self.order_timer < self.config.order_interval {
            return None;
        }
        self.order_timer = 0;

        let outstanding = self.world.outstanding_orders();
        if outstanding >= self.config.max_outstanding {
            debug!("Backlog full ({} outstanding), skipping order", outstanding);
            return None;
        }
        let (items, checkout) = self.generator.next_order(&self.world.facility);
        Some(self.submit_order(items, checkout))
    }

    pub fn dispatch_and_plan(&mut self) -> Vec<Assignment> {
        let assignments = self.dispatcher.assign(&mut self.world, &self.controller);
        for assignment in &assignments {
            self.observer.on_assignment(assignment, &self.world);
        }
        assignments
    }

    /// Policy step for every busy robot; a no-op without a policy.
    pub fn agent_act(&mut self) -> ActOutcome {
        let Some(policy) = self.policy.as_mut() else {
            return ActOutcome::default();
        };
        let outcome = policy.act_all(&mut self.world);
        self.summary.policy_reward += outcome.total_reward;
        outcome
    }

    pub fn advance_agents(&mut self) -> Vec<RobotEvent> {
        let events = self.controller.advance(&mut self.world);
        for event in &events {
            match event {
                RobotEvent::ItemCollected { .. } => self.summary.items_collected += 1,
                RobotEvent::OrderCompleted { .. } => self.summary.orders_completed += 1,
                _ => {}
            }
            self.observer.on_robot_event(event, &self.world);
        }
        events
    }

    pub fn tick(&mut self) {
        self.generate_orders();
        self.dispatch_and_plan();
        self.agent_act();
        self.advance_agents();

        self.world.tick += 1;
        self.summary.ticks = self.world.tick;
        self.summary.collisions = self.world.collision_count;
        self.observer.on_tick(&self.world);
    }

    #[tracing::instrument(level = "info", skip(self))]
    pub fn run(&mut self, ticks: u64) -> RunSummary {
        info!(
            "Running {} ticks with {} motion policy",
            ticks,
            if self.policy.is_some() { "the learned" } else { "no" }
        );
        self.observer.on_run_start(&self.world);
        for _ in 0..ticks {
            self.tick();
        }
        self.observer.on_run_finished(&self.summary);
        self.summary.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planners::rl::QLearningConfig;
    use crate::state::{FacilityBuilder, OrderStatus};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorded {
        submitted: usize,
        assignments: usize,
        ticks: usize,
        finished: bool,
    }

    struct RecordingObserver(Rc<RefCell<Recorded>>);

    impl SimulationObserver for RecordingObserver {
        fn on_run_start(&mut self, _world: &World) {}

        fn on_order_submitted(&mut self, _order: &crate::state::Order) {
            self.0.borrow_mut().submitted += 1;
        }

        fn on_assignment(&mut self, _assignment: &Assignment, _world: &World) {
            self.0.borrow_mut().assignments += 1;
        }

        fn on_robot_event(&mut self, _event: &RobotEvent, _world: &World) {}

        fn on_tick(&mut self, _world: &World) {
            self.0.borrow_mut().ticks += 1;
        }

        fn on_run_finished(&mut self, _summary: &RunSummary) {
            self.0.borrow_mut().finished = true;
        }
    }

    fn simulation(seed: u64, with_policy: bool) -> Simulation {
        let world = FacilityBuilder::default().with_seed(seed).build_world();
        let simulation = Simulation::new(
            world,
            OrderGenerator::new(seed).with_max_items(3),
            SimulationConfig {
                order_interval: 5,
                max_outstanding: 4,
            },
        );
        if with_policy {
            simulation.with_policy(QLearningPolicy::new(QLearningConfig::default(), seed))
        } else {
            simulation
        }
    }

    #[test]
    fn test_orders_arrive_on_interval_until_backlog_full() {
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let mut sim = simulation(1, false).with_observer(Box::new(RecordingObserver(recorded.clone())));

        let summary = sim.run(40);

        let recorded = recorded.borrow();
        assert_eq!(recorded.ticks, 40);
        assert!(recorded.finished);
        assert_eq!(summary.ticks, 40);
        // One order every 5 ticks, capped at 4 outstanding
        assert!(summary.orders_submitted >= 4 && summary.orders_submitted <= 8);
        assert_eq!(recorded.submitted, summary.orders_submitted);
        assert!(sim.world().outstanding_orders() <= 4);
        assert_eq!(recorded.assignments, sim.world().orders.len() - sim.world().count_orders(OrderStatus::Pending));
    }

    #[test]
    fn test_hooks_run_in_order() {
        let mut sim = simulation(2, false);
        sim.submit_order(vec![ItemId(0)], 0);

        let assignments = sim.dispatch_and_plan();
        assert_eq!(assignments.len(), 1);
        assert!(assignments[0].started);
        assert_eq!(sim.agent_act(), ActOutcome::default(), "no policy attached");

        let before = sim.world().robots[0].position;
        sim.advance_agents();
        assert_ne!(sim.world().robots[0].position, before);
    }

    #[test]
    fn test_fixed_seed_reproduces_run() {
        let mut first = simulation(9, true);
        let mut second = simulation(9, true);
        first.run(150);
        second.run(150);

        let positions = |sim: &Simulation| -> Vec<_> { sim.world().robots.iter().map(|r| r.position).collect() };
        assert_eq!(positions(&first), positions(&second));
        assert_eq!(first.summary(), second.summary());
        assert_eq!(first.policy().unwrap().tables(), second.policy().unwrap().tables());
    }
}
