use crate::planners::fleet::{Assignment, RobotEvent};
use crate::simulation::RunSummary;
use crate::state::{Order, World};

/// Trait for observing simulation events during a run
pub trait SimulationObserver {
    /// Called once before the first tick
    fn on_run_start(&mut self, world: &World);

    /// Called when a new order enters the backlog
    fn on_order_submitted(&mut self, order: &Order);

    /// Called when the dispatcher hands an order to a robot
    fn on_assignment(&mut self, assignment: &Assignment, world: &World);

    /// Called for every event the controller reports
    fn on_robot_event(&mut self, event: &RobotEvent, world: &World);

    /// Called at the end of every tick
    fn on_tick(&mut self, _world: &World) {
        // Default implementation does nothing
    }

    /// Called after the last tick
    fn on_run_finished(&mut self, summary: &RunSummary);
}
