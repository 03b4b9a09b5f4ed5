use tracing::{debug, info};

use crate::infra::SimulationObserver;
use crate::planners::fleet::{Assignment, RobotEvent};
use crate::simulation::RunSummary;
use crate::state::{Order, World};

/// Writes the run's lifecycle to the log.
pub struct LoggingObserver;

impl SimulationObserver for LoggingObserver {
    fn on_run_start(&mut self, world: &World) {
        let facility = &world.facility;
        info!("Simulation started");
        info!("- floor: {}x{}", facility.width, facility.height);
        info!("- robots: {}", world.robots.len());
        info!("- products: {}", facility.catalog.len());
        info!("- obstacles: {}", facility.obstacles.len());
    }

    fn on_order_submitted(&mut self, order: &Order) {
        let items: Vec<String> = order.items.iter().map(ToString::to_string).collect();
        info!(
            "New order {} for checkout {}: [{}]",
            order.id,
            order.checkout + 1,
            items.join(", ")
        );
    }

    fn on_assignment(&mut self, assignment: &Assignment, _world: &World) {
        debug!(
            "Order {} -> robot {}{}",
            assignment.order,
            assignment.robot,
            if assignment.started { " (started)" } else { "" }
        );
    }

    fn on_robot_event(&mut self, event: &RobotEvent, _world: &World) {
        match event {
            RobotEvent::Blocked { robot } => debug!("Robot {} blocked this tick", robot),
            RobotEvent::Replanned { robot, waypoints } => {
                debug!("Robot {} replanned around traffic ({} waypoints)", robot, waypoints)
            }
            _ => {}
        }
    }

    fn on_run_finished(&mut self, summary: &RunSummary) {
        info!("Simulation finished after {} ticks", summary.ticks);
        info!(
            "- orders: {} submitted, {} completed",
            summary.orders_submitted, summary.orders_completed
        );
        info!("- items collected: {}", summary.items_collected);
        info!("- collisions: {}", summary.collisions);
        info!("- policy reward: {:.2}", summary.policy_reward);
    }
}
