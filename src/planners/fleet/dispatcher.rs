use tracing::info;

use crate::planners::fleet::AgentController;
use crate::state::{OrderId, RobotId, World};

/// Orders a robot may hold before it stops receiving new ones.
pub const DISPATCH_LIMIT: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub order: OrderId,
    pub robot: RobotId,
    /// The robot was idle and began working on the order right away
    pub started: bool,
}

/// First-fit assignment of pending orders to robots with spare queue room.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    dispatch_limit: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            dispatch_limit: DISPATCH_LIMIT,
        }
    }
}

impl Dispatcher {
    pub fn new(dispatch_limit: usize) -> Self {
        Self { dispatch_limit }
    }

    /// Hand every pending order, oldest first, to the lowest-id robot whose
    /// queue is below the dispatch limit. Idle receivers start immediately.
    pub fn assign(&self, world: &mut World, controller: &AgentController) -> Vec<Assignment> {
        let mut assignments = Vec::new();

        for order_index in 0..world.orders.len() {
            if !world.orders[order_index].is_pending() {
                continue;
            }
            let Some(robot_index) = world
                .robots
                .iter()
                .position(|r| r.queue_len() < self.dispatch_limit)
            else {
                continue;
            };

            let order = world.orders[order_index].id;
            if !world.robots[robot_index].enqueue(order) {
                continue;
            }
            world.orders[order_index].assign();

            let robot = world.robots[robot_index].id;
            let started = world.robots[robot_index].is_idle()
                && controller.begin_next_order(world, robot_index).is_some();

            info!("Order {} assigned to robot {}", order, robot);
            assignments.push(Assignment {
                order,
                robot,
                started,
            });
        }

        assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Point;
    use crate::state::{Facility, ItemId, OrderStatus, Robot, RobotState};

    fn world_with_robots(count: usize) -> World {
        let mut facility = Facility::open(30, 30, 10.0);
        facility.catalog.insert(ItemId(1), Point::new(55.0, 55.0));
        let robots = (1..=count)
            .map(|id| Robot::new(id, Point::new(50.0 * id as f64 + 50.0, 250.0), 10.0, 0))
            .collect();
        World::new(facility, robots)
    }

    #[test]
    fn test_first_fit_in_id_order() {
        let mut world = world_with_robots(2);
        let first = world.submit_order(vec![ItemId(1)], 0);
        let second = world.submit_order(vec![ItemId(1)], 0);
        let third = world.submit_order(vec![ItemId(1)], 0);

        let assignments = Dispatcher::default().assign(&mut world, &AgentController::default());

        assert_eq!(
            assignments,
            vec![
                Assignment {
                    order: first,
                    robot: 1,
                    started: true,
                },
                Assignment {
                    order: second,
                    robot: 2,
                    started: true,
                },
            ]
        );
        assert_eq!(world.order(third).unwrap().status(), OrderStatus::Pending);
        assert!(world.robots.iter().all(|r| r.state() == RobotState::Collecting));
        assert!(world.robots.iter().all(|r| !r.path().is_empty()));
    }

    #[test]
    fn test_assigned_orders_are_not_reassigned() {
        let mut world = world_with_robots(1);
        let order = world.submit_order(vec![ItemId(1)], 0);
        let dispatcher = Dispatcher::default();
        let controller = AgentController::default();

        assert_eq!(dispatcher.assign(&mut world, &controller).len(), 1);
        assert!(dispatcher.assign(&mut world, &controller).is_empty());
        assert_eq!(world.order(order).unwrap().status(), OrderStatus::Assigned);
        assert_eq!(world.robots[0].queue_len(), 1);
    }

    #[test]
    fn test_busy_robot_queues_without_starting() {
        let mut world = world_with_robots(1);
        let order = world.submit_order(vec![ItemId(1)], 0);
        let dispatcher = Dispatcher::new(2);
        let controller = AgentController::default();
        dispatcher.assign(&mut world, &controller);

        let next = world.submit_order(vec![ItemId(1)], 0);
        let assignments = dispatcher.assign(&mut world, &controller);

        assert_eq!(
            assignments,
            vec![Assignment {
                order: next,
                robot: 1,
                started: false,
            }]
        );
        assert_eq!(world.robots[0].current_order(), Some(order));
    }
}
