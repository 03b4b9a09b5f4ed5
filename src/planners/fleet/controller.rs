//! Per-robot task state machine: idle -> collecting -> checkout -> idle.
//!
//! Robots are stepped in ascending id order, so a robot always sees the
//! post-move positions of the robots updated before it in the same tick.

use tracing::{debug, info, warn};

use crate::infra::{Pathfinder, Point, RouteOptimizer};
use crate::state::{Facility, ItemId, Order, OrderId, Robot, RobotId, RobotSnapshot, RobotState, World};

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Distance covered per tick
    pub speed: f64,
    /// Waypoints closer than this are reached
    pub arrival_radius: f64,
    /// Items within this distance are picked up
    pub pickup_radius: f64,
    /// Ticks between two collision-triggered repaths
    pub repath_cooldown: u32,
    /// Heading deviations tried, in order, when the direct step is blocked
    pub heading_offsets: [f64; 6],
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            speed: 2.0,
            arrival_radius: 2.0,
            pickup_radius: 20.0,
            repath_cooldown: 10,
            heading_offsets: [0.2, -0.2, 0.4, -0.4, 0.6, -0.6],
        }
    }
}

/// Something that happened to a robot during one controller step.
#[derive(Debug, Clone, PartialEq)]
pub enum RobotEvent {
    OrderStarted {
        robot: RobotId,
        order: OrderId,
        waypoints: usize,
    },
    ItemCollected {
        robot: RobotId,
        order: OrderId,
        item: ItemId,
        collected: usize,
        total: usize,
    },
    RouteRegenerated {
        robot: RobotId,
        order: OrderId,
        remaining: usize,
    },
    HeadingToCheckout {
        robot: RobotId,
        order: OrderId,
        checkout: usize,
    },
    Replanned {
        robot: RobotId,
        waypoints: usize,
    },
    Blocked {
        robot: RobotId,
    },
    OrderCompleted {
        robot: RobotId,
        order: OrderId,
        checkout: usize,
    },
}

#[derive(Debug, Clone, Default)]
pub struct AgentController {
    config: ControllerConfig,
}

impl AgentController {
    /// Step every robot once, in ascending id order.
    pub fn advance(&self, world: &mut World) -> Vec<RobotEvent> {
        let mut events = Vec::new();
        for index in 0..world.robots.len() {
            events.extend(self.advance_robot(world, index));
        }
        events
    }

    pub fn advance_robot(&self, world: &mut World, index: usize) -> Vec<RobotEvent> {
        let mut events = Vec::new();
        let Some(robot) = world.robots.get(index) else {
            return events;
        };

        match robot.state() {
            RobotState::Idle => {
                if robot.queue_len() > 0 {
                    events.extend(self.begin_next_order(world, index));
                }
            }
            RobotState::Collecting => self.step_collecting(world, index, &mut events),
            RobotState::Checkout => self.step_checkout(world, index, &mut events),
        }

        if let Some(robot) = world.robots.get_mut(index) {
            robot.repath_cooldown = robot.repath_cooldown.saturating_sub(1);
        }
        events
    }

    /// Start the head of an idle robot's queue: plan a tour over the order's
    /// items and install the expanded path.
    pub fn begin_next_order(&self, world: &mut World, index: usize) -> Option<RobotEvent> {
        let snapshots = world.snapshots();
        let World {
            facility,
            robots,
            orders,
            ..
        } = world;
        let robot = robots.get_mut(index)?;
        if !robot.is_idle() {
            return None;
        }
        let order = orders.get(robot.front_order()?.0)?;

        let locations = facility.item_locations(&order.items);
        if locations.is_empty() {
            warn!(
                "Order {} has no item with a known shelf location, robot {} cannot plan it",
                order.id, robot.id
            );
        }

        let path = plan_tour(facility, robot, &locations, &snapshots);
        let waypoints = path.len();
        if !robot.start_order(path) {
            return None;
        }

        info!(
            "Robot {} started order {} ({} items, {} waypoints)",
            robot.id,
            order.id,
            order.items.len(),
            waypoints
        );
        Some(RobotEvent::OrderStarted {
            robot: robot.id,
            order: order.id,
            waypoints,
        })
    }

    fn step_collecting(&self, world: &mut World, index: usize, events: &mut Vec<RobotEvent>) {
        let snapshots = world.snapshots();
        let World {
            facility,
            robots,
            orders,
            collision_count,
            ..
        } = world;
        let robot = &mut robots[index];
        let Some(order) = robot.current_order().and_then(|id| orders.get(id.0)) else {
            return;
        };

        self.follow_path(facility, robot, &snapshots, collision_count, events);
        self.collect_items(facility, robot, order, events);

        if order.is_fulfilled_by(robot.items_collected()) {
            let checkout = robot.assigned_checkout;
            let standoff = facility.standoff(checkout).unwrap_or(robot.home);
            let path = Pathfinder::new(facility).find_path(
                robot.position,
                standoff,
                Some(robot.id),
                &snapshots,
                true,
            );
            robot.begin_checkout(path);
            info!(
                "Robot {} collected all items for order {}, heading to checkout {}",
                robot.id,
                order.id,
                checkout + 1
            );
            events.push(RobotEvent::HeadingToCheckout {
                robot: robot.id,
                order: order.id,
                checkout,
            });
        } else if robot.path_exhausted() {
            let remaining: Vec<ItemId> = order
                .items
                .iter()
                .filter(|item| !robot.items_collected().contains(item))
                .copied()
                .collect();
            let locations = facility.item_locations(&remaining);
            if locations.is_empty() {
                warn!(
                    "Robot {} has {} unlocatable items left on order {}",
                    robot.id,
                    remaining.len(),
                    order.id
                );
                return;
            }

            let path = plan_tour(facility, robot, &locations, &snapshots);
            robot.install_path(path);
            debug!(
                "Robot {} regenerating path to {} remaining items",
                robot.id,
                remaining.len()
            );
            events.push(RobotEvent::RouteRegenerated {
                robot: robot.id,
                order: order.id,
                remaining: remaining.len(),
            });
        }
    }

    fn step_checkout(&self, world: &mut World, index: usize, events: &mut Vec<RobotEvent>) {
        let snapshots = world.snapshots();
        let World {
            facility,
            robots,
            orders,
            collision_count,
            ..
        } = world;
        let robot = &mut robots[index];

        self.follow_path(facility, robot, &snapshots, collision_count, events);

        if !robot.path_exhausted() {
            return;
        }
        let Some(order_id) = robot.finish_order() else {
            return;
        };
        if let Some(order) = orders.get_mut(order_id.0) {
            order.complete();
        }
        info!(
            "Robot {} completed order {} at checkout {}",
            robot.id,
            order_id,
            robot.assigned_checkout + 1
        );
        events.push(RobotEvent::OrderCompleted {
            robot: robot.id,
            order: order_id,
            checkout: robot.assigned_checkout,
        });
    }

    /// Move towards the current waypoint, sidestepping other robots.
    fn follow_path(
        &self,
        facility: &Facility,
        robot: &mut Robot,
        snapshots: &[RobotSnapshot],
        collision_count: &mut usize,
        events: &mut Vec<RobotEvent>,
    ) {
        let Some(target) = robot.current_target() else {
            return;
        };

        let distance = robot.position.distance(&target);
        if distance < self.config.arrival_radius {
            robot.position = target;
            robot.advance_target();
            return;
        }

        let step = self.config.speed.min(distance);
        let heading = robot.position.bearing_to(&target);
        let proposed = robot.position.offset_polar(step, heading);
        if is_clear(robot, proposed, snapshots) {
            robot.position = proposed;
            return;
        }

        *collision_count += 1;

        if robot.repath_cooldown == 0
            && let Some(&goal) = robot.path().last()
        {
            let path = Pathfinder::new(facility).find_path(
                robot.position,
                goal,
                Some(robot.id),
                snapshots,
                true,
            );
            debug!(
                "Robot {} blocked at {}, replanned {} waypoints to {}",
                robot.id,
                robot.position,
                path.len(),
                goal
            );
            events.push(RobotEvent::Replanned {
                robot: robot.id,
                waypoints: path.len(),
            });
            robot.replace_remaining(path);
            robot.repath_cooldown = self.config.repath_cooldown;
        }

        for offset in self.config.heading_offsets {
            let candidate = robot.position.offset_polar(step, heading + offset);
            if is_clear(robot, candidate, snapshots) {
                robot.position = candidate;
                return;
            }
        }

        events.push(RobotEvent::Blocked { robot: robot.id });
    }

    fn collect_items(
        &self,
        facility: &Facility,
        robot: &mut Robot,
        order: &Order,
        events: &mut Vec<RobotEvent>,
    ) {
        for &item in &order.items {
            if robot.items_collected().contains(&item) {
                continue;
            }
            let Some(location) = facility.item_location(item) else {
                continue;
            };
            if robot.position.distance(&location) < self.config.pickup_radius && robot.collect(item) {
                let collected = robot.items_collected().len();
                debug!(
                    "Robot {} collected {}. Total: {}/{}",
                    robot.id,
                    item,
                    collected,
                    order.items.len()
                );
                events.push(RobotEvent::ItemCollected {
                    robot: robot.id,
                    order: order.id,
                    item,
                    collected,
                    total: order.items.len(),
                });
            }
        }
    }
}

/// No other robot within two radii of `position`.
fn is_clear(robot: &Robot, position: Point, snapshots: &[RobotSnapshot]) -> bool {
    snapshots
        .iter()
        .filter(|other| other.id != robot.id)
        .all(|other| position.distance(&other.position) >= 2.0 * robot.radius)
}

/// Tour over `locations` from the robot's position, expanded into drivable
/// waypoints. Each leg drops its last point, the final stop is appended exactly.
fn plan_tour(
    facility: &Facility,
    robot: &Robot,
    locations: &[Point],
    snapshots: &[RobotSnapshot],
) -> Vec<Point> {
    let pathfinder = Pathfinder::new(facility);
    let route = RouteOptimizer::new(pathfinder).solve(locations, robot.position, Some(robot.id), snapshots);

    let mut path = Vec::new();
    for leg in route.stops.windows(2) {
        let segment = pathfinder.find_path(leg[0], leg[1], Some(robot.id), snapshots, true);
        if let Some((_, head)) = segment.split_last() {
            path.extend_from_slice(head);
        }
    }
    if !path.is_empty()
        && let Some(&last) = route.stops.last()
    {
        path.push(last);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Rect;
    use crate::state::OrderStatus;

    /// Open 40x40-cell floor with one checkout along the bottom and two products.
    fn open_world(robots: Vec<Robot>) -> World {
        let mut facility = Facility::open(40, 40, 10.0);
        facility.add_checkout(Rect::new(180.0, 370.0, 40.0, 30.0));
        facility.catalog.insert(ItemId(1), Point::new(105.0, 105.0));
        facility.catalog.insert(ItemId(2), Point::new(305.0, 105.0));
        World::new(facility, robots)
    }

    fn run_until<F: Fn(&World) -> bool>(controller: &AgentController, world: &mut World, done: F) -> usize {
        for tick in 0..5_000 {
            if done(world) {
                return tick;
            }
            controller.advance(world);
        }
        panic!("condition not reached in 5000 ticks");
    }

    #[test]
    fn test_single_item_order_lifecycle() {
        let mut world = open_world(vec![Robot::new(1, Point::new(205.0, 305.0), 10.0, 0)]);
        let controller = AgentController::default();

        let order = world.submit_order(vec![ItemId(1)], 0);
        world.order_mut(order).unwrap().assign();
        world.robots[0].enqueue(order);

        let events = controller.advance(&mut world);
        assert!(matches!(events[0], RobotEvent::OrderStarted { robot: 1, .. }));
        assert_eq!(world.robots[0].state(), RobotState::Collecting);
        assert_eq!(*world.robots[0].path().last().unwrap(), Point::new(105.0, 105.0));

        run_until(&controller, &mut world, |w| w.robots[0].state() == RobotState::Checkout);
        assert_eq!(world.robots[0].items_collected().len(), 1);
        assert_eq!(world.robots[0].target_index(), 0);

        run_until(&controller, &mut world, |w| w.robots[0].is_idle());
        assert_eq!(world.order(order).unwrap().status(), OrderStatus::Completed);
        assert_eq!(world.robots[0].queue_len(), 0);
        assert!(world.robots[0].path().is_empty());
        let standoff = world.facility.standoff(0).unwrap();
        assert!(world.robots[0].position.distance(&standoff) < 10.0);
    }

    #[test]
    fn test_pickup_is_idempotent() {
        let mut world = open_world(vec![Robot::new(1, Point::new(105.0, 105.0), 10.0, 0)]);
        let controller = AgentController::default();

        let order = world.submit_order(vec![ItemId(1), ItemId(2)], 0);
        world.robots[0].enqueue(order);
        controller.advance(&mut world);

        let mut collected_events = 0;
        for _ in 0..3 {
            let events = controller.advance(&mut world);
            collected_events += events
                .iter()
                .filter(|e| matches!(e, RobotEvent::ItemCollected { item: ItemId(1), .. }))
                .count();
        }
        assert_eq!(collected_events, 1);
        assert_eq!(world.robots[0].items_collected().len(), 1);

        // Coming back to the same shelf does not add it again
        world.robots[0].position = Point::new(106.0, 104.0);
        controller.advance(&mut world);
        assert_eq!(world.robots[0].items_collected().len(), 1);
        assert_eq!(world.robots[0].state(), RobotState::Collecting);
    }

    #[test]
    fn test_checkout_requires_every_item() {
        let mut world = open_world(vec![Robot::new(1, Point::new(105.0, 105.0), 10.0, 0)]);
        let controller = AgentController::default();

        let order = world.submit_order(vec![ItemId(1), ItemId(2)], 0);
        world.robots[0].enqueue(order);
        controller.advance(&mut world);
        controller.advance(&mut world);

        assert_eq!(world.robots[0].items_collected().len(), 1);
        assert_eq!(world.robots[0].state(), RobotState::Collecting);

        run_until(&controller, &mut world, |w| w.robots[0].state() == RobotState::Checkout);
        assert_eq!(world.robots[0].items_collected(), &world.order(order).unwrap().item_set());
    }

    #[test]
    fn test_exhausted_path_regenerates_remaining_items() {
        let mut world = open_world(vec![Robot::new(1, Point::new(205.0, 305.0), 10.0, 0)]);
        let controller = AgentController::default();

        let order = world.submit_order(vec![ItemId(2)], 0);
        world.robots[0].enqueue(order);
        controller.advance(&mut world);
        world.robots[0].install_path(Vec::new());

        let events = controller.advance(&mut world);
        assert!(events.contains(&RobotEvent::RouteRegenerated {
            robot: 1,
            order,
            remaining: 1,
        }));
        assert_eq!(*world.robots[0].path().last().unwrap(), Point::new(305.0, 105.0));
    }

    #[test]
    fn test_blocked_step_counts_collision_and_replans() {
        let mut world = open_world(vec![
            Robot::new(1, Point::new(100.0, 200.0), 10.0, 0),
            Robot::new(2, Point::new(118.0, 200.0), 10.0, 0),
        ]);
        let order = world.submit_order(vec![ItemId(2)], 0);
        world.robots[0].enqueue(order);
        world.robots[0].start_order(vec![Point::new(300.0, 200.0)]);
        let controller = AgentController::default();

        let events = controller.advance_robot(&mut world, 0);

        assert_eq!(world.collision_count, 1);
        assert!(matches!(events[0], RobotEvent::Replanned { robot: 1, .. }));
        assert_eq!(world.robots[0].repath_cooldown, 9);

        // Cooldown suppresses a second repath on the next blocked tick
        world.robots[0].position = Point::new(100.0, 200.0);
        world.robots[0].install_path(vec![Point::new(300.0, 200.0)]);
        let events = controller.advance_robot(&mut world, 0);
        assert!(!events.iter().any(|e| matches!(e, RobotEvent::Replanned { .. })));
        assert_eq!(world.collision_count, 2);
    }

    #[test]
    fn test_fully_boxed_robot_stays_put() {
        let mut world = open_world(vec![
            Robot::new(1, Point::new(200.0, 200.0), 10.0, 0),
            Robot::new(2, Point::new(201.0, 200.0), 10.0, 0),
        ]);
        let order = world.submit_order(vec![ItemId(2)], 0);
        world.robots[0].enqueue(order);
        world.robots[0].start_order(vec![Point::new(300.0, 200.0)]);
        world.robots[0].repath_cooldown = 5;
        let controller = AgentController::default();

        let events = controller.advance_robot(&mut world, 0);
        assert_eq!(events, vec![RobotEvent::Blocked { robot: 1 }]);
        assert_eq!(world.robots[0].position, Point::new(200.0, 200.0));
        assert_eq!(world.robots[0].repath_cooldown, 4);
    }

    fn heading_east_next_to(blocker: Point) -> World {
        let mut world = open_world(vec![
            Robot::new(1, Point::new(200.0, 200.0), 10.0, 0),
            Robot::new(2, blocker, 10.0, 0),
        ]);
        let order = world.submit_order(vec![ItemId(2)], 0);
        world.robots[0].enqueue(order);
        world.robots[0].start_order(vec![Point::new(300.0, 200.0)]);
        world.robots[0].repath_cooldown = 5;
        world
    }

    #[test]
    fn test_blocked_step_takes_first_clear_heading() {
        // Above and ahead: the direct step and +0.2 come within two radii, -0.2 does not
        let mut world = heading_east_next_to(Point::new(210.0, 218.0));
        let start = world.robots[0].position;
        let heading = start.bearing_to(&Point::new(300.0, 200.0));
        let controller = AgentController::default();

        let events = controller.advance_robot(&mut world, 0);

        assert_eq!(world.robots[0].position, start.offset_polar(2.0, heading - 0.2));
        assert_eq!(world.collision_count, 1);
        assert!(!events.contains(&RobotEvent::Blocked { robot: 1 }));
        assert!(world.robots[0].position.distance(&world.robots[1].position) >= 20.0);
    }

    #[test]
    fn test_positive_offset_wins_when_both_sides_clear() {
        // Straight ahead, just close enough to block only the direct step
        let mut world = heading_east_next_to(Point::new(221.98, 200.0));
        let start = world.robots[0].position;
        let heading = start.bearing_to(&Point::new(300.0, 200.0));
        let controller = AgentController::default();

        let events = controller.advance_robot(&mut world, 0);

        assert_eq!(world.robots[0].position, start.offset_polar(2.0, heading + 0.2));
        assert_eq!(world.collision_count, 1);
        assert!(events.is_empty());
    }
}
