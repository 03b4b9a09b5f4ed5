use crate::infra::Point;
use crate::state::{Facility, Order, Robot, RobotSnapshot, RobotState};

#[derive(Debug, Clone)]
pub struct RewardConfig {
    pub collect_item: f64,
    pub complete_order: f64,
    pub collision: f64,
    pub idle: f64,
    pub approaching_target: f64,
    pub away_from_target: f64,
    pub checkout: f64,
    /// Applied per already-rewarded item the robot is still lingering at
    pub revisit: f64,
    pub pickup_radius: f64,
    pub checkout_radius: f64,
    /// How far in front of the checkout centre the reward point sits
    pub checkout_offset: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            collect_item: 100.0,
            complete_order: 200.0,
            collision: -100.0,
            idle: 0.0,
            approaching_target: 15.0,
            away_from_target: -10.0,
            checkout: 150.0,
            revisit: -2.0,
            pickup_radius: 20.0,
            checkout_radius: 30.0,
            checkout_offset: 20.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RewardModel {
    config: RewardConfig,
}

impl RewardModel {
    pub fn is_collision(&self, reward: f64) -> bool {
        reward <= self.config.collision
    }

    /// Reward for moving `robot` from `old` to `new`. Collisions short-circuit
    /// every other component. Items near `new` get flagged on the robot so each
    /// one pays out once per order.
    pub fn evaluate(
        &self,
        robot: &mut Robot,
        order: Option<&Order>,
        facility: &Facility,
        others: &[RobotSnapshot],
        old: Point,
        new: Point,
    ) -> f64 {
        let cfg = &self.config;
        let mut reward = 0.0;

        if old == new {
            reward += cfg.idle;
        }

        if facility.hits_obstacle(&new) {
            return reward + cfg.collision;
        }
        let crowded = others
            .iter()
            .filter(|other| other.id != robot.id)
            .any(|other| new.distance(&other.position) < 2.0 * robot.radius);
        if crowded {
            return reward + cfg.collision;
        }

        if let Some(order) = order {
            for &item in &order.items {
                if robot.rewarded_items().contains(&item) {
                    continue;
                }
                let near = facility
                    .item_location(item)
                    .is_some_and(|location| new.distance(&location) < cfg.pickup_radius);
                if near && robot.flag_rewarded(item) {
                    reward += cfg.collect_item;
                }
            }
        }

        let lingering = robot
            .rewarded_items()
            .iter()
            .filter_map(|item| facility.item_location(*item))
            .filter(|location| new.distance(location) < cfg.pickup_radius)
            .count();
        reward += cfg.revisit * lingering as f64;

        let at_final_waypoint = robot.target_index() >= robot.path().len().saturating_sub(1);
        if robot.state() == RobotState::Checkout
            && at_final_waypoint
            && let Some(order) = order
            && let Some(rect) = facility.checkouts.get(order.checkout)
        {
            let center = rect.center();
            let reward_point = Point::new(center.x, center.y - cfg.checkout_offset);
            if new.distance(&reward_point) < cfg.checkout_radius {
                reward += cfg.checkout;
                if order.is_fulfilled_by(robot.items_collected()) {
                    reward += cfg.complete_order;
                }
            }
        }

        if let Some(target) = robot.current_target() {
            if new.distance(&target) < old.distance(&target) {
                reward += cfg.approaching_target;
            } else {
                reward += cfg.away_from_target;
            }
        }

        reward
    }
}
