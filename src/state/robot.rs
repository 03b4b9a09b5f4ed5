use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use crate::infra::Point;
use crate::state::{ItemId, OrderId};

pub type RobotId = usize;

/// Maximum number of orders a robot can hold, the current one included.
pub const QUEUE_CAPACITY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RobotState {
    Idle,
    Collecting,
    Checkout,
}

impl RobotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotState::Idle => "idle",
            RobotState::Collecting => "collecting",
            RobotState::Checkout => "checkout",
        }
    }
}

impl fmt::Display for RobotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RobotState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_matches('\'') {
            "idle" => Ok(RobotState::Idle),
            "collecting" => Ok(RobotState::Collecting),
            "checkout" => Ok(RobotState::Checkout),
            other => Err(format!("unknown robot state '{}'", other)),
        }
    }
}

/// What other robots need to know about a robot: where it is and how big it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotSnapshot {
    pub id: RobotId,
    pub position: Point,
    pub radius: f64,
}

#[derive(Debug, Clone)]
pub struct Robot {
    pub id: RobotId,
    pub position: Point,
    pub radius: f64,
    /// Spawn position, restored on reset
    pub home: Point,
    pub assigned_checkout: usize,
    /// Cumulative motion-policy reward
    pub reward: f64,
    /// Ticks left before a collision may trigger another repath
    pub repath_cooldown: u32,
    state: RobotState,
    order_queue: VecDeque<OrderId>,
    path: Vec<Point>,
    target_index: usize,
    items_collected: BTreeSet<ItemId>,
    rewarded_items: BTreeSet<ItemId>,
}

impl Robot {
    pub fn new(id: RobotId, home: Point, radius: f64, assigned_checkout: usize) -> Self {
        Self {
            id,
            position: home,
            radius,
            home,
            assigned_checkout,
            reward: 0.0,
            repath_cooldown: 0,
            state: RobotState::Idle,
            order_queue: VecDeque::with_capacity(QUEUE_CAPACITY),
            path: Vec::new(),
            target_index: 0,
            items_collected: BTreeSet::new(),
            rewarded_items: BTreeSet::new(),
        }
    }

    /// Back to the spawn position with no orders, path or reward.
    pub fn reset(&mut self) {
        self.position = self.home;
        self.reward = 0.0;
        self.repath_cooldown = 0;
        self.state = RobotState::Idle;
        self.order_queue.clear();
        self.path.clear();
        self.target_index = 0;
        self.items_collected.clear();
        self.rewarded_items.clear();
    }

    pub fn snapshot(&self) -> RobotSnapshot {
        RobotSnapshot {
            id: self.id,
            position: self.position,
            radius: self.radius,
        }
    }

    pub fn state(&self) -> RobotState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == RobotState::Idle
    }

    pub fn queue_len(&self) -> usize {
        self.order_queue.len()
    }

    /// Head of the queue; the order being worked on once the robot is busy.
    pub fn front_order(&self) -> Option<OrderId> {
        self.order_queue.front().copied()
    }

    pub fn current_order(&self) -> Option<OrderId> {
        if self.is_idle() {
            None
        } else {
            self.front_order()
        }
    }

    /// Append an order. Returns false when the queue is full.
    pub fn enqueue(&mut self, order: OrderId) -> bool {
        if self.order_queue.len() >= QUEUE_CAPACITY {
            return false;
        }
        self.order_queue.push_back(order);
        true
    }

    /// Idle -> Collecting for the head order. Returns false if there is nothing to start.
    pub fn start_order(&mut self, path: Vec<Point>) -> bool {
        if !self.is_idle() || self.order_queue.is_empty() {
            return false;
        }
        self.state = RobotState::Collecting;
        self.items_collected.clear();
        self.rewarded_items.clear();
        self.install_path(path);
        true
    }

    /// Collecting -> Checkout with a fresh path to the checkout.
    pub fn begin_checkout(&mut self, path: Vec<Point>) -> bool {
        if self.state != RobotState::Collecting {
            return false;
        }
        self.state = RobotState::Checkout;
        self.install_path(path);
        true
    }

    /// Checkout -> Idle, popping the finished order.
    pub fn finish_order(&mut self) -> Option<OrderId> {
        if self.state != RobotState::Checkout {
            return None;
        }
        self.state = RobotState::Idle;
        self.path.clear();
        self.target_index = 0;
        self.order_queue.pop_front()
    }

    pub fn path(&self) -> &[Point] {
        &self.path
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn current_target(&self) -> Option<Point> {
        self.path.get(self.target_index).copied()
    }

    pub fn path_exhausted(&self) -> bool {
        self.target_index >= self.path.len()
    }

    pub fn install_path(&mut self, path: Vec<Point>) {
        self.path = path;
        self.target_index = 0;
    }

    /// Swap everything from the current target onwards for `path`; the index is kept.
    pub fn replace_remaining(&mut self, path: Vec<Point>) {
        self.path.truncate(self.target_index);
        self.path.extend(path);
    }

    pub fn advance_target(&mut self) {
        if self.target_index < self.path.len() {
            self.target_index += 1;
        }
    }

    pub fn items_collected(&self) -> &BTreeSet<ItemId> {
        &self.items_collected
    }

    /// Returns true if the item was not collected before.
    pub fn collect(&mut self, item: ItemId) -> bool {
        self.items_collected.insert(item)
    }

    pub fn rewarded_items(&self) -> &BTreeSet<ItemId> {
        &self.rewarded_items
    }

    /// Returns true the first time an item is flagged for this order.
    pub fn flag_rewarded(&mut self, item: ItemId) -> bool {
        self.rewarded_items.insert(item)
    }
}
