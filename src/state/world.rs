use crate::state::{Facility, ItemId, Order, OrderId, OrderStatus, Robot, RobotSnapshot};

/// Everything the simulation mutates, passed explicitly to each component.
#[derive(Debug, Clone)]
pub struct World {
    pub facility: Facility,
    /// Sorted by ascending id; this is the per-tick update order.
    pub robots: Vec<Robot>,
    /// Every order ever submitted, indexed by `OrderId`.
    pub orders: Vec<Order>,
    pub collision_count: usize,
    pub tick: u64,
}

impl World {
    pub fn new(facility: Facility, mut robots: Vec<Robot>) -> Self {
        robots.sort_by_key(|r| r.id);
        Self {
            facility,
            robots,
            orders: Vec::new(),
            collision_count: 0,
            tick: 0,
        }
    }

    pub fn submit_order(&mut self, items: Vec<ItemId>, checkout: usize) -> OrderId {
        let id = OrderId(self.orders.len());
        self.orders.push(Order::new(id, items, checkout));
        id
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(id.0)
    }

    pub fn order_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.get_mut(id.0)
    }

    pub fn snapshots(&self) -> Vec<RobotSnapshot> {
        self.robots.iter().map(Robot::snapshot).collect()
    }

    pub fn count_orders(&self, status: OrderStatus) -> usize {
        self.orders.iter().filter(|o| o.status() == status).count()
    }

    /// Orders submitted but not yet completed.
    pub fn outstanding_orders(&self) -> usize {
        self.orders
            .iter()
            .filter(|o| o.status() != OrderStatus::Completed)
            .count()
    }

    /// No pending work anywhere: backlog drained and every robot idle with an empty queue.
    pub fn is_quiescent(&self) -> bool {
        self.count_orders(OrderStatus::Pending) == 0
            && self.robots.iter().all(|r| r.is_idle() && r.queue_len() == 0)
    }

    /// Robots back home, orders and counters cleared. The facility is untouched.
    pub fn reset(&mut self) {
        for robot in &mut self.robots {
            robot.reset();
        }
        self.orders.clear();
        self.collision_count = 0;
        self.tick = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Point;

    #[test]
    fn test_robots_sorted_by_id() {
        let robots = vec![
            Robot::new(3, Point::new(10.0, 10.0), 5.0, 0),
            Robot::new(1, Point::new(20.0, 20.0), 5.0, 0),
            Robot::new(2, Point::new(30.0, 30.0), 5.0, 0),
        ];
        let world = World::new(Facility::open(10, 10, 10.0), robots);
        let ids: Vec<_> = world.robots.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_quiescent_until_orders_arrive() {
        let mut world = World::new(
            Facility::open(10, 10, 10.0),
            vec![Robot::new(1, Point::new(10.0, 10.0), 5.0, 0)],
        );
        assert!(world.is_quiescent());

        let id = world.submit_order(vec![ItemId(1)], 0);
        assert_eq!(id, OrderId(0));
        assert!(!world.is_quiescent());
        assert_eq!(world.outstanding_orders(), 1);

        world.reset();
        assert!(world.orders.is_empty());
        assert!(world.is_quiescent());
    }
}
