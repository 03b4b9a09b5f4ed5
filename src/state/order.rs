use std::collections::BTreeSet;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::state::Facility;

/// Product identifier; one product per shelf slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// Index of an order inside `World::orders`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderId(pub usize);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Assigned,
    Completed,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub items: Vec<ItemId>,
    pub checkout: usize,
    status: OrderStatus,
}

impl Order {
    pub fn new(id: OrderId, items: Vec<ItemId>, checkout: usize) -> Self {
        Self {
            id,
            items,
            checkout,
            status: OrderStatus::Pending,
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// Pending -> Assigned. Returns false if the order was not pending.
    pub fn assign(&mut self) -> bool {
        if self.status != OrderStatus::Pending {
            tracing::debug!("Order {} cannot be assigned from {:?}", self.id, self.status);
            return false;
        }
        self.status = OrderStatus::Assigned;
        true
    }

    /// Assigned -> Completed. Returns false if the order was not assigned.
    pub fn complete(&mut self) -> bool {
        if self.status != OrderStatus::Assigned {
            tracing::debug!("Order {} cannot be completed from {:?}", self.id, self.status);
            return false;
        }
        self.status = OrderStatus::Completed;
        true
    }

    pub fn item_set(&self) -> BTreeSet<ItemId> {
        self.items.iter().copied().collect()
    }

    pub fn is_fulfilled_by(&self, collected: &BTreeSet<ItemId>) -> bool {
        *collected == self.item_set()
    }
}

/// Random order source: a subset of catalog items and a checkout.
#[derive(Debug, Clone)]
pub struct OrderGenerator {
    rng: StdRng,
    max_items: usize,
}

impl OrderGenerator {
    pub const DEFAULT_MAX_ITEMS: usize = 10;

    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_items: Self::DEFAULT_MAX_ITEMS,
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.max(1);
        self
    }

    /// Draw `(items, checkout)` for a new order. Items are distinct.
    pub fn next_order(&mut self, facility: &Facility) -> (Vec<ItemId>, usize) {
        let products: Vec<ItemId> = facility.catalog.keys().copied().collect();
        let upper = self.max_items.min(products.len());
        let items = if upper == 0 {
            Vec::new()
        } else {
            let count = self.rng.random_range(1..=upper);
            products
                .choose_multiple(&mut self.rng, count)
                .copied()
                .collect()
        };

        let checkout = if facility.checkouts.is_empty() {
            0
        } else {
            self.rng.random_range(0..facility.checkouts.len())
        };

        (items, checkout)
    }
}
