use std::collections::BTreeMap;

use crate::infra::{Point, Rect};
use crate::state::{ItemId, NavigationGrid};

/// Distance from a checkout's centre to the point robots approach it from.
pub const STANDOFF_OFFSET: f64 = 40.0;

/// Read-only facility geometry consumed by the planners.
#[derive(Debug, Clone)]
pub struct Facility {
    pub grid: NavigationGrid,
    pub width: f64,
    pub height: f64,
    /// Free-standing obstacles, the only geometry the motion policy senses.
    pub obstacles: Vec<Rect>,
    pub shelves: Vec<Rect>,
    /// Open lanes between shelf rows; detour candidates are taken along them.
    pub lanes: Vec<Rect>,
    pub checkouts: Vec<Rect>,
    /// Product -> shelf pickup coordinate.
    pub catalog: BTreeMap<ItemId, Point>,
}

impl Facility {
    /// Empty, fully navigable facility of `cols` x `rows` cells.
    pub fn open(cols: i32, rows: i32, cell_size: f64) -> Self {
        let grid = NavigationGrid::new(cols, rows, cell_size);
        Self {
            width: grid.world_width(),
            height: grid.world_height(),
            grid,
            obstacles: Vec::new(),
            shelves: Vec::new(),
            lanes: Vec::new(),
            checkouts: Vec::new(),
            catalog: BTreeMap::new(),
        }
    }

    pub fn add_obstacle(&mut self, rect: Rect) {
        self.grid.block_rect(&rect);
        self.obstacles.push(rect);
    }

    pub fn add_shelf(&mut self, rect: Rect) {
        self.grid.block_rect(&rect);
        self.shelves.push(rect);
    }

    pub fn add_checkout(&mut self, rect: Rect) {
        self.grid.block_rect(&rect);
        self.checkouts.push(rect);
    }

    pub fn item_location(&self, item: ItemId) -> Option<Point> {
        self.catalog.get(&item).copied()
    }

    /// Pickup coordinates for `items`, skipping products without a shelf.
    pub fn item_locations<'a>(&self, items: impl IntoIterator<Item = &'a ItemId>) -> Vec<Point> {
        items
            .into_iter()
            .filter_map(|item| self.item_location(*item))
            .collect()
    }

    /// Approach point in front of checkout `index`.
    pub fn standoff(&self, index: usize) -> Option<Point> {
        self.checkouts.get(index).map(|rect| {
            let center = rect.center();
            Point::new(center.x, center.y - STANDOFF_OFFSET)
        })
    }

    pub fn hits_obstacle(&self, point: &Point) -> bool {
        self.obstacles.iter().any(|o| o.contains(point))
    }

    pub fn in_bounds(&self, point: &Point) -> bool {
        point.x > 0.0 && point.x < self.width && point.y > 0.0 && point.y < self.height
    }
}
