//! Warehouse floor plan: lanes flanked by shelves, checkouts along the bottom
//! edge and a handful of free-standing obstacles.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::infra::{Point, Rect};
use crate::state::{Facility, ItemId, Robot, World};

const LANE_WIDTH: f64 = 40.0;
const SHELF_WIDTH: f64 = 20.0;
const SHELF_LENGTH: f64 = 60.0;
const MARGIN: f64 = 40.0;
const CHECKOUT_WIDTH: f64 = 40.0;
const CHECKOUT_HEIGHT: f64 = 30.0;
const CHECKOUT_COUNT: usize = 3;
const OBSTACLE_SIZE: f64 = 30.0;
const MAX_PLACEMENT_ATTEMPTS: usize = 1000;
/// Robots spawn this far above their checkout's centre.
const SPAWN_OFFSET: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct FacilityBuilder {
    pub width: f64,
    pub height: f64,
    pub aisles: usize,
    pub shelves_per_aisle: usize,
    pub cell_size: f64,
    pub obstacles: usize,
    pub robots: usize,
    pub robot_radius: f64,
    pub seed: u64,
}

impl Default for FacilityBuilder {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            aisles: 8,
            shelves_per_aisle: 6,
            cell_size: 10.0,
            obstacles: 10,
            robots: 3,
            robot_radius: 10.0,
            seed: 0,
        }
    }
}

impl FacilityBuilder {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_obstacles(mut self, obstacles: usize) -> Self {
        self.obstacles = obstacles;
        self
    }

    pub fn with_robots(mut self, robots: usize) -> Self {
        self.robots = robots;
        self
    }

    #[tracing::instrument(level = "debug", skip(self), fields(seed = self.seed))]
    pub fn build(&self) -> Facility {
        let cols = (self.width / self.cell_size) as i32;
        let rows = (self.height / self.cell_size) as i32;
        let mut facility = Facility::open(cols, rows, self.cell_size);
        facility.width = self.width;
        facility.height = self.height;

        self.add_aisles(&mut facility);
        self.add_checkouts(&mut facility);
        self.add_obstacles(&mut facility);

        debug!(
            "Facility {}x{}: {} shelves, {} lanes, {} obstacles, {} products, {} navigable cells",
            self.width,
            self.height,
            facility.shelves.len(),
            facility.lanes.len(),
            facility.obstacles.len(),
            facility.catalog.len(),
            facility.grid.navigable_count()
        );

        facility
    }

    /// Facility plus robots parked in front of their checkouts.
    pub fn build_world(&self) -> World {
        let facility = self.build();
        let robots = self.spawn_robots(&facility);
        World::new(facility, robots)
    }

    fn add_aisles(&self, facility: &mut Facility) {
        let aisle_spacing = (self.width - 2.0 * MARGIN) / (self.aisles as f64 + 1.0);
        let shelf_spacing = (self.height - 2.0 * MARGIN) / (self.shelves_per_aisle as f64 + 1.0);
        let slots_per_aisle = 2 * self.shelves_per_aisle as u32;

        for aisle in 0..self.aisles {
            let aisle_x = MARGIN + aisle_spacing * (aisle as f64 + 1.0);
            facility.lanes.push(pixel_rect(
                aisle_x - LANE_WIDTH / 2.0,
                MARGIN,
                LANE_WIDTH,
                self.height - 2.0 * MARGIN,
            ));

            for shelf in 0..self.shelves_per_aisle {
                let shelf_y = MARGIN + shelf_spacing * (shelf as f64 + 1.0);
                let base = aisle as u32 * slots_per_aisle + 2 * shelf as u32;

                facility.add_shelf(pixel_rect(
                    aisle_x - LANE_WIDTH / 2.0 - SHELF_WIDTH,
                    shelf_y - SHELF_LENGTH / 2.0,
                    SHELF_WIDTH,
                    SHELF_LENGTH,
                ));
                facility
                    .catalog
                    .insert(ItemId(base), Point::new(aisle_x - LANE_WIDTH / 4.0, shelf_y));

                facility.add_shelf(pixel_rect(
                    aisle_x + LANE_WIDTH / 2.0,
                    shelf_y - SHELF_LENGTH / 2.0,
                    SHELF_WIDTH,
                    SHELF_LENGTH,
                ));
                facility
                    .catalog
                    .insert(ItemId(base + 1), Point::new(aisle_x + LANE_WIDTH / 4.0, shelf_y));
            }
        }
    }

    fn add_checkouts(&self, facility: &mut Facility) {
        let spacing = self.width / (CHECKOUT_COUNT as f64 + 1.0);
        for i in 0..CHECKOUT_COUNT {
            let x = spacing * (i as f64 + 1.0) - CHECKOUT_WIDTH / 2.0;
            let y = self.height - MARGIN / 2.0 - CHECKOUT_HEIGHT / 2.0;
            facility.add_checkout(pixel_rect(x, y, CHECKOUT_WIDTH, CHECKOUT_HEIGHT));
        }
    }

    fn add_obstacles(&self, facility: &mut Facility) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let lo = 50;
        let hi_x = (self.width as i64 - 50).max(lo);
        let hi_y = (self.height as i64 - 50).max(lo);

        for _ in 0..self.obstacles {
            let placed = (0..MAX_PLACEMENT_ATTEMPTS).find_map(|_| {
                let x = rng.random_range(lo..=hi_x) as f64;
                let y = rng.random_range(lo..=hi_y) as f64;
                let rect = Rect::new(
                    x - OBSTACLE_SIZE / 2.0,
                    y - OBSTACLE_SIZE / 2.0,
                    OBSTACLE_SIZE,
                    OBSTACLE_SIZE,
                );
                let clear = facility
                    .shelves
                    .iter()
                    .chain(&facility.checkouts)
                    .chain(&facility.lanes)
                    .all(|other| !other.intersects(&rect));
                clear.then_some(rect)
            });

            match placed {
                Some(rect) => facility.add_obstacle(rect),
                None => debug!("No free spot for obstacle after {} attempts", MAX_PLACEMENT_ATTEMPTS),
            }
        }
    }

    fn spawn_robots(&self, facility: &Facility) -> Vec<Robot> {
        (0..self.robots)
            .map(|i| {
                let checkout = if facility.checkouts.is_empty() {
                    0
                } else {
                    i % facility.checkouts.len()
                };
                let home = facility
                    .checkouts
                    .get(checkout)
                    .map(|rect| {
                        let center = rect.center();
                        Point::new(center.x, center.y - SPAWN_OFFSET)
                    })
                    .unwrap_or_else(|| Point::new(MARGIN, MARGIN));
                Robot::new(i + 1, home, self.robot_radius, checkout)
            })
            .collect()
    }
}

/// Rectangles snap to whole pixels like the original floor plan.
fn pixel_rect(x: f64, y: f64, width: f64, height: f64) -> Rect {
    Rect::new(x.trunc(), y.trunc(), width.trunc(), height.trunc())
}
