use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::{debug, trace};

use crate::infra::{Cell, Point, Rect};
use crate::state::{Facility, NavigationGrid, RobotId, RobotSnapshot};

#[derive(Clone, PartialEq)]
struct Node {
    cell: Cell,
    f_score: f64,
}

impl Eq for Node {}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on f, then on cell so equal scores pop in a fixed order
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cell sequence found by A*, start to goal, with its accumulated step cost.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPath {
    pub cells: Vec<Cell>,
    pub cost: f64,
}

pub struct AStar;

impl AStar {
    /// 8-connected A* with 1.0 / 1.4 step costs and a Euclidean heuristic.
    /// The start cell itself does not need to be navigable.
    pub fn search(grid: &NavigationGrid, start: Cell, goal: Cell) -> Option<GridPath> {
        if start == goal {
            return Some(GridPath {
                cells: vec![goal],
                cost: 0.0,
            });
        }

        let mut open_set = BinaryHeap::new();
        let mut came_from: HashMap<Cell, Cell> = HashMap::new();
        let mut g_score: HashMap<Cell, f64> = HashMap::new();
        let mut closed_set: HashSet<Cell> = HashSet::new();

        g_score.insert(start, 0.0);
        open_set.push(Node {
            cell: start,
            f_score: start.distance(&goal),
        });

        let mut expansions = 0usize;

        while let Some(Node { cell: current, .. }) = open_set.pop() {
            if current == goal {
                trace!("A*: reached {:?} after {} expansions", goal, expansions);
                let cost = g_score.get(&current).copied().unwrap_or(0.0);
                return Some(GridPath {
                    cells: reconstruct_path(&came_from, current),
                    cost,
                });
            }

            if !closed_set.insert(current) {
                continue;
            }
            expansions += 1;

            let current_g = g_score.get(&current).copied().unwrap_or(f64::INFINITY);

            for (neighbor, step_cost) in current.neighbors() {
                if closed_set.contains(&neighbor) || !grid.is_navigable(&neighbor) {
                    continue;
                }

                let tentative_g = current_g + step_cost;
                if tentative_g < g_score.get(&neighbor).copied().unwrap_or(f64::INFINITY) {
                    came_from.insert(neighbor, current);
                    g_score.insert(neighbor, tentative_g);
                    open_set.push(Node {
                        cell: neighbor,
                        f_score: tentative_g + neighbor.distance(&goal),
                    });
                }
            }
        }

        trace!("A*: {:?} -> {:?} exhausted after {} expansions", start, goal, expansions);
        None
    }
}

fn reconstruct_path(came_from: &HashMap<Cell, Cell>, mut current: Cell) -> Vec<Cell> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

pub fn distance_between(a: &Point, b: &Point) -> f64 {
    a.distance(b)
}

/// Sum of the straight segments along `path`.
pub fn path_length(path: &[Point]) -> f64 {
    path.windows(2).map(|w| w[0].distance(&w[1])).sum()
}

#[derive(Debug, Clone, Copy)]
pub struct PathfinderConfig {
    /// Square radius, in cells, blocked around every other robot
    pub avoidance_radius: i32,
    /// Way-candidates sampled along each lane for the detour search
    pub detour_points_per_lane: i32,
    /// Upper bound on way-candidates considered by one detour search
    pub max_detour_candidates: usize,
    /// Distance from the top wall of the terminal margin route
    pub margin: f64,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            avoidance_radius: 2,
            detour_points_per_lane: 5,
            max_detour_candidates: 12,
            margin: 50.0,
        }
    }
}

/// Grid planner with robot avoidance and a fallback chain that always yields a route.
#[derive(Clone, Copy)]
pub struct Pathfinder<'a> {
    grid: &'a NavigationGrid,
    lanes: &'a [Rect],
    config: PathfinderConfig,
}

impl<'a> Pathfinder<'a> {
    pub fn new(facility: &'a Facility) -> Self {
        Self::with_config(facility, PathfinderConfig::default())
    }

    pub fn with_config(facility: &'a Facility, config: PathfinderConfig) -> Self {
        Self {
            grid: &facility.grid,
            lanes: &facility.lanes,
            config,
        }
    }

    /// Cell used for planning from `point`: clamped into the grid and moved off blocked cells.
    pub fn snap(&self, point: Point) -> Cell {
        let cell = self.grid.clamp(self.grid.cell_at(point));
        self.grid.nearest_navigable(cell)
    }

    /// Waypoints from `start` to `end`, never fewer than two.
    ///
    /// With `avoid_robots` set and a `robot_id` given, cells around every other
    /// robot are treated as blocked for this call only. If no path exists under
    /// those exclusions the static grid is searched through lane detours, and
    /// if that fails too a margin route is returned.
    #[tracing::instrument(level = "trace", skip(self, robots))]
    pub fn find_path(
        &self,
        start: Point,
        end: Point,
        robot_id: Option<RobotId>,
        robots: &[RobotSnapshot],
        avoid_robots: bool,
    ) -> Vec<Point> {
        let start_cell = self.snap(start);
        let end_cell = self.snap(end);

        let working: Cow<'_, NavigationGrid> = match robot_id {
            Some(id) if avoid_robots => Cow::Owned(self.exclusion_grid(id, robots)),
            _ => Cow::Borrowed(self.grid),
        };

        if let Some(path) = AStar::search(&working, start_cell, end_cell) {
            return self.waypoints(&path.cells);
        }

        debug!(
            "No path {:?} -> {:?} for robot {:?} around other robots, trying lane detours",
            start_cell, end_cell, robot_id
        );
        if let Some(path) = self.detour(start_cell, end_cell) {
            return path;
        }

        debug!(
            "No detour {:?} -> {:?}, falling back to the margin route",
            start_cell, end_cell
        );
        self.margin_route(start, end)
    }

    /// Copy of the static grid with a square block around every robot but `robot_id`.
    fn exclusion_grid(&self, robot_id: RobotId, robots: &[RobotSnapshot]) -> NavigationGrid {
        let mut grid = self.grid.clone();
        let radius = self.config.avoidance_radius;

        for other in robots.iter().filter(|r| r.id != robot_id) {
            let center = self.grid.cell_at(other.position);
            for dx in -radius..=radius {
                for dy in -radius..=radius {
                    grid.set_navigable(&Cell::new(center.x + dx, center.y + dy), false);
                }
            }
        }

        grid
    }

    fn waypoints(&self, cells: &[Cell]) -> Vec<Point> {
        let mut points: Vec<Point> = cells.iter().map(|c| self.grid.cell_center(*c)).collect();
        if points.len() == 1 {
            points.push(points[0]);
        }
        points
    }

    /// Static way-candidates along the lane centre lines, nearest-first for this query.
    fn detour_candidates(&self, start: Cell, end: Cell) -> Vec<Cell> {
        let per_lane = self.config.detour_points_per_lane;
        let mut candidates: Vec<Cell> = Vec::new();

        for lane in self.lanes {
            let center_x = lane.center().x;
            for i in 1..=per_lane {
                let y = lane.y + (lane.height * f64::from(i) / f64::from(per_lane + 1)).floor();
                let cell = self.grid.cell_at(Point::new(center_x, y));
                if self.grid.is_navigable(&cell) && !candidates.contains(&cell) {
                    candidates.push(cell);
                }
            }
        }

        candidates.sort_by(|a, b| {
            let da = start.distance(a) + a.distance(&end);
            let db = start.distance(b) + b.distance(&end);
            da.total_cmp(&db)
        });
        candidates.truncate(self.config.max_detour_candidates);
        candidates
    }

    /// Shortest static route made of at most three A* legs through way-candidates.
    fn detour(&self, start: Cell, end: Cell) -> Option<Vec<Point>> {
        let candidates = self.detour_candidates(start, end);
        let leg = |a: Cell, b: Cell| AStar::search(self.grid, a, b).map(|p| p.cells);
        let mut best = BestRoute::new(self.grid.cell_size());

        if let Some(direct) = leg(start, end) {
            best.offer(direct);
        }

        let heads: Vec<Option<Vec<Cell>>> = candidates.iter().map(|&w| leg(start, w)).collect();
        let tails: Vec<Option<Vec<Cell>>> = candidates.iter().map(|&w| leg(w, end)).collect();

        for (i, &first) in candidates.iter().enumerate() {
            let Some(head) = &heads[i] else {
                continue;
            };

            if let Some(tail) = &tails[i] {
                best.offer(join_legs(&[head, tail]));
            }

            for (j, &second) in candidates.iter().enumerate() {
                if i == j {
                    continue;
                }
                let Some(tail) = &tails[j] else {
                    continue;
                };
                // Straight-line lower bound; a leg can never be shorter than it
                let bound = start.distance(&first) + first.distance(&second) + second.distance(&end);
                if !best.could_improve(bound) {
                    continue;
                }
                if let Some(middle) = leg(first, second) {
                    best.offer(join_legs(&[head, &middle, tail]));
                }
            }
        }

        best.into_cells().map(|cells| self.waypoints(&cells))
    }

    /// Up to the top margin, across, and down to the goal.
    fn margin_route(&self, start: Point, end: Point) -> Vec<Point> {
        let margin = self.config.margin;
        vec![
            start,
            Point::new(start.x, margin),
            Point::new(end.x, margin),
            end,
        ]
    }
}

/// Concatenate legs whose boundaries coincide, keeping each boundary cell once.
fn join_legs(legs: &[&Vec<Cell>]) -> Vec<Cell> {
    let mut cells: Vec<Cell> = Vec::new();
    for leg in legs {
        let skip = usize::from(!cells.is_empty());
        cells.extend(leg.iter().skip(skip));
    }
    cells
}

struct BestRoute {
    cell_size: f64,
    length: f64,
    cells: Option<Vec<Cell>>,
}

impl BestRoute {
    fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            length: f64::INFINITY,
            cells: None,
        }
    }

    /// `bound` is in cell units.
    fn could_improve(&self, bound: f64) -> bool {
        bound * self.cell_size < self.length
    }

    fn offer(&mut self, cells: Vec<Cell>) {
        let length: f64 = cells.windows(2).map(|w| w[0].distance(&w[1])).sum::<f64>() * self.cell_size;
        if length < self.length {
            self.length = length;
            self.cells = Some(cells);
        }
    }

    fn into_cells(self) -> Option<Vec<Cell>> {
        self.cells
    }
}
