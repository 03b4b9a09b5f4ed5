use tracing::debug;

use crate::infra::pathfinding::{distance_between, path_length};
use crate::infra::{Pathfinder, Point};
use crate::state::{RobotId, RobotSnapshot};

/// Stops in visiting order, the start included.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub stops: Vec<Point>,
    pub total_distance: f64,
}

impl Route {
    fn empty() -> Self {
        Self {
            stops: Vec::new(),
            total_distance: 0.0,
        }
    }
}

/// Cheapest-insertion tour over pickup locations. Heuristic, not optimal.
pub struct RouteOptimizer<'a> {
    pathfinder: Pathfinder<'a>,
}

impl<'a> RouteOptimizer<'a> {
    pub fn new(pathfinder: Pathfinder<'a>) -> Self {
        Self { pathfinder }
    }

    #[tracing::instrument(level = "debug", skip(self, locations, robots), fields(stops = locations.len()))]
    pub fn solve(
        &self,
        locations: &[Point],
        start: Point,
        robot_id: Option<RobotId>,
        robots: &[RobotSnapshot],
    ) -> Route {
        match locations {
            [] => Route::empty(),
            [only] => Route {
                stops: vec![start, *only],
                total_distance: distance_between(&start, only),
            },
            _ => {
                let mut nodes = Vec::with_capacity(locations.len() + 1);
                nodes.push(start);
                nodes.extend_from_slice(locations);

                let matrix = self.distance_matrix(&nodes, robot_id, robots);
                let order = cheapest_insertion(&matrix);
                let total_distance = order.windows(2).map(|w| matrix[w[0]][w[1]]).sum();

                debug!("Route over {} stops, {:.1} units", locations.len(), total_distance);
                Route {
                    stops: order.iter().map(|&i| nodes[i]).collect(),
                    total_distance,
                }
            }
        }
    }

    /// Symmetric matrix of planned (robot-unaware) path lengths between `nodes`.
    pub fn distance_matrix(
        &self,
        nodes: &[Point],
        robot_id: Option<RobotId>,
        robots: &[RobotSnapshot],
    ) -> Vec<Vec<f64>> {
        let n = nodes.len();
        let mut matrix = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let path = self
                    .pathfinder
                    .find_path(nodes[i], nodes[j], robot_id, robots, false);
                let length = path_length(&path);
                matrix[i][j] = length;
                matrix[j][i] = length;
            }
        }
        matrix
    }
}

/// Visiting order over matrix indices, starting at node 0.
fn cheapest_insertion(matrix: &[Vec<f64>]) -> Vec<usize> {
    let n = matrix.len();
    if n < 2 {
        return (0..n).collect();
    }

    let mut nearest = 1;
    for node in 2..n {
        if matrix[0][node] < matrix[0][nearest] {
            nearest = node;
        }
    }

    let mut route = vec![0, nearest];
    let mut unvisited: Vec<usize> = (1..n).filter(|&node| node != nearest).collect();

    while !unvisited.is_empty() {
        let mut best: Option<(f64, usize, usize)> = None;

        for (slot, &node) in unvisited.iter().enumerate() {
            for pos in 0..route.len() - 1 {
                let (prev, next) = (route[pos], route[pos + 1]);
                let cost = matrix[prev][node] + matrix[node][next] - matrix[prev][next];
                if best.is_none_or(|(best_cost, _, _)| cost < best_cost) {
                    best = Some((cost, slot, pos + 1));
                }
            }
        }

        let Some((_, slot, insert_at)) = best else {
            break;
        };
        let node = unvisited.remove(slot);
        route.insert(insert_at, node);
    }

    route
}
