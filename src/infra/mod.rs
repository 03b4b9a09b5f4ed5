mod default_observer;
pub mod pathfinding;
pub mod route;
mod simulation_observer;
mod types;

pub use default_observer::LoggingObserver;
pub use pathfinding::{AStar, GridPath, Pathfinder, PathfinderConfig};
pub use route::{Route, RouteOptimizer};
pub use simulation_observer::SimulationObserver;
pub use types::{Cell, DIAGONAL_COST, Point, Rect};
