pub mod config;
pub mod infra;
pub mod planners;
pub mod simulation;
pub mod state;

// Re-export commonly used types for convenience
pub use infra::{AStar, Cell, Pathfinder, Point, Rect, RouteOptimizer};
pub use simulation::Simulation;
pub use state::{Facility, NavigationGrid, World};
