mod facility;
mod grid;
mod layout;
mod order;
mod robot;
mod world;

pub use facility::{Facility, STANDOFF_OFFSET};
pub use grid::NavigationGrid;
pub use layout::FacilityBuilder;
pub use order::{ItemId, Order, OrderGenerator, OrderId, OrderStatus};
pub use robot::{QUEUE_CAPACITY, Robot, RobotId, RobotSnapshot, RobotState};
pub use world::World;
