//! Order dispatch and the waypoint-following robot controller.

mod controller;
mod dispatcher;

pub use controller::{AgentController, ControllerConfig, RobotEvent};
pub use dispatcher::{Assignment, DISPATCH_LIMIT, Dispatcher};
