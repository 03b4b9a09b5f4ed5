pub mod fleet;
pub mod rl;
