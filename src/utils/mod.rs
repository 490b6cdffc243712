//! Utility modules shared by the engine and the effect nodes

pub mod logging;
pub mod smoother;

pub use logging::init_logger;
pub use smoother::{SmoothedParam, DEFAULT_SMOOTH_TIME_MS};
