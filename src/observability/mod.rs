//! Logging initialization for host processes embedding the engine.

mod logging;

pub use logging::{init_production_logging, init_simple_logging};
