pub mod config;
pub mod logger;
pub mod pattern;

pub use config::*;
pub use logger::setup_logging;
pub use pattern::glob_match;
