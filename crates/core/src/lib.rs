pub mod types;
pub mod logger;
pub mod settings;
pub mod sleep;
pub mod cli;
pub mod platform;
pub mod geometry;
pub mod matcher;
#[cfg(feature = "cv")]
pub mod correlate;
pub mod click;
pub mod runner;
pub mod diagnostics;
