pub mod config;
pub mod error;
pub mod mentorship;
pub mod telemetry;
