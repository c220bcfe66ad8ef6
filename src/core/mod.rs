pub mod achievements;
pub mod config;
pub mod engine;
pub mod extract;
pub mod gate;
pub mod metrics;
pub mod persist;
pub mod policy;
pub mod template;
