//! Driver-side bookkeeping: segments, configuration, domains and the registry.

pub mod configuration;
pub mod display;
pub mod domain;
pub mod registry;
pub mod segment;
