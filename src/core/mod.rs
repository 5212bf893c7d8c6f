pub mod classify;
pub mod config;
pub mod delta;
pub mod error;
pub mod graph;
pub mod lifting;
pub mod mapping;
pub mod propagate;
pub mod report;
pub mod state;
pub mod types;
