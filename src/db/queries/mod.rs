//! Database queries

pub mod learned_stats;
pub mod route;
