//! Fieldroute Worker — route-planning core for field service dispatch.
//!
//! This crate assembles daily driver routes over geographically distributed
//! service locations: candidate filtering, opening-hours/time-window
//! resolution, multi-objective edge costing, travel-time/distance matrix
//! caching, and an adaptive (learned-statistics) travel-time model. The
//! combinatorial optimization itself is behind the [`services::optimizer`]
//! trait so any engine can be plugged in; a greedy fallback ships in-crate.

pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod types;
