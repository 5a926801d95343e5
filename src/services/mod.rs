//! Planning services

pub mod cost;
pub mod geo;
pub mod learned_stats;
pub mod mapper;
pub mod matrix;
pub mod optimizer;
pub mod planner;
pub mod problem;
pub mod routing;
pub mod time_window;
pub mod travel_time;
