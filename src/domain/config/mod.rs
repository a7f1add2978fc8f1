pub mod planner_config;

pub use planner_config::{EvaluationMode, PlannerConfig};
