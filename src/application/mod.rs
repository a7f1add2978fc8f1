pub mod correlation;
pub mod jobs;
pub mod locks;
pub mod planner;
pub mod system;
