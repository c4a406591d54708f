pub mod planner_handlers;
pub mod planner_models;
