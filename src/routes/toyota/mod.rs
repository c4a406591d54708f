pub mod toyota_handlers;
pub mod toyota_models;
