pub mod customs_handlers;
pub mod customs_models;
