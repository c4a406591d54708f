pub mod profile_handlers;
pub mod profile_models;
