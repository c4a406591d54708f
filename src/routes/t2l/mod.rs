pub mod t2l_handlers;
pub mod t2l_models;
