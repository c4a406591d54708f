// src/models/mod.rs

pub mod user;
pub mod session;
pub mod project;
pub mod task;
