//! Request/response models, one module per resource.

pub mod auth;
pub mod credits;
pub mod jobs;
pub mod keys;
pub mod users;
