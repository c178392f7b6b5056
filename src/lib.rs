//! Building energy prediction service.
//!
//! Validates building characteristics, assembles the feature vector the
//! stored regressor expects and returns a kBTU estimate over HTTP.

pub mod config;
pub mod error;
pub mod features;
pub mod handlers;
pub mod model;
pub mod types;
pub mod validation;

pub use error::{AppError, AppResult};
pub use handlers::{create_router, AppState};
