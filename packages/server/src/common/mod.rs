// Common types and utilities shared across the application

pub mod id;
pub mod utils;

pub use id::{Id, V4, V7};
pub use utils::generate_summary;
