//! domains/src/lib.rs
//!
//! Entities, value objects and port definitions for CookBook, a recipe
//! sharing service. Nothing in this crate performs I/O.

pub mod error;
pub mod ids;
pub mod models;
pub mod ports;
mod serde_ext;

// Re-exporting for easier access in other crates
pub use error::*;
pub use ids::*;
pub use models::*;
pub use ports::*;
