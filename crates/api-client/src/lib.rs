//! api-client/src/lib.rs
//!
//! Typed HTTP client for the CookBook API, plus the client-side state a UI
//! keeps around it: the login session and optimistic toggles.

pub mod client;
pub mod error;
pub mod optimistic;
pub mod session;

pub use client::CookbookClient;
pub use error::ClientError;
pub use optimistic::OptimisticToggle;
pub use session::Session;
