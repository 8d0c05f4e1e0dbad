//! auth-adapters/src/lib.rs
//!
//! Implementations of `domains::IdentityVerifier`. Credentials are issued by
//! an external authentication service; this crate only checks them.

#[cfg(feature = "auth-jwt")]
pub mod jwt;

#[cfg(feature = "auth-jwt")]
pub use jwt::{AuthError, Claims, JwtIssuer, JwtVerifier};
