//! `tessera-core`: shared domain primitives (identifiers, errors).
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{ProjectId, UserId};
