//! # sitehub-core
//!
//! Core crate for SiteHub. Contains collaborator traits, configuration
//! schemas, typed identifiers, request diagnostics, and the unified
//! error system.
//!
//! This crate has **no** internal dependencies on other SiteHub crates.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
