//! Shared types and models for the Inventory Alerting Engine
//!
//! This crate contains the document schemas, the FEFO threshold model and the
//! validation rules shared between the watcher backend and any other component
//! reading the same collections.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
