//! Inventory Alerting Engine
//!
//! Change-triggered rules over an inventory document store: discrepancy,
//! write-off and return notifications, the return → write-off cascade,
//! FEFO expiration alerts and product stock reconciliation.

pub mod config;
pub mod engine;
pub mod error;
pub mod rules;
pub mod services;
pub mod store;
pub mod supervisor;

pub use config::Config;
pub use engine::Engine;
pub use error::{AppError, AppResult};
pub use supervisor::WatcherSupervisor;
