//! Services used by the rules: gate, notifications, reconciliation, FEFO and cascade

pub mod cascade;
pub mod fefo;
pub mod gate;
pub mod notification;
pub mod reconciler;

pub use cascade::{CascadeOutcome, CascadeService};
pub use fefo::{FefoOutcome, FefoScanSummary, FefoService};
pub use gate::IdempotencyGate;
pub use notification::NotificationService;
pub use reconciler::StockReconciler;
