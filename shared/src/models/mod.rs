//! Domain models for the Inventory Alerting Engine

mod cascade;
mod count;
mod fefo;
mod notification;
mod product;
mod returns;
mod waste;

pub use cascade::*;
pub use count::*;
pub use fefo::*;
pub use notification::*;
pub use product::*;
pub use returns::*;
pub use waste::*;
