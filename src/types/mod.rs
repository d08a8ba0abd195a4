//! Type definitions for the transaction anomaly feed

pub mod command;
pub mod result;
pub mod transaction;

pub use command::{SessionAction, SessionCommand};
pub use result::{AnomalyReason, AnomalyResult, ResultMessage};
pub use transaction::{RouteRecord, Transaction};
