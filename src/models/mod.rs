//! Data models

pub mod assessment;
pub mod attempt;
pub mod fraud_report;
pub mod notification;
pub mod signature;
pub mod telemetry;

pub use assessment::*;
pub use attempt::*;
pub use fraud_report::*;
pub use notification::*;
pub use signature::*;
pub use telemetry::*;
