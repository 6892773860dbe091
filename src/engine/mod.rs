//! Attempt Engine
//!
//! Lifecycle of one student's attempt at one assessment, under concurrent
//! and possibly duplicate fraud signals.
//!
//! # Architecture
//! - `policy.rs`: warn/terminate decision on the running fraud count
//! - `locks.rs`: keyed critical sections (attempt, assessment, student)
//! - `attempts.rs`: start / fraud signal / submit orchestration
//!
//! # Failure Strategy
//! Store failures surface as `StoreUnavailable` with nothing applied.
//! Notification delivery failures are logged and swallowed.

pub mod attempts;
pub mod locks;
pub mod policy;
#[cfg(test)]
mod tests;

pub use attempts::AttemptEngine;
