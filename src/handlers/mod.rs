//! HTTP handlers

pub mod health;
pub mod attempts;
pub mod students;
pub mod assessments;
