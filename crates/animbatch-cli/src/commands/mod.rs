//! CLI command implementations

pub mod classify;
pub mod discover;
pub mod doctor;
pub mod run;
pub mod validate;

mod reporting;
