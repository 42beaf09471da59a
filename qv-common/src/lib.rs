//! # QV Common Library
//!
//! Shared code for the shop-floor quality verification service:
//! - Shift detection and subgroup timing rules
//! - Approval state machines for checklists, subgroups, equipment checks and FTQ records
//! - Domain models shared by the HTTP layer and the database layer
//! - Configuration loading and database bootstrap

pub mod approval;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sampling;
pub mod shift;
pub mod time;
pub mod tolerance;

pub use error::{Error, Result};
