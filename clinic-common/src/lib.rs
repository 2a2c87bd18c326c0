//! # Clinic Common Library
//!
//! Shared code for the clinic scheduling portal:
//! - Schedule data model and canonical slot ordering
//! - Realtime event types (ClinicEvent enum) and EventBus
//! - Identity context and the access guard
//! - Configuration loading
//! - Database initialization
//! - Utility functions

pub mod access;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod identity;
pub mod model;
pub mod sse;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use model::{ClinicTime, Day, ScheduleEntry};
