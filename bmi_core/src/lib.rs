#![forbid(unsafe_code)]

//! Core domain model and business logic for the BMI tracker.
//!
//! This crate provides:
//! - Domain types (users, categories, measurement records)
//! - The BMI engine (computation and classification)
//! - Persistence (JSON record store with locking and atomic writes)
//! - The history service used by display front-ends
//! - CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod engine;
pub mod store;
pub mod history;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use engine::{compute, parse_quantity};
pub use store::{RecordStore, Store};
pub use history::{HistoryService, DEFAULT_HISTORY_LIMIT, MIN_TREND_POINTS};
pub use export::export_user_csv;
