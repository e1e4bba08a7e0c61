//! Core types for Cursor Insights.
//!
//! Usage record models, metric formulas, settings, formatting helpers and the
//! shared error type used by the data and CLI crates.

pub mod calculations;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{InsightsError, Result};
