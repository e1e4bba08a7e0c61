//! Data layer for cursor-insights.
//!
//! Discovers and parses usage export CSV files, filters and buckets the
//! records, and derives the metrics, leaderboard and contributor tiers that
//! make up an analysis report.

pub mod aggregator;
pub mod analysis;
pub mod filters;
pub mod metrics;
pub mod reader;
pub mod segmentation;

pub use insights_core as core;
