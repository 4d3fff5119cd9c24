//! SpendLens - client-side transaction analytics
//!
//! Fetches a user's transactions once, retries while the backend has nothing
//! yet, and derives every dashboard view (category, daily and time-of-day
//! rollups, rankings, anomalies) from the canonical record set.

pub mod acquisition;
pub mod analytics;
pub mod config;
pub mod engine;
pub mod runtime;
pub mod ui;
