//! Core of the Swiss soil heavy-metal dashboard: loading, category
//! extraction, filtering, aggregation and the shareable query-parameter codec.

pub mod color;
pub mod config;
pub mod data;
pub mod query;
pub mod state;
pub mod stats;
pub mod views;
