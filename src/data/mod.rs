//! Data layer: core types, loading, filtering and aggregation.
//!
//! Architecture:
//! ```text
//!  .csv / .json / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  map columns, coerce types → Dataset
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────────┐
//!   │   Dataset     │  Vec<Measurement> + cached Categories (shared, read-only)
//!   └──────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  FilterSelection predicates → subset
//!   └──────────┘
//!        │
//!        ▼
//!   ┌───────────┐
//!   │ aggregate  │  group-by mean / min / max / count
//!   └───────────┘
//! ```

pub mod aggregate;
pub mod filter;
pub mod geocoded;
pub mod loader;
pub mod model;
pub mod shared;
