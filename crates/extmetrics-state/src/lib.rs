//! extmetrics-state — durable store for external metric records.
//!
//! Backed by [redb](https://docs.rs/redb), persists `ExternalMetricValue`
//! records between reconciliation passes. Records are JSON-serialized into
//! `&[u8]` value columns under the composite key
//! `{namespace}/{name}/{uid}/{metric_name}`, so all records of one policy
//! share a key prefix.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::StateStore;
