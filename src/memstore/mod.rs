//! In-memory record source
//!
//! Backs the CLI and the test suites. Enumeration order is insertion
//! order and stays stable across calls while the store is unchanged.

mod dataset;
mod store;

pub use dataset::{Dataset, DatasetRecord};
pub use store::{MemRecord, MemoryStore};
