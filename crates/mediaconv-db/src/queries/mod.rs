//! Database query modules.
//!
//! - batches: batch record persistence (save, status updates, lookups)

pub mod batches;
