//! Mediaconv-DB: Database schema, migrations, and query operations
//!
//! This crate provides durable batch bookkeeping for mediaconv using SQLite
//! with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```
//! use mediaconv_common::{BatchId, BatchStatus};
//! use mediaconv_db::pool::{init_memory_pool, get_conn};
//! use mediaconv_db::queries::batches;
//!
//! let pool = init_memory_pool().unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let batch_id = BatchId::new();
//! batches::save_batch(&conn, batch_id, BatchStatus::Processing, &[], None).unwrap();
//! assert!(batches::get_batch(&conn, batch_id).unwrap().is_some());
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
