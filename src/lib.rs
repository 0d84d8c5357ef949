//! Profile Store - per-user favorites, history, collections and preferences
//!
//! Every user owns one JSON record in a whole-document backend. Each feature
//! keeps its data under its own top-level key of that record and updates it
//! by read-modify-write:
//! - `storage`: the record backends (in-memory and sled)
//! - `store`: generic list and settings sub-collections with dedup, FIFO
//!   eviction and rollback
//! - `features`: the user-facing services built on those stores
//! - `api`: the axum HTTP interface

pub mod api;
pub mod config;
pub mod features;
pub mod storage;
pub mod store;
