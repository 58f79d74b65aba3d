//! MemTable Module
//!
//! In-memory write buffer for records that have not been flushed yet.
//!
//! ## Responsibilities
//! - Fast inserts and point reads in memory, sorted by key
//! - Last-writer-wins on duplicate keys
//! - Track approximate size for flush triggers
//! - Atomic hand-off of the buffered records to the flush path
//!
//! ## Data Structure Choice
//! A `BTreeMap` behind a single `RwLock`. Flushing swaps the active map into
//! a read-only frozen slot under one write lock, so no insert is lost or
//! duplicated across the swap and readers keep seeing the frozen records
//! until their segment is registered.

mod table;

pub use table::{FrozenTable, MemTable};
