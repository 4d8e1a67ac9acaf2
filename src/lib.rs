//! # Ousia Scan
//!
//! A fluent scan builder for key-value document stores. A chain of
//! `filter`/`eq`/`lt`/`contains`/... calls accumulates into a validated set of
//! attribute filters, which is translated into a single scan request, sent to
//! a [`Store`], and the returned rows are materialized back into typed
//! objects together with the cursor for the next page.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use ousia_scan::{Engine, adapters::memory::MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.create_table("users", &["id"])?;
//!
//! let engine = Engine::new(Box::new(store));
//! let page = engine
//!     .scan_where::<User>("age")
//!     .ge(21)?
//!     .filter("name")?
//!     .begins_with("A")?
//!     .limit(100)
//!     .exec()
//!     .await?;
//!
//! if let Some(cursor) = page.last_key {
//!     let next = engine.scan::<User>().start_at(cursor).exec().await?;
//! }
//! ```
//!
//! ## Filters
//!
//! Every attribute can be filtered once; all filters must hold (AND).
//! `not()` flips the next comparison:
//!
//! | Method        | Operator      | After `not()`  |
//! |---------------|---------------|----------------|
//! | `null`        | `NULL`        | `NOT_NULL`     |
//! | `eq`          | `EQ`          | `NE`           |
//! | `lt`          | `LT`          | `GE`           |
//! | `le`          | `LE`          | `GT`           |
//! | `ge`          | `GE`          | `LT`           |
//! | `gt`          | `GT`          | `LE`           |
//! | `contains`    | `CONTAINS`    | `NOT_CONTAINS` |
//! | `begins_with` | `BEGINS_WITH` | error          |
//! | `is_in`       | `IN`          | error          |
//! | `between`     | `BETWEEN`     | error          |
//!
//! Call-order mistakes are reported by the offending call as
//! [`Error::InvalidState`]. Literals are encoded through the object's
//! [`Schema`] before the request is sent.

pub mod adapters;
pub mod error;
pub mod object;
pub mod query;
pub mod scan;
pub mod schema;

use std::sync::Arc;

pub use crate::adapters::{AttributeValue, Item, ScanOutput, Store};
pub use crate::error::Error;
pub use crate::object::*;
pub use crate::query::{ToValue, Value};
pub use crate::scan::{ComparisonOperator, Cursor, Scan, ScanOptions, ScanPage, ScanRequest};
pub use crate::schema::{Attribute, AttributeType, Schema};

/// The Engine is the entry point for scanning objects out of a store.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<dyn Store>,
}

impl Engine {
    pub fn new(store: Box<dyn Store>) -> Self {
        Self {
            inner: Arc::from(store),
        }
    }

    /// Unfiltered scan; add filters with `filter(name)`.
    pub fn scan<T: Object>(&self) -> Scan<'_, T> {
        Scan::new(&*self.inner)
    }

    /// Scan whose first comparison applies to `attribute`.
    pub fn scan_where<T: Object>(&self, attribute: impl Into<String>) -> Scan<'_, T> {
        Scan::with_attribute(&*self.inner, attribute)
    }

    /// Scan starting from configured options.
    pub fn scan_with<T: Object>(&self, options: ScanOptions) -> Scan<'_, T> {
        Scan::with_options(&*self.inner, options)
    }
}
