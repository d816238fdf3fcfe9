//! # mcp-inventory
//!
//! Validated, crash-safe persistence for MCP server inventories. This is a
//! **storage library**: the terminal UI, external CLI wrappers, and clipboard
//! glue of a manager application live elsewhere and consume the store only
//! through [`InventoryStorage`].
//!
//! ```text
//! caller ──► JsonStore::load / save
//!               │
//!               ├─ lock::PathLock          one exclusion token per file path
//!               ├─ model + validate        declarative rules + business rules
//!               ├─ atomic write            <file>.tmp → fsync → rename
//!               └─ staged recovery         corrupt file → .backup → fresh inventory
//! ```
//!
//! ## Behavior worth knowing up front
//!
//! - A missing or empty inventory file is a first run, not an error: `load`
//!   returns a fresh [`Inventory`].
//! - A corrupt file never fails `load`. The bytes are copied to a `.backup`
//!   sibling and the caller gets a working inventory (keeping at most the
//!   `version` marker; records are not salvaged).
//! - `save` validates fully before touching disk and writes atomically, so
//!   the live file is never half-written and no `.tmp` survives.
//! - Locks serialize load/save per path **within this process only**; see
//!   [`lock`] for the limitations.
//!
//! ## Module Overview
//!
//! - [`store`]: the [`InventoryStorage`] trait and [`JsonStore`]
//! - [`model`]: [`Inventory`], [`Mcp`], [`McpConfig`], [`McpType`]
//! - [`validate`]: generic declarative field-rule engine
//! - [`lock`]: in-process path-keyed mutual exclusion
//! - [`paths`]: platform config-file location, backup siblings
//! - [`metrics`]: injectable operation-counter sink
//! - [`error`]: error types

pub mod error;
pub mod lock;
pub mod metrics;
pub mod model;
pub mod paths;
pub mod store;
pub mod validate;

pub use error::{InventoryError, Result};
pub use lock::{LockHandle, PathLock, DEFAULT_LOCK_TIMEOUT};
pub use metrics::{InMemoryMetrics, MetricsSink, NoopMetrics};
pub use model::{Inventory, InventoryMetadata, Mcp, McpConfig, McpType, CURRENT_VERSION};
pub use paths::InventoryPaths;
pub use store::{InventoryStorage, JsonStore};
