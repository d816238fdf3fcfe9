//! # Storage Layer
//!
//! Persistence for the [`Inventory`](crate::model::Inventory). The
//! [`InventoryStorage`] trait is the surface the rest of an application (UI,
//! CLI wrappers) consumes; [`json::JsonStore`] is the production
//! implementation.
//!
//! ## Guarantees
//!
//! - **Serialized access**: every operation takes the per-path lock, so
//!   concurrent calls against the same file never interleave. Last writer
//!   wins; there is no merge.
//! - **Atomic writes**: saves go to a `<file>.tmp` sibling, are flushed, and
//!   are renamed over the live file. The live file is never observed
//!   half-written, and no `.tmp` survives a completed operation.
//! - **Validate before write**: an invalid inventory is rejected before any
//!   byte reaches disk.
//! - **Corruption never blocks startup**: an unreadable file is backed up and
//!   absorbed into a fresh inventory instead of surfacing as an error.

use crate::error::Result;
use crate::model::Inventory;
use std::path::Path;

pub mod json;

pub use json::JsonStore;

/// Abstract interface for inventory persistence.
pub trait InventoryStorage {
    /// Load the inventory, constructing a fresh one if no file exists.
    fn load(&self) -> Result<Inventory>;

    /// Validate and persist the inventory, stamping its update metadata.
    fn save(&self, inventory: &mut Inventory) -> Result<()>;

    /// Whether the live inventory file exists.
    fn exists(&self) -> bool;

    /// Path of the live inventory file.
    fn path(&self) -> &Path;

    /// Copy the live file to its `.backup` sibling.
    fn create_backup(&self) -> Result<()>;

    /// Overwrite the live file from its `.backup` sibling.
    fn restore_from_backup(&self) -> Result<()>;
}
