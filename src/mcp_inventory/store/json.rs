//! JSON-file implementation of [`InventoryStorage`].

use super::InventoryStorage;
use crate::error::{InventoryError, Result};
use crate::lock::PathLock;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::model::{Inventory, CURRENT_VERSION};
use crate::paths::InventoryPaths;
use crate::validate::is_zero_time;
use chrono::Utc;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Shape used by the last recovery stage: only the version is trusted.
/// Records in a corrupt file are deliberately not salvaged, even when
/// individually decodable.
#[derive(Deserialize)]
struct PartialInventory {
    #[serde(default)]
    version: String,
}

/// Stores the inventory as pretty-printed JSON in a single file, guarded by
/// an in-process path lock.
pub struct JsonStore {
    paths: InventoryPaths,
    lock: PathLock,
    metrics: Arc<dyn MetricsSink>,
}

impl JsonStore {
    /// Store at the platform config location.
    pub fn new() -> Result<Self> {
        Ok(Self::with_paths(InventoryPaths::new()?))
    }

    /// Store at an explicit location.
    pub fn with_paths(paths: InventoryPaths) -> Self {
        Self {
            paths,
            lock: PathLock::default(),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Attach a metrics sink; the default discards everything.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Like [`InventoryStorage::load`] with a caller-controlled lock timeout.
    pub fn load_with_lock(&self, timeout: Duration) -> Result<Inventory> {
        let started = Instant::now();
        let _guard = self.lock.lock_timeout(self.paths.file(), timeout)?;
        self.load_unlocked(started)
    }

    /// Like [`InventoryStorage::save`] with a caller-controlled lock timeout.
    pub fn save_with_lock(&self, timeout: Duration, inventory: &mut Inventory) -> Result<()> {
        let started = Instant::now();
        let _guard = self.lock.lock_timeout(self.paths.file(), timeout)?;
        self.save_unlocked(inventory, started)
    }

    /// Load, then migrate and repair the result. Errors if the repaired
    /// inventory still fails validation or carries an unsupported version.
    pub fn load_with_recovery(&self) -> Result<Inventory> {
        let inventory = self.load()?;
        self.validate_and_repair(inventory)
    }

    /// Whether the store's path lock is currently held.
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked(self.paths.file())
    }

    /// Upgrade an inventory missing a version marker to the current version;
    /// reject any other explicit version.
    pub fn migrate(&self, mut inventory: Inventory) -> Result<Inventory> {
        if inventory.version.is_empty() {
            info!("migrating inventory from unknown version to {CURRENT_VERSION}");
            inventory.version = CURRENT_VERSION.to_string();
            return Ok(inventory);
        }
        if inventory.version != CURRENT_VERSION {
            return Err(InventoryError::UnsupportedVersion(inventory.version));
        }
        Ok(inventory)
    }

    /// Migrate, backfill missing record IDs and timestamps, fix inventory
    /// metadata, then re-validate.
    pub fn validate_and_repair(&self, inventory: Inventory) -> Result<Inventory> {
        let mut inventory = self.migrate(inventory)?;
        let now = Utc::now();

        for (i, mcp) in inventory.mcps.iter_mut().enumerate() {
            if is_zero_time(mcp.created_at) {
                mcp.created_at = now;
            }
            if is_zero_time(mcp.updated_at) {
                mcp.updated_at = now;
            }
            if mcp.id.is_empty() {
                mcp.id = format!("mcp_{}", i + 1);
                debug!(id = %mcp.id, "generated missing MCP id");
            }
        }

        if is_zero_time(inventory.metadata.created) {
            inventory.metadata.created = now;
        }
        inventory.metadata.file_count = inventory.mcps.len();
        if is_zero_time(inventory.updated_at) {
            inventory.updated_at = now;
        }

        inventory.validate().map_err(|e| match e {
            InventoryError::Validation(msg) => InventoryError::Validation(format!(
                "inventory validation failed after repair: {msg}"
            )),
            other => other,
        })?;
        Ok(inventory)
    }

    fn load_unlocked(&self, started: Instant) -> Result<Inventory> {
        // First run is not a failure.
        if !self.paths.exists() {
            debug!("inventory file does not exist, starting a new inventory");
            let inventory = Inventory::new();
            self.metrics.record_load(started.elapsed(), 0);
            return Ok(inventory);
        }

        let data = fs::read(self.paths.file())?;
        if data.is_empty() {
            debug!("inventory file is empty, starting a new inventory");
            let inventory = Inventory::new();
            self.metrics.record_load(started.elapsed(), 0);
            return Ok(inventory);
        }

        let inventory = self.decode_with_recovery(&data)?;
        debug!(mcps = inventory.mcps.len(), "loaded inventory");
        self.metrics
            .record_load(started.elapsed(), inventory.mcps.len());
        Ok(inventory)
    }

    /// Staged decode: typed parse + validate, then on failure back up the
    /// corrupt bytes and fall back to ever-less-ambitious shapes. Every
    /// fallback yields a usable inventory; decode failures never reach the
    /// caller.
    fn decode_with_recovery(&self, data: &[u8]) -> Result<Inventory> {
        match Inventory::from_json(data) {
            Ok(inventory) => return Ok(inventory),
            Err(err) => {
                warn!(%err, "failed to decode inventory file, attempting recovery");
            }
        }

        // Best effort: keep the corrupt bytes around for inspection.
        match self.paths.create_backup() {
            Ok(()) => self.metrics.record_backup(),
            Err(err) => warn!(%err, "failed to back up corrupt inventory file"),
        }
        self.metrics.record_recovery();

        // Is this syntactically JSON at all?
        if serde_json::from_slice::<serde_json::Value>(data).is_err() {
            warn!("inventory file is not valid JSON, starting a new inventory");
            return Ok(Inventory::new());
        }

        // Salvage the version marker only; the record list is discarded.
        match serde_json::from_slice::<PartialInventory>(data) {
            Ok(partial) => {
                let mut inventory = Inventory::new();
                if !partial.version.is_empty() {
                    inventory.version = partial.version;
                }
                info!(
                    version = %inventory.version,
                    "recovered inventory version from corrupt file"
                );
                Ok(inventory)
            }
            Err(_) => {
                warn!("all recovery attempts failed, starting a new inventory");
                Ok(Inventory::new())
            }
        }
    }

    fn save_unlocked(&self, inventory: &mut Inventory, started: Instant) -> Result<()> {
        let validation = Instant::now();
        inventory.validate().map_err(|e| match e {
            InventoryError::Validation(msg) => {
                InventoryError::Validation(format!("invalid inventory: {msg}"))
            }
            other => other,
        })?;
        self.metrics.record_validation(validation.elapsed());

        let now = Utc::now();
        inventory.updated_at = now;
        inventory.metadata.file_count = inventory.mcps.len();
        inventory.metadata.last_sync = now;

        let data = inventory.to_json()?;

        // Atomic write: full content to a temp sibling, flush, rename over
        // the live file. The temp file never outlives the operation.
        let temp = self.paths.temp_file();
        if let Err(err) = write_sync(&temp, data.as_bytes()) {
            let _ = fs::remove_file(&temp);
            return Err(err);
        }
        if let Err(err) = fs::rename(&temp, self.paths.file()) {
            let _ = fs::remove_file(&temp);
            return Err(err.into());
        }

        debug!(mcps = inventory.mcps.len(), "saved inventory");
        self.metrics
            .record_save(started.elapsed(), inventory.mcps.len());
        Ok(())
    }
}

impl InventoryStorage for JsonStore {
    fn load(&self) -> Result<Inventory> {
        let started = Instant::now();
        debug!(path = %self.paths.file().display(), "loading MCP inventory");
        let _guard = self.lock.lock(self.paths.file())?;
        self.load_unlocked(started)
    }

    fn save(&self, inventory: &mut Inventory) -> Result<()> {
        let started = Instant::now();
        debug!(path = %self.paths.file().display(), "saving MCP inventory");
        let _guard = self.lock.lock(self.paths.file())?;
        self.save_unlocked(inventory, started)
    }

    fn exists(&self) -> bool {
        self.paths.exists()
    }

    fn path(&self) -> &Path {
        self.paths.file()
    }

    fn create_backup(&self) -> Result<()> {
        if !self.paths.exists() {
            return Ok(());
        }
        self.paths.create_backup()?;
        self.metrics.record_backup();
        Ok(())
    }

    fn restore_from_backup(&self) -> Result<()> {
        self.paths.restore_backup()
    }
}

fn write_sync(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InMemoryMetrics;
    use crate::model::{Mcp, McpType};
    use crate::paths::INVENTORY_FILE_NAME;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> JsonStore {
        JsonStore::with_paths(InventoryPaths::at(dir.path().join(INVENTORY_FILE_NAME)))
    }

    fn command_mcp(id: &str) -> Mcp {
        let mut mcp = Mcp::new(id, format!("{id} server"), McpType::Command);
        mcp.config.command = "npx".to_string();
        mcp
    }

    #[test]
    fn test_load_missing_file_returns_fresh_inventory() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let inventory = store.load().unwrap();
        assert_eq!(inventory.version, CURRENT_VERSION);
        assert!(inventory.mcps.is_empty());
        assert!(!store.exists());
    }

    #[test]
    fn test_load_empty_file_returns_fresh_inventory() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), b"").unwrap();

        let inventory = store.load().unwrap();
        assert!(inventory.mcps.is_empty());
        assert_eq!(inventory.version, CURRENT_VERSION);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut inventory = Inventory::new();
        inventory.add_mcp(command_mcp("fs")).unwrap();
        let mut sse = Mcp::new("events", "Events", McpType::Sse);
        sse.config.server_url = "https://example.com/sse".to_string();
        inventory.add_mcp(sse).unwrap();

        store.save(&mut inventory).unwrap();
        assert_eq!(inventory.metadata.file_count, 2);

        let loaded = store.load().unwrap();
        assert_eq!(loaded, inventory);
        assert!(!store.is_locked());
    }

    #[test]
    fn test_save_rejects_invalid_inventory_before_write() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut inventory = Inventory::new();
        inventory.mcps.push(command_mcp("dup"));
        inventory.mcps.push(command_mcp("dup"));

        let err = store.save(&mut inventory).unwrap_err();
        assert!(err.to_string().contains("duplicate MCP ID"));
        assert!(!store.path().exists());
        assert!(!store.paths.temp_file().exists());
    }

    #[test]
    fn test_no_temp_file_after_save() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut inventory = Inventory::new();
        inventory.add_mcp(command_mcp("fs")).unwrap();
        store.save(&mut inventory).unwrap();

        assert!(store.path().exists());
        assert!(!store.paths.temp_file().exists());
    }

    #[test]
    fn test_corrupt_file_recovers_to_empty_with_backup() {
        let dir = TempDir::new().unwrap();
        let metrics = Arc::new(InMemoryMetrics::new());
        let store = store_in(&dir).with_metrics(metrics.clone());
        let corrupt = b"{\"invalid\": json";
        fs::write(store.path(), corrupt).unwrap();

        let inventory = store.load().unwrap();
        assert!(inventory.mcps.is_empty());
        assert_eq!(inventory.version, CURRENT_VERSION);

        let backup = fs::read(store.paths.backup_file()).unwrap();
        assert_eq!(backup, corrupt.to_vec());

        let summary = metrics.summary();
        assert_eq!(summary["recovery_operations_total"], 1);
        assert_eq!(summary["backup_operations_total"], 1);
    }

    #[test]
    fn test_partial_corruption_preserves_version_but_not_records() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            b"{\"version\":\"1.0\",\"mcps\":[\"not-a-record\"]}",
        )
        .unwrap();

        let inventory = store.load().unwrap();
        assert_eq!(inventory.version, "1.0");
        assert!(inventory.mcps.is_empty());
    }

    #[test]
    fn test_structurally_valid_records_are_still_discarded() {
        // A decodable record next to an invalid one: recovery keeps only the
        // version, never a subset of records.
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut good = Inventory::new();
        good.add_mcp(command_mcp("fs")).unwrap();
        let mut json: serde_json::Value =
            serde_json::from_str(&good.to_json().unwrap()).unwrap();
        json["mcps"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::Value::from(42));
        fs::write(store.path(), serde_json::to_vec(&json).unwrap()).unwrap();

        let inventory = store.load().unwrap();
        assert_eq!(inventory.version, "1.0");
        assert!(inventory.mcps.is_empty());
    }

    #[test]
    fn test_migrate_fills_missing_version() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut inventory = Inventory::new();
        inventory.version = String::new();
        let migrated = store.migrate(inventory).unwrap();
        assert_eq!(migrated.version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrate_rejects_future_version() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut inventory = Inventory::new();
        inventory.version = "2.0".to_string();
        let err = store.migrate(inventory).unwrap_err();
        assert!(matches!(err, InventoryError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn test_validate_and_repair_backfills_ids_and_timestamps() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut inventory = Inventory::new();
        let mut nameless = command_mcp("ignored");
        nameless.id = String::new();
        nameless.created_at = chrono::DateTime::UNIX_EPOCH;
        nameless.updated_at = chrono::DateTime::UNIX_EPOCH;
        inventory.mcps.push(nameless);
        inventory.version = String::new();

        let repaired = store.validate_and_repair(inventory).unwrap();
        assert_eq!(repaired.version, CURRENT_VERSION);
        assert_eq!(repaired.mcps[0].id, "mcp_1");
        assert!(!is_zero_time(repaired.mcps[0].created_at));
        assert_eq!(repaired.metadata.file_count, 1);
    }

    #[test]
    fn test_load_with_recovery_end_to_end() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        // Valid JSON but no version marker: the typed decode fails
        // validation, so the result comes out of the recovery path.
        fs::write(store.path(), b"{\"mcps\":[]}").unwrap();

        let inventory = store.load_with_recovery().unwrap();
        assert_eq!(inventory.version, CURRENT_VERSION);
        assert!(inventory.mcps.is_empty());
    }

    #[test]
    fn test_save_with_lock_times_out_when_held() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let _held = store.lock.lock(store.paths.file()).unwrap();

        let mut inventory = Inventory::new();
        let err = store
            .save_with_lock(Duration::from_millis(30), &mut inventory)
            .unwrap_err();
        assert!(matches!(err, InventoryError::LockTimeout { .. }));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_load_with_lock_honors_custom_timeout() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let inventory = store.load_with_lock(Duration::from_millis(100)).unwrap();
        assert_eq!(inventory.version, CURRENT_VERSION);
        assert!(!store.is_locked());
    }

    #[test]
    fn test_backup_and_restore_via_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut inventory = Inventory::new();
        inventory.add_mcp(command_mcp("fs")).unwrap();
        store.save(&mut inventory).unwrap();
        store.create_backup().unwrap();

        let mut clobbered = Inventory::new();
        store.save(&mut clobbered).unwrap();
        assert!(store.load().unwrap().mcps.is_empty());

        store.restore_from_backup().unwrap();
        let restored = store.load().unwrap();
        assert_eq!(restored.mcps.len(), 1);
        assert_eq!(restored.mcps[0].id, "fs");
    }

    #[test]
    fn test_metrics_record_load_and_save() {
        let dir = TempDir::new().unwrap();
        let metrics = Arc::new(InMemoryMetrics::new());
        let store = store_in(&dir).with_metrics(metrics.clone());

        let mut inventory = store.load().unwrap();
        inventory.add_mcp(command_mcp("fs")).unwrap();
        store.save(&mut inventory).unwrap();
        store.load().unwrap();

        let summary = metrics.summary();
        assert_eq!(summary["load_operations_total"], 2);
        assert_eq!(summary["save_operations_total"], 1);
        assert_eq!(summary["current_inventory_size"], 1);
    }
}
