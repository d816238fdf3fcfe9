//! Core data types: [`Mcp`] records, their kind-specific [`McpConfig`]
//! payloads, and the persisted [`Inventory`] container.
//!
//! Validation is layered: the declarative tables in this module feed the
//! generic engine in [`crate::validate`], and each record kind adds its own
//! business rule (a `command` record must carry a command, an `sse` record a
//! server URL, and so on) on top.

use crate::error::{InventoryError, Result};
use crate::validate::{validate_fields, Field, FieldValue, Rule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

/// The inventory schema version this crate reads and writes.
pub const CURRENT_VERSION: &str = "1.0";

/// Hard cap on the number of records in one inventory.
pub const MAX_MCPS: usize = 1000;

pub(crate) const HTTP_METHODS: &[&str] =
    &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];
const MCP_TYPES: &[&str] = &["command", "sse", "json", "http"];

/// Files written before timestamps existed decode to the epoch, which the
/// validator and `validate_and_repair` treat as "unset".
fn zero_time() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// The kind of a stored MCP record, which determines the required
/// [`McpConfig`] members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpType {
    /// Local command plus arguments.
    Command,
    /// Server-sent-events streaming endpoint.
    Sse,
    /// Free-form JSON configuration blob.
    Json,
    /// Plain HTTP endpoint with optional headers and method.
    Http,
}

impl McpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            McpType::Command => "command",
            McpType::Sse => "sse",
            McpType::Json => "json",
            McpType::Http => "http",
        }
    }
}

/// Union-like payload for one record. Only the members matching the record's
/// [`McpType`] are meaningful; the rest stay empty and are omitted from the
/// serialized file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server_url: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub json_config: Map<String, Value>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
}

impl McpConfig {
    /// The HTTP method to use, defaulting to GET when none was configured.
    pub fn method(&self) -> &str {
        if self.method.is_empty() {
            "GET"
        } else {
            &self.method
        }
    }

    fn rule_fields(&self) -> [Field<'_>; 5] {
        [
            Field::new("command", FieldValue::Str(&self.command), &[Rule::Max(500)]),
            Field::new("args", FieldValue::List(&self.args), &[Rule::Max(50)]),
            Field::new(
                "server_url",
                FieldValue::Str(&self.server_url),
                &[Rule::Url],
            ),
            Field::new("endpoint", FieldValue::Str(&self.endpoint), &[Rule::Url]),
            Field::new(
                "headers",
                FieldValue::Count(self.headers.len()),
                &[Rule::Max(20)],
            ),
        ]
    }
}

/// One named MCP service-configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mcp {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub mcp_type: McpType,
    #[serde(default)]
    pub config: McpConfig,
    #[serde(default = "zero_time")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "zero_time")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
}

impl Mcp {
    pub fn new(id: impl Into<String>, name: impl Into<String>, mcp_type: McpType) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            mcp_type,
            config: McpConfig::default(),
            created_at: now,
            updated_at: now,
            description: String::new(),
            enabled: true,
        }
    }

    fn rule_fields(&self) -> [Field<'_>; 6] {
        [
            Field::new(
                "id",
                FieldValue::Str(&self.id),
                &[Rule::Required, Rule::Min(1), Rule::Max(100)],
            ),
            Field::new(
                "name",
                FieldValue::Str(&self.name),
                &[Rule::Required, Rule::Min(1), Rule::Max(255)],
            ),
            Field::new(
                "type",
                FieldValue::Str(self.mcp_type.as_str()),
                &[Rule::Required, Rule::OneOf(MCP_TYPES)],
            ),
            Field::new(
                "created_at",
                FieldValue::Time(self.created_at),
                &[Rule::Required],
            ),
            Field::new(
                "updated_at",
                FieldValue::Time(self.updated_at),
                &[Rule::Required],
            ),
            Field::new(
                "description",
                FieldValue::Str(&self.description),
                &[Rule::Max(1000)],
            ),
        ]
    }

    /// Generic field rules first, then the business rule for this record's
    /// kind.
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.rule_fields())?;
        validate_fields(&self.config.rule_fields())?;

        match self.mcp_type {
            McpType::Command => {
                if self.config.command.is_empty() {
                    return Err(InventoryError::Validation(
                        "command MCP must have a command specified".to_string(),
                    ));
                }
            }
            McpType::Sse => {
                if self.config.server_url.is_empty() {
                    return Err(InventoryError::Validation(
                        "SSE MCP must have a server URL specified".to_string(),
                    ));
                }
            }
            McpType::Json => {
                if self.config.json_config.is_empty() {
                    return Err(InventoryError::Validation(
                        "JSON MCP must have configuration specified".to_string(),
                    ));
                }
            }
            McpType::Http => {
                if self.config.endpoint.is_empty() {
                    return Err(InventoryError::Validation(
                        "HTTP MCP must have an endpoint specified".to_string(),
                    ));
                }
                // An unset method means GET; anything explicit must be a
                // standard verb.
                if !self.config.method.is_empty() {
                    validate_fields(&[Field::new(
                        "method",
                        FieldValue::Str(&self.config.method),
                        &[Rule::OneOf(HTTP_METHODS)],
                    )])?;
                }
            }
        }

        Ok(())
    }
}

/// Bookkeeping persisted alongside the record list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryMetadata {
    #[serde(default = "zero_time")]
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub file_count: usize,
    #[serde(default = "zero_time")]
    pub last_sync: DateTime<Utc>,
}

impl Default for InventoryMetadata {
    fn default() -> Self {
        Self {
            created: zero_time(),
            file_count: 0,
            last_sync: zero_time(),
        }
    }
}

/// The persisted container: schema version, record list, metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub mcps: Vec<Mcp>,
    #[serde(default)]
    pub metadata: InventoryMetadata,
    #[serde(default = "zero_time")]
    pub updated_at: DateTime<Utc>,
}

impl Inventory {
    /// A fresh, empty inventory at the current schema version.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            version: CURRENT_VERSION.to_string(),
            mcps: Vec::new(),
            metadata: InventoryMetadata {
                created: now,
                file_count: 0,
                last_sync: zero_time(),
            },
            updated_at: now,
        }
    }

    /// Add a record, rejecting invalid records and duplicate IDs.
    pub fn add_mcp(&mut self, mcp: Mcp) -> Result<()> {
        mcp.validate()
            .map_err(|e| contextualize(e, "invalid MCP"))?;

        if self.mcps.iter().any(|existing| existing.id == mcp.id) {
            return Err(InventoryError::Validation(format!(
                "MCP with ID {} already exists",
                mcp.id
            )));
        }

        self.mcps.push(mcp);
        self.metadata.file_count = self.mcps.len();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Remove the record with the given ID.
    pub fn remove_mcp(&mut self, id: &str) -> Result<()> {
        let pos = self
            .mcps
            .iter()
            .position(|mcp| mcp.id == id)
            .ok_or_else(|| InventoryError::McpNotFound(id.to_string()))?;
        self.mcps.remove(pos);
        self.metadata.file_count = self.mcps.len();
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn get_mcp(&self, id: &str) -> Result<&Mcp> {
        self.mcps
            .iter()
            .find(|mcp| mcp.id == id)
            .ok_or_else(|| InventoryError::McpNotFound(id.to_string()))
    }

    /// Replace an existing record (matched by ID), stamping its update time.
    pub fn update_mcp(&mut self, mut updated: Mcp) -> Result<()> {
        updated
            .validate()
            .map_err(|e| contextualize(e, "invalid MCP"))?;

        let slot = self
            .mcps
            .iter_mut()
            .find(|mcp| mcp.id == updated.id)
            .ok_or_else(|| InventoryError::McpNotFound(updated.id.clone()))?;
        updated.updated_at = Utc::now();
        *slot = updated;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn rule_fields(&self) -> [Field<'_>; 5] {
        [
            Field::new(
                "version",
                FieldValue::Str(&self.version),
                &[Rule::Required, Rule::Min(1), Rule::Max(10)],
            ),
            Field::new(
                "mcps",
                FieldValue::Count(self.mcps.len()),
                &[Rule::Max(MAX_MCPS)],
            ),
            Field::new(
                "created",
                FieldValue::Time(self.metadata.created),
                &[Rule::Required],
            ),
            Field::new(
                "file_count",
                FieldValue::Count(self.metadata.file_count),
                &[Rule::Max(MAX_MCPS)],
            ),
            Field::new(
                "updated_at",
                FieldValue::Time(self.updated_at),
                &[Rule::Required],
            ),
        ]
    }

    /// Validate the container, ID uniqueness, and every record.
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.rule_fields())?;

        let mut ids = HashSet::new();
        for mcp in &self.mcps {
            if !ids.insert(mcp.id.as_str()) {
                return Err(InventoryError::Validation(format!(
                    "duplicate MCP ID found: {}",
                    mcp.id
                )));
            }
            mcp.validate()
                .map_err(|e| contextualize(e, &format!("invalid MCP {}", mcp.id)))?;
        }

        Ok(())
    }

    /// Serialize to the canonical on-disk representation (pretty-printed,
    /// stable key order).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode and validate an inventory from raw file bytes.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let inventory: Inventory = serde_json::from_slice(data)?;
        inventory
            .validate()
            .map_err(|e| contextualize(e, "invalid inventory"))?;
        Ok(inventory)
    }

}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

fn contextualize(err: InventoryError, context: &str) -> InventoryError {
    match err {
        InventoryError::Validation(msg) => {
            InventoryError::Validation(format!("{context}: {msg}"))
        }
        other => other,
    }
}
