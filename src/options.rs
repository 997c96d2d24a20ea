//! Configuration options for the index and for individual mappings.

use std::collections::HashMap;

use serde_json::Value;

/// Construction-time switches for the index.
///
/// Both switches are fixed when the index is created; the dispatcher cannot
/// toggle them per request.
#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    /// Allow positioned raw I/O against backing files. When disabled,
    /// raw opens signal "unsupported" and the dispatcher falls back to
    /// whole-file reads.
    pub raw_access: bool,
    /// Allow writes issued against virtual paths to reach the backing
    /// files. When disabled, every write path is rejected.
    pub write_through: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            raw_access: true,
            write_through: false,
        }
    }
}

impl IndexOptions {
    /// Create options with defaults (raw access on, write-through off).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether raw positioned I/O is allowed.
    ///
    /// # Arguments
    /// * `enabled` - True to allow raw opens
    pub fn with_raw_access(mut self, enabled: bool) -> Self {
        self.raw_access = enabled;
        self
    }

    /// Set whether writes may reach the backing files.
    ///
    /// # Arguments
    /// * `enabled` - True to allow write-through
    pub fn with_write_through(mut self, enabled: bool) -> Self {
        self.write_through = enabled;
        self
    }
}

/// Per-mapping options passed to `map_file`.
///
/// Metadata keys merge into the node (same-named keys overwritten, others
/// preserved). Extended attributes replace the node's attribute map wholesale
/// when provided, and leave it untouched when `None`.
#[derive(Debug, Clone, Default)]
pub struct MapOptions {
    /// Metadata pairs to merge into the node.
    pub metadata: HashMap<String, Value>,
    /// Extended attributes to set, replacing any previous map.
    pub xattrs: Option<HashMap<String, Vec<u8>>>,
}

impl MapOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one metadata pair.
    ///
    /// # Arguments
    /// * `key` - Metadata key
    /// * `value` - Metadata value
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Add one extended attribute.
    ///
    /// # Arguments
    /// * `name` - Attribute name
    /// * `value` - Attribute byte value
    pub fn with_xattr(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.xattrs
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }
}
