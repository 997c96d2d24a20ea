//! Tree node types for the virtual hierarchy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Identifier of a node in the index arena.
pub type NodeId = u64;

/// Node ID of the root directory (always present).
pub const ROOT_NODE: NodeId = 1;

/// Payload of a node: either a directory with named children or a mapped
/// file. A file never holds children; a directory never holds a real path.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Directory entry: child name → node ID.
    Directory {
        /// Child entries keyed by component name.
        children: HashMap<String, NodeId>,
    },
    /// Mapped file entry.
    File {
        /// Location of the backing file on the real filesystem.
        real_path: PathBuf,
        /// Caller-attached metadata, opaque to the index.
        metadata: HashMap<String, Value>,
        /// Extended attributes: attribute name → byte value.
        xattrs: HashMap<String, Vec<u8>>,
    },
}

/// One entry in the virtual tree.
///
/// Nodes are owned by the arena inside [`PathIndex`](crate::PathIndex); the
/// `parent` field is a plain arena ID, never an owning reference, so the
/// ownership direction stays strictly top-down.
#[derive(Debug, Clone)]
pub struct Node {
    /// Arena ID of the enclosing directory; `None` for the root.
    pub(crate) parent: Option<NodeId>,
    /// Component name within the parent; empty for the root.
    pub(crate) name: String,
    /// Directory or file payload.
    pub(crate) kind: NodeKind,
}

impl Node {
    /// Create an empty directory node.
    ///
    /// # Arguments
    /// * `parent` - Arena ID of the enclosing directory, `None` for the root
    /// * `name` - Component name within the parent
    pub(crate) fn directory(parent: Option<NodeId>, name: impl Into<String>) -> Self {
        Self {
            parent,
            name: name.into(),
            kind: NodeKind::Directory {
                children: HashMap::new(),
            },
        }
    }

    /// Arena ID of the parent directory, `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Component name within the parent directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this node is a mapped file.
    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    /// Whether this node is a directory.
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// The backing file path, if this is a file node.
    pub fn real_path(&self) -> Option<&Path> {
        match &self.kind {
            NodeKind::File { real_path, .. } => Some(real_path),
            NodeKind::Directory { .. } => None,
        }
    }

    /// Look up a metadata value by key. Directories have no metadata.
    ///
    /// # Arguments
    /// * `key` - Metadata key to look up
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        match &self.kind {
            NodeKind::File { metadata, .. } => metadata.get(key),
            NodeKind::Directory { .. } => None,
        }
    }

    /// Extended attributes of a file node; empty for directories.
    pub fn xattrs(&self) -> HashMap<String, Vec<u8>> {
        match &self.kind {
            NodeKind::File { xattrs, .. } => xattrs.clone(),
            NodeKind::Directory { .. } => HashMap::new(),
        }
    }

    /// Child node ID by component name; `None` for file nodes.
    ///
    /// # Arguments
    /// * `name` - Child entry name
    pub fn child(&self, name: &str) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Directory { children } => children.get(name).copied(),
            NodeKind::File { .. } => None,
        }
    }

    /// Number of children; 0 for file nodes.
    pub fn child_count(&self) -> usize {
        match &self.kind {
            NodeKind::Directory { children } => children.len(),
            NodeKind::File { .. } => 0,
        }
    }

    /// Child component names, unordered; empty for file nodes.
    pub fn child_names(&self) -> Vec<String> {
        match &self.kind {
            NodeKind::Directory { children } => children.keys().cloned().collect(),
            NodeKind::File { .. } => Vec::new(),
        }
    }

    /// All children as (name, node ID) pairs; empty for file nodes.
    pub(crate) fn child_entries(&self) -> Vec<(String, NodeId)> {
        match &self.kind {
            NodeKind::Directory { children } => {
                children.iter().map(|(k, v)| (k.clone(), *v)).collect()
            }
            NodeKind::File { .. } => Vec::new(),
        }
    }

    /// Link a child entry into this directory. No-op on file nodes.
    ///
    /// # Arguments
    /// * `name` - Child entry name
    /// * `id` - Child node ID
    pub(crate) fn add_child(&mut self, name: String, id: NodeId) {
        if let NodeKind::Directory { children } = &mut self.kind {
            children.insert(name, id);
        }
    }

    /// Unlink a child entry from this directory.
    ///
    /// # Arguments
    /// * `name` - Child entry name to remove
    ///
    /// # Returns
    /// The removed child node ID, or None if not found.
    pub(crate) fn remove_child(&mut self, name: &str) -> Option<NodeId> {
        match &mut self.kind {
            NodeKind::Directory { children } => children.remove(name),
            NodeKind::File { .. } => None,
        }
    }
}
