//! The path index: an arena-backed tree mapping virtual paths to nodes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::IndexError;
use crate::node::{Node, NodeId, ROOT_NODE};

/// Arena of nodes behind the tree lock. The root directory is always
/// present; every other node is reachable from it through child links.
#[derive(Debug)]
pub(crate) struct TreeState {
    /// All live nodes keyed by arena ID.
    pub(crate) nodes: HashMap<NodeId, Node>,
}

impl TreeState {
    fn new() -> Self {
        let mut nodes: HashMap<NodeId, Node> = HashMap::new();
        nodes.insert(ROOT_NODE, Node::directory(None, ""));
        Self { nodes }
    }

    /// Get a node by arena ID.
    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Get a mutable node by arena ID.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Walk components from the root without creating anything.
    ///
    /// # Returns
    /// The terminal node ID, or None as soon as a component is missing.
    /// An empty component list resolves to the root.
    pub(crate) fn find(&self, components: &[&str]) -> Option<NodeId> {
        let mut current: NodeId = ROOT_NODE;
        for component in components {
            let node: &Node = self.nodes.get(&current)?;
            current = node.child(component)?;
        }
        Some(current)
    }
}

/// Owner of the virtual tree.
///
/// All tree state lives in one arena guarded by a single reader/writer lock:
/// lookups share the read side, every mutation (insert, metadata assignment,
/// cleanup deletion) takes the write side, so a reader can never observe a
/// half-linked node. The raw-handle table has its own independent lock and
/// the two are never held at the same time.
#[derive(Debug)]
pub struct PathIndex {
    /// Tree arena.
    state: RwLock<TreeState>,
    /// Next arena ID to allocate.
    next_id: AtomicU64,
}

impl PathIndex {
    /// Create an index containing only the root directory.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TreeState::new()),
            next_id: AtomicU64::new(ROOT_NODE + 1),
        }
    }

    /// Split a virtual path into its non-empty components.
    ///
    /// Leading, trailing, and doubled separators produce empty components,
    /// which are dropped, so `"a/b"`, `"/a/b/"`, and `"a//b"` all decompose
    /// identically. Never fails.
    ///
    /// # Arguments
    /// * `path` - Virtual path using `/` as separator
    pub fn decompose(path: &str) -> Vec<&str> {
        path.split('/').filter(|c| !c.is_empty()).collect()
    }

    /// Insert a path, creating missing directory nodes for each component.
    ///
    /// # Arguments
    /// * `path` - Virtual path to insert
    ///
    /// # Returns
    /// The terminal node ID (created or pre-existing), or
    /// `IndexError::NotADirectory` if an intermediate component is a mapped
    /// file.
    pub fn insert(&self, path: &str) -> Result<NodeId, IndexError> {
        let components: Vec<&str> = Self::decompose(path);
        let mut state = self.state.write();
        self.ensure_path_locked(&mut state, &components)
    }

    /// Resolve a path to its node ID without mutating the tree.
    ///
    /// # Arguments
    /// * `path` - Virtual path to resolve
    ///
    /// # Returns
    /// The node ID, or None as soon as any component is missing. The root
    /// path (no components) resolves to the root node.
    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        let components: Vec<&str> = Self::decompose(path);
        let state = self.state.read();
        state.find(&components)
    }

    /// Total number of live nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    /// Count (file, directory) nodes in the arena.
    pub(crate) fn count_kinds(&self) -> (usize, usize) {
        let state = self.state.read();
        let files: usize = state.nodes.values().filter(|n| n.is_file()).count();
        (files, state.nodes.len() - files)
    }

    /// Acquire the tree read lock.
    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, TreeState> {
        self.state.read()
    }

    /// Acquire the tree write lock.
    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, TreeState> {
        self.state.write()
    }

    /// Allocate a fresh arena ID.
    pub(crate) fn alloc_id(&self) -> NodeId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Walk `components` from the root, creating missing directories, with
    /// the write lock already held.
    ///
    /// # Arguments
    /// * `state` - Write-locked arena
    /// * `components` - Decomposed path components
    ///
    /// # Returns
    /// The terminal node ID, or `IndexError::NotADirectory` naming the
    /// mapped file that blocked the walk.
    pub(crate) fn ensure_path_locked(
        &self,
        state: &mut TreeState,
        components: &[&str],
    ) -> Result<NodeId, IndexError> {
        let mut current: NodeId = ROOT_NODE;
        let mut walked: String = String::new();

        for component in components {
            let parent_id: NodeId = current;
            let child: Option<NodeId> = match state.node(parent_id) {
                Some(node) if node.is_directory() => node.child(component),
                _ => return Err(IndexError::NotADirectory { path: walked }),
            };

            if !walked.is_empty() {
                walked.push('/');
            }
            walked.push_str(component);

            current = match child {
                Some(id) => id,
                None => {
                    let id: NodeId = self.alloc_id();
                    state.nodes.insert(id, Node::directory(Some(parent_id), *component));
                    if let Some(parent) = state.node_mut(parent_id) {
                        parent.add_child((*component).to_string(), id);
                    }
                    id
                }
            };
        }

        Ok(current)
    }
}

impl Default for PathIndex {
    fn default() -> Self {
        Self::new()
    }
}
