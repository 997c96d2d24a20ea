//! Pruning stale subtrees from the index.

use crate::index::{PathIndex, TreeState};
use crate::node::{Node, NodeId, ROOT_NODE};

/// Counts from one cleanup pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupStats {
    /// File nodes removed by the retain predicate.
    pub removed_files: usize,
    /// Directory nodes pruned for ending the pass empty.
    pub removed_dirs: usize,
}

impl CleanupStats {
    /// Total nodes removed.
    pub fn total(&self) -> usize {
        self.removed_files + self.removed_dirs
    }
}

/// One pending removal: detach `name` from `parent`, drop `id` from the
/// arena.
struct Deletion {
    parent: NodeId,
    name: String,
    id: NodeId,
}

impl PathIndex {
    /// Prune the tree with a caller-supplied retention predicate.
    ///
    /// Walks the tree post-order. Every file node is offered to `retain`;
    /// rejected files are removed from their parent. Directories are never
    /// offered to the predicate: a directory is removed exactly when it ends
    /// the pass with zero remaining children (whether the pass emptied it or
    /// it was already empty). The root always survives.
    ///
    /// The traversal first collects an explicit deletion list and only then
    /// applies it, so no children map is mutated while being iterated.
    ///
    /// Callers typically re-scan a source directory, remap everything found
    /// (marking each node, e.g. via metadata), then pass a predicate like
    /// "was this node touched by the current scan" to evict mappings whose
    /// real files disappeared.
    ///
    /// # Lock Safety
    /// The whole pass, including every `retain` call, runs under the tree
    /// write lock. The predicate must not call back into the index (lookup,
    /// map, cleanup): the lock is not reentrant and doing so deadlocks.
    ///
    /// # Arguments
    /// * `retain` - Returns true to keep a file node, false to remove it
    ///
    /// # Returns
    /// Counts of removed file and directory nodes.
    pub fn cleanup<F>(&self, mut retain: F) -> CleanupStats
    where
        F: FnMut(&Node) -> bool,
    {
        let mut state = self.write_state();

        let mut deletions: Vec<Deletion> = Vec::new();
        scan_directory(&state, ROOT_NODE, &mut retain, &mut deletions);

        let mut stats: CleanupStats = CleanupStats::default();
        for deletion in &deletions {
            if let Some(parent) = state.node_mut(deletion.parent) {
                parent.remove_child(&deletion.name);
            }
            if let Some(node) = state.nodes.remove(&deletion.id) {
                if node.is_file() {
                    stats.removed_files += 1;
                } else {
                    stats.removed_dirs += 1;
                }
            }
        }
        drop(state);

        tracing::debug!(
            "Cleanup removed {} files, {} directories",
            stats.removed_files,
            stats.removed_dirs
        );
        stats
    }
}

/// Post-order collection of removals under `dir_id`.
///
/// # Returns
/// True if the directory ends the pass with no surviving children.
fn scan_directory<F>(
    state: &TreeState,
    dir_id: NodeId,
    retain: &mut F,
    out: &mut Vec<Deletion>,
) -> bool
where
    F: FnMut(&Node) -> bool,
{
    let entries: Vec<(String, NodeId)> = match state.node(dir_id) {
        Some(node) => node.child_entries(),
        None => return false,
    };

    let mut survivors: usize = entries.len();
    for (name, child_id) in entries {
        let remove: bool = match state.node(child_id) {
            Some(child) if child.is_file() => !retain(child),
            Some(_) => scan_directory(state, child_id, retain, out),
            None => false,
        };
        if remove {
            out.push(Deletion {
                parent: dir_id,
                name,
                id: child_id,
            });
            survivors -= 1;
        }
    }

    survivors == 0
}
