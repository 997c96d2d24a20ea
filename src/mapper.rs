//! Building and updating the index from real files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::error::IndexError;
use crate::index::PathIndex;
use crate::node::{Node, NodeId, NodeKind};
use crate::options::MapOptions;

/// Counts from one `map_directory` scan.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Files mapped into the index.
    pub mapped: usize,
    /// Files the chooser declined.
    pub skipped: usize,
    /// Files whose chooser call or mapping failed.
    pub failed: usize,
}

impl ScanSummary {
    /// Total number of files visited.
    pub fn total(&self) -> usize {
        self.mapped + self.skipped + self.failed
    }
}

/// Builds and updates the index, either from explicit (real, virtual) pairs
/// or from a recursive directory scan.
pub struct Mapper {
    index: Arc<PathIndex>,
}

impl Mapper {
    /// Create a mapper over the given index.
    ///
    /// # Arguments
    /// * `index` - Shared path index to populate
    pub fn new(index: Arc<PathIndex>) -> Self {
        Self { index }
    }

    /// Map a real file onto a virtual path.
    ///
    /// Creates missing directory nodes along the virtual path, then assigns
    /// the backing path and merges the option metadata into the terminal
    /// node (same-named keys overwritten, other existing keys preserved).
    /// Idempotent: mapping the same pair twice yields one node carrying the
    /// latest metadata. The whole operation runs under one tree write-lock
    /// acquisition, so concurrent lookups see either the old or the new
    /// state, never an intermediate one.
    ///
    /// # Arguments
    /// * `real_path` - Location of the backing file
    /// * `virtual_path` - Caller-visible path to expose it under
    /// * `options` - Metadata and extended attributes to attach
    ///
    /// # Returns
    /// The terminal node ID.
    ///
    /// # Errors
    /// - `IndexError::IsADirectory` if the virtual path is empty and so
    ///   names the root, which stays a directory forever
    /// - `IndexError::NotADirectory` if an intermediate component is a
    ///   mapped file
    /// - `IndexError::DirectoryNotEmpty` if the terminal node is a directory
    ///   that still has children
    pub fn map_file(
        &self,
        real_path: impl Into<PathBuf>,
        virtual_path: &str,
        options: MapOptions,
    ) -> Result<NodeId, IndexError> {
        let real: PathBuf = real_path.into();
        let components: Vec<&str> = PathIndex::decompose(virtual_path);
        // An empty path resolves to the root, which can never become a
        // file node.
        if components.is_empty() {
            return Err(IndexError::IsADirectory {
                path: String::new(),
            });
        }
        let normalized: String = components.join("/");

        let mut state = self.index.write_state();
        let id: NodeId = self.index.ensure_path_locked(&mut state, &components)?;
        let node: &mut Node = match state.node_mut(id) {
            Some(node) => node,
            None => return Err(IndexError::not_found(normalized)),
        };

        // A populated directory cannot become a file; fail before touching
        // anything.
        if node.is_directory() && node.child_count() > 0 {
            return Err(IndexError::DirectoryNotEmpty { path: normalized });
        }

        if node.is_file() {
            if let NodeKind::File {
                real_path,
                metadata,
                xattrs,
            } = &mut node.kind
            {
                *real_path = real;
                metadata.extend(options.metadata);
                if let Some(new_xattrs) = options.xattrs {
                    *xattrs = new_xattrs;
                }
            }
        } else {
            // Empty directory (or freshly created node) becomes the file.
            node.kind = NodeKind::File {
                real_path: real,
                metadata: options.metadata,
                xattrs: options.xattrs.unwrap_or_default(),
            };
        }
        drop(state);

        tracing::debug!("Mapped file: {}", normalized);
        Ok(id)
    }

    /// Scan real directories and map every file the chooser accepts.
    ///
    /// Each file under the given roots is visited exactly once and offered
    /// to `chooser`. `Ok(Some(virtual_path))` maps the file, `Ok(None)`
    /// skips it, and `Err` is logged and counted but never aborts the scan;
    /// mapping conflicts are handled the same way. Only a failure of the
    /// directory enumeration itself is fatal.
    ///
    /// # Arguments
    /// * `roots` - Real directories to scan recursively
    /// * `chooser` - Callback deciding the virtual path for each real file
    ///
    /// # Returns
    /// Counts of mapped, skipped, and failed files.
    ///
    /// # Errors
    /// `IndexError::Io` if enumerating a root fails (unreadable directory).
    pub fn map_directory<F>(
        &self,
        roots: &[PathBuf],
        mut chooser: F,
    ) -> Result<ScanSummary, IndexError>
    where
        F: FnMut(&Path) -> Result<Option<String>, IndexError>,
    {
        let mut summary: ScanSummary = ScanSummary::default();

        for root in roots {
            tracing::info!("Scanning directory: {}", root.display());

            for entry in WalkDir::new(root).follow_links(false) {
                let entry: walkdir::DirEntry = entry.map_err(|e| IndexError::Io {
                    path: e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                    source: e.into(),
                })?;

                if entry.file_type().is_dir() {
                    continue;
                }
                let path: &Path = entry.path();

                match chooser(path) {
                    Ok(Some(virtual_path)) => {
                        match self.map_file(path, &virtual_path, MapOptions::new()) {
                            Ok(_) => summary.mapped += 1,
                            Err(e) => {
                                tracing::warn!("Mapping {} failed: {}", path.display(), e);
                                summary.failed += 1;
                            }
                        }
                    }
                    Ok(None) => summary.skipped += 1,
                    Err(e) => {
                        tracing::warn!("Chooser failed for {}: {}", path.display(), e);
                        summary.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            "Scan complete: {} mapped, {} skipped, {} failed",
            summary.mapped,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }
}
