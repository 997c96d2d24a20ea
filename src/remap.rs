//! Dispatcher-facing surface tying the components together.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde_json::Value;

use crate::cleanup::CleanupStats;
use crate::error::IndexError;
use crate::index::PathIndex;
use crate::mapper::{Mapper, ScanSummary};
use crate::mode::OpenMode;
use crate::node::{Node, NodeId};
use crate::options::{IndexOptions, MapOptions};
use crate::raw::{RawHandleManager, RawOpen, ResolveMode};
use crate::resolver::Resolver;

/// Snapshot of index occupancy.
#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    /// Mapped file nodes in the tree.
    pub files: usize,
    /// Directory nodes in the tree (including the root).
    pub directories: usize,
    /// Raw handles currently stored in the table.
    pub open_handles: usize,
}

/// The assembled index: one tree, one handle table, and the full set of
/// operations a filesystem front end routes through.
///
/// A hosting dispatcher populates the index via [`map_file`] /
/// [`map_directory`], serves metadata requests through the resolver
/// queries, serves data requests through the raw operations (or the
/// whole-file helpers when raw access is disabled), and reconciles
/// periodically with [`cleanup`].
///
/// [`map_file`]: RemapFs::map_file
/// [`map_directory`]: RemapFs::map_directory
/// [`cleanup`]: RemapFs::cleanup
pub struct RemapFs {
    /// Shared tree.
    index: Arc<PathIndex>,
    /// Tree population.
    mapper: Mapper,
    /// Read-only queries.
    resolver: Resolver,
    /// Raw handle table.
    raw: RawHandleManager,
    /// Construction-time switches.
    options: IndexOptions,
}

impl RemapFs {
    /// Create an empty index with the given switches.
    ///
    /// # Arguments
    /// * `options` - Raw-access and write-through switches, fixed for the
    ///   lifetime of the index
    pub fn new(options: IndexOptions) -> Self {
        let index: Arc<PathIndex> = Arc::new(PathIndex::new());
        Self {
            mapper: Mapper::new(index.clone()),
            resolver: Resolver::new(index.clone()),
            raw: RawHandleManager::new(index.clone(), options),
            index,
            options,
        }
    }

    /// The underlying shared tree.
    pub fn index(&self) -> &Arc<PathIndex> {
        &self.index
    }

    /// The construction-time switches.
    pub fn options(&self) -> IndexOptions {
        self.options
    }

    // ---- population ----

    /// Map a real file onto a virtual path. See [`Mapper::map_file`].
    pub fn map_file(
        &self,
        real_path: impl Into<PathBuf>,
        virtual_path: &str,
        options: MapOptions,
    ) -> Result<NodeId, IndexError> {
        self.mapper.map_file(real_path, virtual_path, options)
    }

    /// Scan real directories and map every file the chooser accepts. See
    /// [`Mapper::map_directory`].
    pub fn map_directory<F>(&self, roots: &[PathBuf], chooser: F) -> Result<ScanSummary, IndexError>
    where
        F: FnMut(&Path) -> Result<Option<String>, IndexError>,
    {
        self.mapper.map_directory(roots, chooser)
    }

    /// Prune the tree with a retention predicate. See
    /// [`PathIndex::cleanup`].
    pub fn cleanup<F>(&self, retain: F) -> CleanupStats
    where
        F: FnMut(&Node) -> bool,
    {
        self.index.cleanup(retain)
    }

    // ---- resolver queries ----

    /// Whether the virtual path is present in the index.
    pub fn exists(&self, path: &str) -> bool {
        self.resolver.exists(path)
    }

    /// Whether the virtual path names a directory node.
    pub fn is_directory(&self, path: &str) -> bool {
        self.resolver.is_directory(path)
    }

    /// Whether the virtual path names a mapped file whose backing file
    /// exists right now.
    pub fn is_file(&self, path: &str) -> bool {
        self.resolver.is_file(path)
    }

    /// Sorted child names of a directory node.
    pub fn list_children(&self, path: &str) -> Result<Vec<String>, IndexError> {
        self.resolver.list_children(path)
    }

    /// The backing path of a mapped file.
    pub fn unmap(&self, path: &str) -> Option<PathBuf> {
        self.resolver.unmap(path)
    }

    /// A stored metadata value.
    pub fn metadata(&self, path: &str, key: &str) -> Option<Value> {
        self.resolver.metadata(path, key)
    }

    /// Extended attributes of a mapped file.
    pub fn extended_attributes(&self, path: &str) -> HashMap<String, Vec<u8>> {
        self.resolver.extended_attributes(path)
    }

    /// Size of the backing file in bytes; directories report 0.
    pub fn size(&self, path: &str) -> Result<u64, IndexError> {
        self.resolver.size(path)
    }

    /// (access, modify, change) times of the backing file; directories
    /// report the epoch triple.
    pub fn timestamps(
        &self,
        path: &str,
    ) -> Result<(SystemTime, SystemTime, SystemTime), IndexError> {
        self.resolver.timestamps(path)
    }

    // ---- whole-file I/O ----

    /// Read the entire backing file of a mapped path.
    ///
    /// This is the data path dispatchers use when raw access is disabled.
    ///
    /// # Errors
    /// - `IndexError::NotFound` if the path is absent from the index
    /// - `IndexError::IsADirectory` if the path names a directory
    /// - `IndexError::Io` if reading the backing file fails
    pub fn read_whole_file(&self, path: &str) -> Result<Vec<u8>, IndexError> {
        match self.resolver.unmap(path) {
            Some(real) => {
                fs::read(&real).map_err(|e| IndexError::io(real.display().to_string(), e))
            }
            None if self.resolver.exists(path) => Err(IndexError::IsADirectory {
                path: path.to_string(),
            }),
            None => Err(IndexError::not_found(path)),
        }
    }

    /// Whether a whole-file write to this path would be accepted:
    /// write-through is enabled and the path is a live mapped file.
    pub fn can_write(&self, path: &str) -> bool {
        self.options.write_through && self.resolver.is_file(path)
    }

    /// Replace the entire backing file of a mapped path.
    ///
    /// # Errors
    /// - `IndexError::WriteDisabled` if write-through is disabled
    /// - `IndexError::NotFound` if the path is absent from the index
    /// - `IndexError::IsADirectory` if the path names a directory
    /// - `IndexError::Io` if writing the backing file fails
    pub fn write_whole_file(&self, path: &str, data: &[u8]) -> Result<(), IndexError> {
        if !self.options.write_through {
            return Err(IndexError::WriteDisabled {
                path: path.to_string(),
            });
        }
        match self.resolver.unmap(path) {
            Some(real) => {
                fs::write(&real, data).map_err(|e| IndexError::io(real.display().to_string(), e))
            }
            None if self.resolver.exists(path) => Err(IndexError::IsADirectory {
                path: path.to_string(),
            }),
            None => Err(IndexError::not_found(path)),
        }
    }

    // ---- raw I/O ----

    /// Open a backing file for raw positioned I/O. See
    /// [`RawHandleManager::open_raw`].
    pub fn open_raw(
        &self,
        path: &str,
        mode: OpenMode,
        resolve: ResolveMode,
    ) -> Result<RawOpen, IndexError> {
        self.raw.open_raw(path, mode, resolve)
    }

    /// Read up to `length` bytes at `offset` through the stored handle.
    pub fn read_raw(&self, path: &str, offset: u64, length: usize) -> Result<Vec<u8>, IndexError> {
        self.raw.read_raw(path, offset, length)
    }

    /// Write the whole buffer at `offset` through the stored handle.
    pub fn write_raw(&self, path: &str, offset: u64, data: &[u8]) -> Result<usize, IndexError> {
        self.raw.write_raw(path, offset, data)
    }

    /// Remove and close the stored handle, if present.
    pub fn close_raw(&self, path: &str) -> bool {
        self.raw.close_raw(path)
    }

    // ---- observability ----

    /// Snapshot of current occupancy.
    pub fn stats(&self) -> IndexStats {
        let (files, directories) = self.index.count_kinds();
        IndexStats {
            files,
            directories,
            open_handles: self.raw.open_count(),
        }
    }
}

impl Default for RemapFs {
    fn default() -> Self {
        Self::new(IndexOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_backing(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path: PathBuf = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_whole_file() {
        let dir: TempDir = TempDir::new().unwrap();
        let real: PathBuf = write_backing(&dir, "f.txt", b"payload");

        let vfs: RemapFs = RemapFs::default();
        vfs.map_file(&real, "v/f.txt", MapOptions::new()).unwrap();

        assert_eq!(vfs.read_whole_file("v/f.txt").unwrap(), b"payload");
        assert!(matches!(
            vfs.read_whole_file("v"),
            Err(IndexError::IsADirectory { .. })
        ));
        assert!(matches!(
            vfs.read_whole_file("v/missing"),
            Err(IndexError::NotFound { .. })
        ));
    }

    #[test]
    fn test_write_whole_file_gated_by_write_through() {
        let dir: TempDir = TempDir::new().unwrap();
        let real: PathBuf = write_backing(&dir, "f.txt", b"old");

        let read_only: RemapFs = RemapFs::default();
        read_only.map_file(&real, "f.txt", MapOptions::new()).unwrap();
        assert!(matches!(
            read_only.write_whole_file("f.txt", b"new"),
            Err(IndexError::WriteDisabled { .. })
        ));
        assert_eq!(fs::read(&real).unwrap(), b"old");

        let writable: RemapFs = RemapFs::new(IndexOptions::default().with_write_through(true));
        writable.map_file(&real, "f.txt", MapOptions::new()).unwrap();
        writable.write_whole_file("f.txt", b"new").unwrap();
        assert_eq!(fs::read(&real).unwrap(), b"new");
    }

    #[test]
    fn test_can_write() {
        let dir: TempDir = TempDir::new().unwrap();
        let real: PathBuf = write_backing(&dir, "f.txt", b"x");

        let vfs: RemapFs = RemapFs::new(IndexOptions::default().with_write_through(true));
        vfs.map_file(&real, "a/f.txt", MapOptions::new()).unwrap();

        assert!(vfs.can_write("a/f.txt"));
        assert!(!vfs.can_write("a"));
        assert!(!vfs.can_write("a/missing"));

        // A stale mapping is not writable.
        fs::remove_file(&real).unwrap();
        assert!(!vfs.can_write("a/f.txt"));

        let read_only: RemapFs = RemapFs::default();
        read_only.map_file("/real", "f", MapOptions::new()).unwrap();
        assert!(!read_only.can_write("f"));
    }

    #[test]
    fn test_stats_snapshot() {
        let dir: TempDir = TempDir::new().unwrap();
        let real: PathBuf = write_backing(&dir, "f.txt", b"x");

        let vfs: RemapFs = RemapFs::default();
        vfs.map_file(&real, "a/b/f.txt", MapOptions::new()).unwrap();
        vfs.map_file(&real, "a/g.txt", MapOptions::new()).unwrap();

        let stats: IndexStats = vfs.stats();
        assert_eq!(stats.files, 2);
        // root + a + b
        assert_eq!(stats.directories, 3);
        assert_eq!(stats.open_handles, 0);

        vfs.open_raw("a/g.txt", OpenMode::Read, ResolveMode::Strict)
            .unwrap();
        assert_eq!(vfs.stats().open_handles, 1);
        vfs.close_raw("a/g.txt");
        assert_eq!(vfs.stats().open_handles, 0);
    }
}
