//! Raw backing-file handles and the per-path handle table.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::IndexError;
use crate::index::PathIndex;
use crate::mode::OpenMode;
use crate::options::IndexOptions;
use crate::resolver::Resolver;

/// An open backing file plus the mode it was opened with.
///
/// Reads and writes are positioned, so one handle serves concurrent
/// requests without a shared cursor. A handle stored by
/// [`RawHandleManager`] is owned by its table; a handle constructed
/// directly via [`RawHandle::open`] is owned by the caller, never enters
/// the table, and closes when dropped.
#[derive(Debug)]
pub struct RawHandle {
    /// The open backing file.
    file: File,
    /// Mode the file was opened with.
    mode: OpenMode,
    /// Location of the backing file.
    real_path: PathBuf,
}

impl RawHandle {
    /// Open a backing file.
    ///
    /// # Arguments
    /// * `real_path` - Location of the backing file
    /// * `mode` - Access mode, translated per the token table
    ///
    /// # Errors
    /// `IndexError::Io` if the open fails.
    pub fn open(real_path: impl Into<PathBuf>, mode: OpenMode) -> Result<Self, IndexError> {
        let real_path: PathBuf = real_path.into();
        let file: File = mode
            .open_options()
            .open(&real_path)
            .map_err(|e| IndexError::io(real_path.display().to_string(), e))?;
        Ok(Self {
            file,
            mode,
            real_path,
        })
    }

    /// Mode the handle was opened with.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Location of the backing file.
    pub fn real_path(&self) -> &Path {
        &self.real_path
    }

    /// Whether writes are allowed through this handle.
    pub fn is_writable(&self) -> bool {
        self.mode.is_writable()
    }

    /// Current size of the backing file in bytes.
    pub fn size(&self) -> Result<u64, IndexError> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| IndexError::io(self.real_path.display().to_string(), e))
    }

    /// Read up to `length` bytes at `offset`.
    ///
    /// Returns fewer bytes only when the file ends before `length`. The
    /// buffer is sized to the bytes remaining in the file, not to `length`.
    ///
    /// # Arguments
    /// * `offset` - Byte offset into the backing file
    /// * `length` - Maximum number of bytes to read
    pub fn read_at(&self, offset: u64, length: usize) -> Result<Vec<u8>, IndexError> {
        let file_size: u64 = self.size()?;
        if offset >= file_size {
            return Ok(Vec::new());
        }
        let actual: usize = (length as u64).min(file_size - offset) as usize;

        let mut buf: Vec<u8> = vec![0u8; actual];
        let mut filled: usize = 0;

        while filled < actual {
            match positioned_read(&self.file, &mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(IndexError::io(self.real_path.display().to_string(), e)),
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }

    /// Write the whole buffer at `offset`.
    ///
    /// Append-mode handles (`rwa`, `wa`) ignore the offset: the OS
    /// positions every write at the end of the file.
    ///
    /// # Arguments
    /// * `offset` - Byte offset into the backing file
    /// * `data` - Bytes to write, in full
    ///
    /// # Returns
    /// The number of bytes written (always `data.len()` on success).
    ///
    /// # Errors
    /// - `IndexError::HandleReadOnly` if the handle was opened read-only
    /// - `IndexError::Io` if the underlying write fails
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<usize, IndexError> {
        if !self.mode.is_writable() {
            return Err(IndexError::HandleReadOnly {
                path: self.real_path.display().to_string(),
            });
        }

        if self.mode.is_append() {
            let mut file: &File = &self.file;
            file.write_all(data)
                .map_err(|e| IndexError::io(self.real_path.display().to_string(), e))?;
            return Ok(data.len());
        }

        let mut written: usize = 0;
        while written < data.len() {
            match positioned_write(&self.file, &data[written..], offset + written as u64) {
                Ok(0) => {
                    let e: io::Error =
                        io::Error::new(io::ErrorKind::WriteZero, "failed to write whole buffer");
                    return Err(IndexError::io(self.real_path.display().to_string(), e));
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(IndexError::io(self.real_path.display().to_string(), e)),
            }
        }
        Ok(written)
    }
}

#[cfg(unix)]
fn positioned_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(unix)]
fn positioned_write(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(buf, offset)
}

#[cfg(windows)]
fn positioned_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(windows)]
fn positioned_write(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_write(buf, offset)
}

/// How `open_raw` reports a virtual path it cannot resolve to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Unresolved paths are an error: the caller expects the index to
    /// guarantee existence.
    Strict,
    /// Unresolved paths signal fallback: the caller will re-attempt a
    /// higher-level open itself.
    Lenient,
}

/// Outcome of a raw open attempt.
#[derive(Debug)]
pub enum RawOpen {
    /// Handle opened and stored in the table.
    Opened(Arc<RawHandle>),
    /// Raw access (or the requested write access) is unavailable here; the
    /// caller should fall back to whole-file I/O.
    Unsupported,
}

impl RawOpen {
    /// The opened handle, if any.
    pub fn handle(self) -> Option<Arc<RawHandle>> {
        match self {
            RawOpen::Opened(handle) => Some(handle),
            RawOpen::Unsupported => None,
        }
    }

    /// Whether this outcome is the fallback signal.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, RawOpen::Unsupported)
    }
}

/// Owner of the open-handle table.
///
/// The table is keyed by normalized virtual path and guarded by its own
/// lock, independent of the tree lock: handle traffic never contends with
/// scans or cleanup. Table lookups clone the `Arc` out and release the lock
/// before any disk I/O starts.
pub struct RawHandleManager {
    /// Resolves virtual paths to backing paths.
    resolver: Resolver,
    /// Construction-time switches.
    options: IndexOptions,
    /// Open handles keyed by normalized virtual path.
    handles: RwLock<HashMap<String, Arc<RawHandle>>>,
}

/// Normalized table key for a virtual path.
fn table_key(path: &str) -> String {
    PathIndex::decompose(path).join("/")
}

impl RawHandleManager {
    /// Create a manager over the given index.
    ///
    /// # Arguments
    /// * `index` - Shared path index for resolving virtual paths
    /// * `options` - Raw-access and write-through switches
    pub fn new(index: Arc<PathIndex>, options: IndexOptions) -> Self {
        Self {
            resolver: Resolver::new(index),
            options,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Open a backing file for raw I/O and store the handle in the table.
    ///
    /// Returns `RawOpen::Unsupported` (not an error) when raw access is
    /// disabled, or when the mode requests write access while write-through
    /// is disabled. An unresolved path is reported per `resolve`: `Strict`
    /// errors with `NotFound`, `Lenient` signals `Unsupported` so the
    /// caller can fall back.
    ///
    /// # Arguments
    /// * `path` - Virtual path of a mapped file
    /// * `mode` - Requested access mode
    /// * `resolve` - How to report an unresolved path
    ///
    /// # Errors
    /// - `IndexError::NotFound` for unresolved paths under `Strict`
    /// - `IndexError::HandleInUse` if a handle for the path is outstanding
    /// - `IndexError::Io` if opening the backing file fails
    pub fn open_raw(
        &self,
        path: &str,
        mode: OpenMode,
        resolve: ResolveMode,
    ) -> Result<RawOpen, IndexError> {
        if !self.options.raw_access {
            return Ok(RawOpen::Unsupported);
        }
        if mode.is_writable() && !self.options.write_through {
            return Ok(RawOpen::Unsupported);
        }

        let key: String = table_key(path);
        let real: PathBuf = match self.resolver.unmap(&key) {
            Some(real) => real,
            None => {
                return match resolve {
                    ResolveMode::Strict => Err(IndexError::not_found(key)),
                    ResolveMode::Lenient => Ok(RawOpen::Unsupported),
                }
            }
        };

        // Cheap rejection before touching the filesystem.
        if self.handles.read().contains_key(&key) {
            tracing::warn!("Rejected second raw open for {}", key);
            return Err(IndexError::HandleInUse { path: key });
        }

        let handle: Arc<RawHandle> = Arc::new(RawHandle::open(real, mode)?);

        let mut handles = self.handles.write();
        match handles.entry(key) {
            Entry::Occupied(entry) => {
                // Lost the race to a concurrent open; the fresh handle
                // drops here and closes its file.
                let key: String = entry.key().clone();
                tracing::warn!("Rejected second raw open for {}", key);
                Err(IndexError::HandleInUse { path: key })
            }
            Entry::Vacant(entry) => {
                tracing::debug!("Raw open {} ({})", entry.key(), mode.token());
                entry.insert(handle.clone());
                Ok(RawOpen::Opened(handle))
            }
        }
    }

    /// Read up to `length` bytes at `offset` through the stored handle.
    ///
    /// # Errors
    /// - `IndexError::NoHandle` if no handle is stored for the path
    /// - `IndexError::Io` if the read fails
    pub fn read_raw(&self, path: &str, offset: u64, length: usize) -> Result<Vec<u8>, IndexError> {
        let handle: Arc<RawHandle> = self.stored_handle(path)?;
        handle.read_at(offset, length)
    }

    /// Write the whole buffer at `offset` through the stored handle.
    ///
    /// # Errors
    /// - `IndexError::NoHandle` if no handle is stored for the path
    /// - `IndexError::HandleReadOnly` if the handle was opened read-only
    /// - `IndexError::Io` if the write fails
    pub fn write_raw(&self, path: &str, offset: u64, data: &[u8]) -> Result<usize, IndexError> {
        let handle: Arc<RawHandle> = self.stored_handle(path)?;
        handle.write_at(offset, data)
    }

    /// Remove and close the stored handle, if present.
    ///
    /// Closing a path with no stored handle is a no-op. If clones of the
    /// handle are still held from `open_raw`, the file stays open until the
    /// last clone drops.
    ///
    /// # Returns
    /// True if a handle was removed.
    pub fn close_raw(&self, path: &str) -> bool {
        let key: String = table_key(path);
        let removed: Option<Arc<RawHandle>> = self.handles.write().remove(&key);
        if removed.is_some() {
            tracing::debug!("Raw close {}", key);
            true
        } else {
            false
        }
    }

    /// Number of handles currently stored.
    pub fn open_count(&self) -> usize {
        self.handles.read().len()
    }

    fn stored_handle(&self, path: &str) -> Result<Arc<RawHandle>, IndexError> {
        let key: String = table_key(path);
        let handles = self.handles.read();
        match handles.get(&key) {
            Some(handle) => Ok(handle.clone()),
            None => Err(IndexError::NoHandle { path: key }),
        }
    }
}
