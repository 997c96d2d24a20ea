//! Read-only queries against the index.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::error::IndexError;
use crate::index::PathIndex;
use crate::node::{Node, NodeId};

/// Read-only view of the index.
///
/// Every query resolves the virtual path under a single tree read-lock
/// acquisition; queries that touch the backing file (stat) do so after the
/// lock is released.
pub struct Resolver {
    index: Arc<PathIndex>,
}

impl Resolver {
    /// Create a resolver over the given index.
    ///
    /// # Arguments
    /// * `index` - Shared path index to query
    pub fn new(index: Arc<PathIndex>) -> Self {
        Self { index }
    }

    /// Resolve `path` and apply `f` to its node under the read lock.
    fn with_node<R>(&self, path: &str, f: impl FnOnce(&Node) -> R) -> Option<R> {
        let components: Vec<&str> = PathIndex::decompose(path);
        let state = self.index.read_state();
        let id: NodeId = state.find(&components)?;
        state.node(id).map(f)
    }

    /// Clone the backing path of a node: `None` if the path is absent,
    /// `Some(None)` for a directory, `Some(Some(real))` for a file.
    fn backing_path(&self, path: &str) -> Option<Option<PathBuf>> {
        self.with_node(path, |n| n.real_path().map(Path::to_path_buf))
    }

    /// Whether the virtual path is present in the index.
    pub fn exists(&self, path: &str) -> bool {
        self.index.lookup(path).is_some()
    }

    /// Whether the virtual path names a directory node.
    pub fn is_directory(&self, path: &str) -> bool {
        self.with_node(path, Node::is_directory).unwrap_or(false)
    }

    /// Whether the virtual path names a mapped file whose backing file
    /// exists right now.
    ///
    /// A mapping whose backing file has vanished (or cannot be stat'ed) is
    /// not a file; this is the one query that folds a stat failure into a
    /// boolean.
    pub fn is_file(&self, path: &str) -> bool {
        match self.backing_path(path) {
            Some(Some(real)) => fs::metadata(&real).map(|m| m.is_file()).unwrap_or(false),
            _ => false,
        }
    }

    /// The backing path of a mapped file.
    ///
    /// # Returns
    /// `None` if the path is absent from the index or names a directory.
    pub fn unmap(&self, path: &str) -> Option<PathBuf> {
        self.backing_path(path).flatten()
    }

    /// Child component names of a directory node, sorted for stable
    /// listings. File nodes have no children and list as empty.
    ///
    /// # Errors
    /// `IndexError::NotFound` if the path is absent from the index.
    pub fn list_children(&self, path: &str) -> Result<Vec<String>, IndexError> {
        match self.with_node(path, Node::child_names) {
            Some(mut names) => {
                names.sort();
                Ok(names)
            }
            None => Err(IndexError::not_found(path)),
        }
    }

    /// A stored metadata value.
    ///
    /// # Arguments
    /// * `path` - Virtual path of the node
    /// * `key` - Metadata key
    ///
    /// # Returns
    /// The value, or `None` if the path is absent, names a directory, or
    /// has no such key.
    pub fn metadata(&self, path: &str, key: &str) -> Option<Value> {
        self.with_node(path, |n| n.metadata_value(key).cloned())
            .flatten()
    }

    /// Extended attributes of a mapped file; empty for directories, unset
    /// attributes, and absent paths.
    pub fn extended_attributes(&self, path: &str) -> HashMap<String, Vec<u8>> {
        self.with_node(path, Node::xattrs).unwrap_or_default()
    }

    /// Size of the backing file in bytes. Directories report 0.
    ///
    /// # Errors
    /// - `IndexError::NotFound` if the path is absent from the index
    /// - `IndexError::Io` if the backing file cannot be stat'ed
    pub fn size(&self, path: &str) -> Result<u64, IndexError> {
        match self.backing_path(path) {
            None => Err(IndexError::not_found(path)),
            Some(None) => Ok(0),
            Some(Some(real)) => fs::metadata(&real)
                .map(|m| m.len())
                .map_err(|e| IndexError::io(real.display().to_string(), e)),
        }
    }

    /// (access, modify, change) times of the backing file.
    ///
    /// Directory nodes have no backing inode and report the epoch triple.
    ///
    /// # Errors
    /// - `IndexError::NotFound` if the path is absent from the index
    /// - `IndexError::Io` if the backing file cannot be stat'ed
    pub fn timestamps(
        &self,
        path: &str,
    ) -> Result<(SystemTime, SystemTime, SystemTime), IndexError> {
        match self.backing_path(path) {
            None => Err(IndexError::not_found(path)),
            Some(None) => Ok((UNIX_EPOCH, UNIX_EPOCH, UNIX_EPOCH)),
            Some(Some(real)) => {
                let meta: fs::Metadata = fs::metadata(&real)
                    .map_err(|e| IndexError::io(real.display().to_string(), e))?;
                let atime: SystemTime = meta.accessed().unwrap_or(UNIX_EPOCH);
                let mtime: SystemTime = meta.modified().unwrap_or(UNIX_EPOCH);
                let ctime: SystemTime = change_time(&meta).unwrap_or(mtime);
                Ok((atime, mtime, ctime))
            }
        }
    }
}

/// Inode change time from the stat, where the platform exposes one.
#[cfg(unix)]
fn change_time(meta: &fs::Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;

    let secs: i64 = meta.ctime();
    let nsecs: i64 = meta.ctime_nsec();
    if secs >= 0 {
        UNIX_EPOCH.checked_add(Duration::new(secs as u64, nsecs as u32))
    } else {
        UNIX_EPOCH.checked_sub(Duration::from_secs(secs.unsigned_abs()))
    }
}

#[cfg(not(unix))]
fn change_time(_meta: &fs::Metadata) -> Option<SystemTime> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::Mapper;
    use crate::options::MapOptions;
    use tempfile::TempDir;

    struct TestEnv {
        _dir: TempDir,
        real: PathBuf,
        resolver: Resolver,
        mapper: Mapper,
    }

    /// One real file mapped to `Artist/Title.mp3` with a `track` tag.
    fn create_test_env() -> TestEnv {
        let dir: TempDir = TempDir::new().unwrap();
        let real: PathBuf = dir.path().join("song.mp3");
        fs::write(&real, b"audio bytes").unwrap();

        let index: Arc<PathIndex> = Arc::new(PathIndex::new());
        let mapper: Mapper = Mapper::new(index.clone());
        mapper
            .map_file(
                &real,
                "Artist/Title.mp3",
                MapOptions::new().with_metadata("track", 1),
            )
            .unwrap();

        TestEnv {
            _dir: dir,
            real,
            resolver: Resolver::new(index),
            mapper,
        }
    }

    #[test]
    fn test_exists_and_classification() {
        let env: TestEnv = create_test_env();
        let r: &Resolver = &env.resolver;

        assert!(r.exists("Artist/Title.mp3"));
        assert!(r.exists("Artist"));
        assert!(!r.exists("Artist/Other.mp3"));

        assert!(r.is_directory("Artist"));
        assert!(r.is_directory(""));
        assert!(!r.is_directory("Artist/Title.mp3"));

        assert!(r.is_file("Artist/Title.mp3"));
        assert!(!r.is_file("Artist"));
        assert!(!r.is_file("missing"));
    }

    #[test]
    fn test_is_file_requires_live_backing_file() {
        let env: TestEnv = create_test_env();

        assert!(env.resolver.is_file("Artist/Title.mp3"));
        fs::remove_file(&env.real).unwrap();
        // Stale mapping: the node is still present but no longer a file.
        assert!(env.resolver.exists("Artist/Title.mp3"));
        assert!(!env.resolver.is_file("Artist/Title.mp3"));
    }

    #[test]
    fn test_unmap() {
        let env: TestEnv = create_test_env();

        assert_eq!(env.resolver.unmap("Artist/Title.mp3"), Some(env.real.clone()));
        assert_eq!(env.resolver.unmap("Artist"), None);
        assert_eq!(env.resolver.unmap("missing"), None);
    }

    #[test]
    fn test_list_children() {
        let env: TestEnv = create_test_env();
        env.mapper
            .map_file("/other/b.mp3", "Artist/B.mp3", MapOptions::new())
            .unwrap();

        let children: Vec<String> = env.resolver.list_children("Artist").unwrap();
        assert_eq!(children, vec!["B.mp3".to_string(), "Title.mp3".to_string()]);

        let root: Vec<String> = env.resolver.list_children("").unwrap();
        assert_eq!(root, vec!["Artist".to_string()]);

        // File nodes list as empty, only absent paths error.
        assert!(env.resolver.list_children("Artist/Title.mp3").unwrap().is_empty());
        assert!(matches!(
            env.resolver.list_children("missing"),
            Err(IndexError::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_children_excludes_metadata_and_xattrs() {
        let env: TestEnv = create_test_env();
        env.mapper
            .map_file(
                "/other/c.mp3",
                "Artist/C.mp3",
                MapOptions::new()
                    .with_metadata("genre", "jazz")
                    .with_xattr("user.color", b"red".to_vec()),
            )
            .unwrap();

        let children: Vec<String> = env.resolver.list_children("Artist").unwrap();
        assert!(children.contains(&"C.mp3".to_string()));
        assert!(!children.contains(&"genre".to_string()));
        assert!(!children.contains(&"user.color".to_string()));
    }

    #[test]
    fn test_metadata() {
        let env: TestEnv = create_test_env();

        assert_eq!(
            env.resolver.metadata("Artist/Title.mp3", "track"),
            Some(Value::from(1))
        );
        assert_eq!(env.resolver.metadata("Artist/Title.mp3", "missing"), None);
        assert_eq!(env.resolver.metadata("Artist", "track"), None);
        assert_eq!(env.resolver.metadata("missing", "track"), None);
    }

    #[test]
    fn test_extended_attributes() {
        let env: TestEnv = create_test_env();
        env.mapper
            .map_file(
                &env.real,
                "Artist/Title.mp3",
                MapOptions::new().with_xattr("user.rating", b"5".to_vec()),
            )
            .unwrap();

        let xattrs = env.resolver.extended_attributes("Artist/Title.mp3");
        assert_eq!(xattrs["user.rating"], b"5".to_vec());

        assert!(env.resolver.extended_attributes("Artist").is_empty());
        assert!(env.resolver.extended_attributes("missing").is_empty());
    }

    #[test]
    fn test_size() {
        let env: TestEnv = create_test_env();

        assert_eq!(env.resolver.size("Artist/Title.mp3").unwrap(), 11);
        assert_eq!(env.resolver.size("Artist").unwrap(), 0);
        assert!(matches!(
            env.resolver.size("missing"),
            Err(IndexError::NotFound { .. })
        ));

        fs::remove_file(&env.real).unwrap();
        assert!(matches!(
            env.resolver.size("Artist/Title.mp3"),
            Err(IndexError::Io { .. })
        ));
    }

    #[test]
    fn test_timestamps() {
        let env: TestEnv = create_test_env();

        let meta: fs::Metadata = fs::metadata(&env.real).unwrap();
        let (_, mtime, _) = env.resolver.timestamps("Artist/Title.mp3").unwrap();
        assert_eq!(mtime, meta.modified().unwrap());

        let (atime, mtime, ctime) = env.resolver.timestamps("Artist").unwrap();
        assert_eq!(atime, UNIX_EPOCH);
        assert_eq!(mtime, UNIX_EPOCH);
        assert_eq!(ctime, UNIX_EPOCH);

        fs::remove_file(&env.real).unwrap();
        assert!(matches!(
            env.resolver.timestamps("Artist/Title.mp3"),
            Err(IndexError::Io { .. })
        ));
    }
}
