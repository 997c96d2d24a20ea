//! In-memory virtual-directory index for filesystem front ends.
//!
//! This crate maintains a tree of synthetic paths that remap onto real files
//! scattered across the local disk. A hosting dispatcher (FUSE-style daemon,
//! archive browser, asset panel) populates the tree, resolves virtual paths
//! back to backing files, answers metadata queries against the live backing
//! file, and serves file content either through raw positioned handles or
//! through whole-file reads.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: RemapFs facade (the dispatcher-facing operation set)
//! Layer 2: Mapper / Resolver / RawHandleManager / cleanup
//! Layer 1: PathIndex (one tree, one lock)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use remapfs::{IndexOptions, MapOptions, RemapFs};
//!
//! let vfs = RemapFs::new(IndexOptions::default());
//! vfs.map_file(
//!     "/music/library/042.mp3",
//!     "Artist/Album/Title.mp3",
//!     MapOptions::new().with_metadata("track", 7),
//! )?;
//! assert!(vfs.is_file("Artist/Album/Title.mp3"));
//! let bytes = vfs.read_whole_file("Artist/Album/Title.mp3")?;
//! ```

pub mod cleanup;
pub mod error;
pub mod index;
pub mod mapper;
pub mod mode;
pub mod node;
pub mod options;
pub mod raw;
pub mod remap;
pub mod resolver;

pub use error::IndexError;
pub use index::PathIndex;
pub use node::{Node, NodeId, NodeKind, ROOT_NODE};

pub use mode::OpenMode;
pub use options::{IndexOptions, MapOptions};

pub use cleanup::CleanupStats;
pub use mapper::{Mapper, ScanSummary};
pub use resolver::Resolver;

pub use raw::{RawHandle, RawHandleManager, RawOpen, ResolveMode};
pub use remap::{IndexStats, RemapFs};
