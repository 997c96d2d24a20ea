//! Access-mode token translation.
//!
//! The dispatcher hands over one of six abstract tokens; this module turns
//! them into concrete open flags for the backing file. `r` and `ra` both open
//! read-only (`ra` only marks append intent at the dispatcher level), while
//! the append modes delegate write positioning to the OS.

use std::fs::OpenOptions;

use crate::error::IndexError;

/// Abstract access mode requested for a raw open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only (`r`).
    Read,
    /// Read-only, append-marked (`ra`).
    ReadAppend,
    /// Read and write, no truncation (`rw`).
    ReadWrite,
    /// Read plus appending writes (`rwa`).
    ReadWriteAppend,
    /// Write, truncating or creating (`w`).
    Write,
    /// Appending writes, creating if missing (`wa`).
    WriteAppend,
}

impl OpenMode {
    /// Parse an access-mode token.
    ///
    /// # Arguments
    /// * `token` - One of `r`, `ra`, `rw`, `rwa`, `w`, `wa`
    ///
    /// # Returns
    /// The parsed mode, or `IndexError::UnknownMode` for anything else.
    pub fn parse(token: &str) -> Result<Self, IndexError> {
        match token {
            "r" => Ok(Self::Read),
            "ra" => Ok(Self::ReadAppend),
            "rw" => Ok(Self::ReadWrite),
            "rwa" => Ok(Self::ReadWriteAppend),
            "w" => Ok(Self::Write),
            "wa" => Ok(Self::WriteAppend),
            other => Err(IndexError::UnknownMode {
                token: other.to_string(),
            }),
        }
    }

    /// Whether the mode allows writing through the handle.
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Self::ReadWrite | Self::ReadWriteAppend | Self::Write | Self::WriteAppend
        )
    }

    /// Whether writes through the handle append rather than position.
    pub fn is_append(self) -> bool {
        matches!(self, Self::ReadWriteAppend | Self::WriteAppend)
    }

    /// The token this mode parses from.
    pub fn token(self) -> &'static str {
        match self {
            Self::Read => "r",
            Self::ReadAppend => "ra",
            Self::ReadWrite => "rw",
            Self::ReadWriteAppend => "rwa",
            Self::Write => "w",
            Self::WriteAppend => "wa",
        }
    }

    /// Translate to concrete open flags for the backing file.
    pub fn open_options(self) -> OpenOptions {
        let mut opts: OpenOptions = OpenOptions::new();
        match self {
            Self::Read | Self::ReadAppend => {
                opts.read(true);
            }
            Self::ReadWrite => {
                opts.read(true).write(true);
            }
            Self::ReadWriteAppend => {
                opts.read(true).append(true);
            }
            Self::Write => {
                opts.write(true).truncate(true).create(true);
            }
            Self::WriteAppend => {
                opts.append(true).create(true);
            }
        }
        opts
    }
}
