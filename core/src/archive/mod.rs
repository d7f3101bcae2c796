//! newc cpio archives: header codec, directory dedup, planner and reader.

pub mod dedup;
pub mod header;
pub mod plan;
pub mod reader;

pub use dedup::DirArena;
pub use header::{NewcHeader, HEADER_LEN, MAGIC, MODE_DIR, MODE_FILE, TRAILER};
pub use plan::{measure, render, ArchiveEntry, PlanError};
pub use reader::{ArchiveReader, Record};

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveError {
    BadMagic { offset: usize },
    Truncated { offset: usize },
    BadField { offset: usize, field: &'static str },
    BadName { offset: usize },
    NameTooLong { len: usize },
    FileTooLarge { len: u64 },
}

impl ArchiveError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadMagic { .. } => "bad record magic",
            Self::Truncated { .. } => "truncated record",
            Self::BadField { .. } => "non-hex header field",
            Self::BadName { .. } => "record name is not UTF-8",
            Self::NameTooLong { .. } => "name exceeds the namesize field",
            Self::FileTooLarge { .. } => "content exceeds the filesize field",
        }
    }
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic { offset } | Self::Truncated { offset } | Self::BadName { offset } => {
                write!(f, "{} at {:#x}", self.as_str(), offset)
            }
            Self::BadField { offset, field } => {
                write!(f, "{} '{}' at {:#x}", self.as_str(), field, offset)
            }
            Self::NameTooLong { len } => write!(f, "{} ({} bytes)", self.as_str(), len),
            Self::FileTooLarge { len } => write!(f, "{} ({} bytes)", self.as_str(), len),
        }
    }
}
