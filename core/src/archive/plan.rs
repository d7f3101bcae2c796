//! Archive planning and serialization.
//!
//! `measure` and `render` drive the same walk over the entry list. The walk
//! talks to a [`Sink`]: one that only advances a counter, one that writes into
//! the destination buffer. Both see the identical sequence of headers, padding
//! and content, so the measured size is the rendered size.

use super::dedup::DirArena;
use super::header::{self, NewcHeader, HEADER_LEN, MODE_DIR, MODE_FILE, TRAILER};
use super::ArchiveError;
use crate::source::{IoError, ReadAt};
use alloc::rc::Rc;
use alloc::string::String;
use core::fmt;

/// One input to the archive.
///
/// With a `name`, the source becomes a file record at that path. Without one,
/// the source is already a newc archive and is copied verbatim.
#[derive(Clone)]
pub struct ArchiveEntry {
    pub name: Option<String>,
    /// Where the content came from, for diagnostics.
    pub path: String,
    pub source: Rc<dyn ReadAt>,
}

impl ArchiveEntry {
    pub fn named(name: &str, path: &str, source: Rc<dyn ReadAt>) -> Self {
        Self {
            name: Some(String::from(name)),
            path: String::from(path),
            source,
        }
    }

    pub fn raw(path: &str, source: Rc<dyn ReadAt>) -> Self {
        Self {
            name: None,
            path: String::from(path),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    Field(ArchiveError),
    Read { path: String, error: IoError },
    BufferTooSmall { needed: u64, available: usize },
}

impl From<ArchiveError> for PlanError {
    fn from(e: ArchiveError) -> Self {
        Self::Field(e)
    }
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(e) => write!(f, "{}", e),
            Self::Read { path, error } => write!(f, "could not read {}: {}", path, error),
            Self::BufferTooSmall { needed, available } => write!(
                f,
                "archive buffer too small: need {} bytes, have {}",
                needed, available
            ),
        }
    }
}

trait Sink {
    fn position(&self) -> u64;
    fn zeros(&mut self, count: u64) -> Result<(), PlanError>;
    fn bytes(&mut self, data: &[u8]) -> Result<(), PlanError>;
    fn content(&mut self, entry: &ArchiveEntry, len: u64) -> Result<(), PlanError>;

    fn align(&mut self) -> Result<(), PlanError> {
        let pad = header::pad4(self.position());
        self.zeros(pad)
    }

    /// Header, name and padding up to the content.
    fn header(&mut self, name: &str, mode: u32, size: u32) -> Result<(), PlanError> {
        let namesize = u32::try_from(name.len())
            .map_err(|_| ArchiveError::NameTooLong { len: name.len() })?;
        let mut raw = [0u8; HEADER_LEN];
        NewcHeader::new(mode, size, namesize).encode(&mut raw);
        self.bytes(&raw)?;
        self.bytes(name.as_bytes())?;
        self.align()
    }
}

struct CountingSink {
    pos: u64,
}

impl Sink for CountingSink {
    fn position(&self) -> u64 {
        self.pos
    }

    fn zeros(&mut self, count: u64) -> Result<(), PlanError> {
        self.pos += count;
        Ok(())
    }

    fn bytes(&mut self, data: &[u8]) -> Result<(), PlanError> {
        self.pos += data.len() as u64;
        Ok(())
    }

    fn content(&mut self, _entry: &ArchiveEntry, len: u64) -> Result<(), PlanError> {
        self.pos += len;
        Ok(())
    }
}

struct BufferSink<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl BufferSink<'_> {
    fn reserve(&mut self, count: u64) -> Result<&mut [u8], PlanError> {
        let available = self.buf.len();
        let end = (self.pos as u64)
            .checked_add(count)
            .filter(|&end| end <= available as u64)
            .ok_or(PlanError::BufferTooSmall {
                needed: (self.pos as u64).saturating_add(count),
                available,
            })? as usize;
        let out = &mut self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }
}

impl Sink for BufferSink<'_> {
    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn zeros(&mut self, count: u64) -> Result<(), PlanError> {
        self.reserve(count)?.fill(0);
        Ok(())
    }

    fn bytes(&mut self, data: &[u8]) -> Result<(), PlanError> {
        self.reserve(data.len() as u64)?.copy_from_slice(data);
        Ok(())
    }

    fn content(&mut self, entry: &ArchiveEntry, len: u64) -> Result<(), PlanError> {
        let out = self.reserve(len)?;
        entry
            .source
            .read_exact_at(0, out)
            .map_err(|error| PlanError::Read {
                path: entry.path.clone(),
                error,
            })
    }
}

fn walk<S: Sink>(entries: &[ArchiveEntry], sink: &mut S) -> Result<(), PlanError> {
    let mut dirs = DirArena::new();
    let mut run_open = false;

    for entry in entries {
        sink.align()?;
        let len = entry.source.len();

        match &entry.name {
            Some(name) => {
                for end in dirs.insert_parents(name) {
                    sink.header(&name[..end], MODE_DIR, 0)?;
                }
                let size =
                    u32::try_from(len).map_err(|_| ArchiveError::FileTooLarge { len })?;
                sink.header(name, MODE_FILE, size)?;
                run_open = true;
            }
            None if run_open => {
                sink.header(TRAILER, 0, 0)?;
                dirs.clear();
                run_open = false;
            }
            None => {}
        }

        sink.content(entry, len)?;
    }

    if run_open {
        sink.align()?;
        sink.header(TRAILER, 0, 0)?;
    }
    Ok(())
}

/// Exact size `render` will produce for `entries`.
pub fn measure(entries: &[ArchiveEntry]) -> Result<u64, PlanError> {
    let mut sink = CountingSink { pos: 0 };
    walk(entries, &mut sink)?;
    Ok(sink.pos)
}

/// Serialize `entries` into `buffer`, returning the number of bytes written.
pub fn render(entries: &[ArchiveEntry], buffer: &mut [u8]) -> Result<usize, PlanError> {
    let mut sink = BufferSink { buf: buffer, pos: 0 };
    walk(entries, &mut sink)?;
    Ok(sink.pos)
}
