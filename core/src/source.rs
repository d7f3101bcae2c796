//! Content sources for catalog files.
//!
//! A file's bytes either already sit in memory (a slice of the rendered
//! archive, or a buffer read up front) or are pulled on demand from an
//! external handle such as a firmware file protocol. Both variants implement
//! [`ReadAt`] and are held as `Rc<dyn ReadAt>` so a container entry and the
//! inner files extracted from it can share one source.

use crate::status::Status;
use core::cell::RefCell;
use core::fmt;

/// Errors raised while reading file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoError {
    /// The source ended before the requested range was filled.
    ShortRead { offset: u64, expected: usize, got: usize },
    /// Requested range lies outside the source.
    OutOfRange { offset: u64, len: usize },
    /// Underlying firmware handle reported a failure.
    Device(Status),
}

impl IoError {
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Device(status) => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortRead {
                offset,
                expected,
                got,
            } => write!(
                f,
                "premature end of file at {:#x}: wanted {} bytes, got {}",
                offset, expected, got
            ),
            Self::OutOfRange { offset, len } => {
                write!(f, "read of {} bytes at {:#x} is out of range", len, offset)
            }
            Self::Device(status) => write!(f, "device read failed ({:#x})", status),
        }
    }
}

/// Positioned, read-only access to file content.
pub trait ReadAt {
    /// Content length in bytes.
    fn len(&self) -> u64;

    /// Read up to `buf.len()` bytes at `offset`. Returns the number of bytes
    /// read; zero means end of content.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, IoError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` completely from `offset`, failing on a short read.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), IoError> {
        let mut done = 0usize;
        while done < buf.len() {
            let n = self.read_at(offset + done as u64, &mut buf[done..])?;
            if n == 0 {
                return Err(IoError::ShortRead {
                    offset,
                    expected: buf.len(),
                    got: done,
                });
            }
            done += n;
        }
        Ok(())
    }
}

/// Content already resident in memory.
///
/// The slice is `'static` because buffers backing the virtual disk are
/// handed to firmware and never reclaimed.
#[derive(Clone, Copy)]
pub struct MemorySource {
    data: &'static [u8],
}

impl MemorySource {
    pub const fn new(data: &'static [u8]) -> Self {
        Self { data }
    }

    pub fn as_slice(&self) -> &'static [u8] {
        self.data
    }
}

impl ReadAt for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, IoError> {
        if offset > self.data.len() as u64 {
            return Err(IoError::OutOfRange {
                offset,
                len: buf.len(),
            });
        }
        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }
}

/// Seek+read access to an open external file.
pub trait FileHandle {
    fn size(&mut self) -> Result<u64, IoError>;
    fn set_position(&mut self, position: u64) -> Result<(), IoError>;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError>;
}

/// Deferred reads through an external handle.
pub struct HandleSource<H: FileHandle> {
    handle: RefCell<H>,
    len: u64,
}

impl<H: FileHandle> HandleSource<H> {
    pub fn new(mut handle: H) -> Result<Self, IoError> {
        let len = handle.size()?;
        Ok(Self {
            handle: RefCell::new(handle),
            len,
        })
    }
}

impl<H: FileHandle> ReadAt for HandleSource<H> {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, IoError> {
        if offset >= self.len {
            return Ok(0);
        }
        let want = buf.len().min((self.len - offset) as usize);
        let mut handle = self.handle.borrow_mut();
        handle.set_position(offset)?;
        handle.read(&mut buf[..want])
    }
}
