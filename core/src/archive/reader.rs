//! Sequential reader over one or more concatenated newc archives.
//!
//! Yields every record in order, directories and trailers included. Zero
//! bytes between archives are skipped. A malformed record ends iteration
//! after its error is returned.

use super::header::{self, NewcHeader, HEADER_LEN, TRAILER};
use super::ArchiveError;

#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    pub header: NewcHeader,
    pub name: &'a str,
    pub data: &'a [u8],
    /// Byte offset of the header within the buffer.
    pub offset: usize,
}

impl<'a> Record<'a> {
    pub fn is_trailer(&self) -> bool {
        self.name == TRAILER
    }

    pub fn is_dir(&self) -> bool {
        self.header.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.header.is_regular() && !self.is_trailer()
    }
}

pub struct ArchiveReader<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> ArchiveReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            failed: false,
        }
    }

    fn next_record(&mut self) -> Result<Option<Record<'a>>, ArchiveError> {
        let data = self.data;
        while self.pos < data.len() && data[self.pos] == 0 {
            self.pos += 1;
        }
        if self.pos >= data.len() {
            return Ok(None);
        }

        let offset = self.pos;
        let header = NewcHeader::parse(&data[offset..], offset)?;

        let name_start = offset + HEADER_LEN;
        let name_end = name_start
            .checked_add(header.namesize as usize)
            .filter(|&end| end <= data.len())
            .ok_or(ArchiveError::Truncated { offset })?;
        let mut raw_name = &data[name_start..name_end];
        while let [rest @ .., 0] = raw_name {
            raw_name = rest;
        }
        let name =
            core::str::from_utf8(raw_name).map_err(|_| ArchiveError::BadName { offset })?;

        let data_start = offset + header::header_record_len(header.namesize as usize) as usize;
        let size = header.filesize as usize;
        let content = if size == 0 {
            &[][..]
        } else {
            let end = data_start
                .checked_add(size)
                .filter(|&end| end <= data.len())
                .ok_or(ArchiveError::Truncated { offset })?;
            &data[data_start..end]
        };

        self.pos = (data_start + header::align4(size as u64) as usize).min(data.len());

        Ok(Some(Record {
            header,
            name,
            data: content,
            offset,
        }))
    }
}

impl<'a> Iterator for ArchiveReader<'a> {
    type Item = Result<Record<'a>, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
