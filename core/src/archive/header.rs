//! newc record header: six magic bytes followed by thirteen 8-digit
//! lowercase hex fields.

use super::ArchiveError;

pub const MAGIC: &[u8; 6] = b"070701";
pub const TRAILER: &str = "TRAILER!!!";
pub const HEADER_LEN: usize = 110;

pub const MODE_DIR: u32 = 0o040777;
pub const MODE_FILE: u32 = 0o100777;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;

const FIELD_NAMES: [&str; 13] = [
    "ino", "mode", "uid", "gid", "nlink", "mtime", "filesize", "devmajor", "devminor",
    "rdevmajor", "rdevminor", "namesize", "check",
];

#[inline]
pub const fn align4(n: u64) -> u64 {
    (n + 3) & !3
}

#[inline]
pub const fn pad4(n: u64) -> u64 {
    align4(n) - n
}

/// Size of a header plus `name_len` name bytes, padded to 4.
#[inline]
pub const fn header_record_len(name_len: usize) -> u64 {
    align4((HEADER_LEN + name_len) as u64)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NewcHeader {
    pub ino: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub mtime: u32,
    pub filesize: u32,
    pub devmajor: u32,
    pub devminor: u32,
    pub rdevmajor: u32,
    pub rdevminor: u32,
    pub namesize: u32,
    pub check: u32,
}

impl NewcHeader {
    /// Header for a synthesized record. Only mode, size and name length vary.
    pub fn new(mode: u32, filesize: u32, namesize: u32) -> Self {
        Self {
            mode,
            filesize,
            namesize,
            nlink: 1,
            ..Self::default()
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_regular(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    fn fields(&self) -> [u32; 13] {
        [
            self.ino,
            self.mode,
            self.uid,
            self.gid,
            self.nlink,
            self.mtime,
            self.filesize,
            self.devmajor,
            self.devminor,
            self.rdevmajor,
            self.rdevminor,
            self.namesize,
            self.check,
        ]
    }

    pub fn encode(&self, out: &mut [u8; HEADER_LEN]) {
        out[..6].copy_from_slice(MAGIC);
        for (i, value) in self.fields().iter().enumerate() {
            let start = 6 + i * 8;
            put_hex(&mut out[start..start + 8], *value);
        }
    }

    /// Parse the fixed part of a record starting at `bytes[0]`.
    pub fn parse(bytes: &[u8], offset: usize) -> Result<Self, ArchiveError> {
        if bytes.len() >= MAGIC.len() && &bytes[..MAGIC.len()] != MAGIC {
            return Err(ArchiveError::BadMagic { offset });
        }
        if bytes.len() < HEADER_LEN {
            return Err(ArchiveError::Truncated { offset });
        }

        let mut fields = [0u32; 13];
        for (i, field) in fields.iter_mut().enumerate() {
            let start = 6 + i * 8;
            *field = parse_hex(&bytes[start..start + 8]).ok_or(ArchiveError::BadField {
                offset,
                field: FIELD_NAMES[i],
            })?;
        }

        Ok(Self {
            ino: fields[0],
            mode: fields[1],
            uid: fields[2],
            gid: fields[3],
            nlink: fields[4],
            mtime: fields[5],
            filesize: fields[6],
            devmajor: fields[7],
            devminor: fields[8],
            rdevmajor: fields[9],
            rdevminor: fields[10],
            namesize: fields[11],
            check: fields[12],
        })
    }
}

fn put_hex(out: &mut [u8], value: u32) {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    for (i, byte) in out.iter_mut().enumerate() {
        let shift = 28 - 4 * i as u32;
        *byte = DIGITS[((value >> shift) & 0xf) as usize];
    }
}

fn parse_hex(field: &[u8]) -> Option<u32> {
    field.iter().try_fold(0u32, |acc, &b| {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => return None,
        };
        Some((acc << 4) | digit as u32)
    })
}
