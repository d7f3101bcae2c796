// FAT directory entries: 8.3 short names and VFAT long-name slots

use alloc::format;
use alloc::vec::Vec;

pub const DIR_ENTRY_SIZE: usize = 32;

pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;
const ATTR_LONG_NAME: u8 = 0x0F;

// NT reserved-byte flags: base / extension stored upper case, shown lower case
const NT_LOWER_BASE: u8 = 0x08;
const NT_LOWER_EXT: u8 = 0x10;

const LFN_CHARS_PER_SLOT: usize = 13;
const LFN_LAST: u8 = 0x40;
const MAX_LONG_NAME: usize = 255;

/// FAT32 directory entry (32 bytes)
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct DirEntry {
    pub name: [u8; 11], // 8.3 filename
    pub attr: u8,       // File attributes
    pub nt_case: u8,
    pub _create_time_tenth: u8,
    pub _create_time: u16,
    pub _create_date: u16,
    pub _access_date: u16,
    pub cluster_high: u16, // High word of first cluster
    pub _modify_time: u16,
    pub _modify_date: u16,
    pub cluster_low: u16, // Low word of first cluster
    pub file_size: u32,   // File size in bytes
}

const _: () = assert!(core::mem::size_of::<DirEntry>() == DIR_ENTRY_SIZE);

impl DirEntry {
    pub fn empty() -> Self {
        Self {
            name: [0; 11],
            attr: 0,
            nt_case: 0,
            _create_time_tenth: 0,
            _create_time: 0,
            _create_date: 0,
            _access_date: 0,
            cluster_high: 0,
            _modify_time: 0,
            _modify_date: 0,
            cluster_low: 0,
            file_size: 0,
        }
    }

    pub fn new(name: [u8; 11], attr: u8, cluster: u32, size: u32) -> Self {
        let mut entry = Self::empty();
        entry.name = name;
        entry.attr = attr;
        entry.set_first_cluster(cluster);
        entry.file_size = size;
        entry
    }

    pub fn first_cluster(&self) -> u32 {
        ((self.cluster_high as u32) << 16) | (self.cluster_low as u32)
    }

    pub fn set_first_cluster(&mut self, cluster: u32) {
        self.cluster_high = (cluster >> 16) as u16;
        self.cluster_low = (cluster & 0xFFFF) as u16;
    }

    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        // SAFETY: packed, plain-old-data, size checked above
        unsafe { core::mem::transmute_copy(self) }
    }
}

/// How a name is stored in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredName {
    pub short: [u8; 11],
    pub nt_case: u8,
    /// UTF-16 long name, when the short form cannot carry the name.
    pub long: Option<Vec<u16>>,
}

impl StoredName {
    pub fn slots(&self) -> usize {
        1 + self
            .long
            .as_ref()
            .map_or(0, |l| l.len().div_ceil(LFN_CHARS_PER_SLOT))
    }
}

fn is_short_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"$%'-_@~`!(){}^#&".contains(&b)
}

/// Split `name` into 8.3 parts if it fits, with its case flags.
fn fit_short(name: &str) -> Option<([u8; 11], u8)> {
    let (base, ext) = match name.rsplit_once('.') {
        Some((base, ext)) => (base, ext),
        None => (name, ""),
    };
    if base.is_empty()
        || base.len() > 8
        || ext.len() > 3
        || !base.bytes().chain(ext.bytes()).all(is_short_char)
    {
        return None;
    }

    let mut nt_case = 0;
    for (part, flag) in [(base, NT_LOWER_BASE), (ext, NT_LOWER_EXT)] {
        let has_lower = part.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = part.bytes().any(|b| b.is_ascii_uppercase());
        match (has_lower, has_upper) {
            (true, true) => return None,
            (true, false) => nt_case |= flag,
            _ => {}
        }
    }

    let mut short = [b' '; 11];
    short[..base.len()].copy_from_slice(base.as_bytes());
    short[8..8 + ext.len()].copy_from_slice(ext.as_bytes());
    short.make_ascii_uppercase();
    Some((short, nt_case))
}

/// Short alias for a name that needs a long entry: CRC32 of the full name as
/// the base, plus the first three usable extension characters.
fn hashed_short(name: &str) -> [u8; 11] {
    let mut short = [b' '; 11];
    short[..8].copy_from_slice(format!("{:08X}", crc32(name.as_bytes())).as_bytes());

    if let Some((_, ext)) = name.rsplit_once('.') {
        for (slot, b) in short[8..]
            .iter_mut()
            .zip(ext.bytes().filter(|&b| is_short_char(b)))
        {
            *slot = b.to_ascii_uppercase();
        }
    }
    short
}

/// Work out the directory form of `name`. `None` if the name is empty or
/// longer than a long-name chain allows.
pub fn stored_name(name: &str) -> Option<StoredName> {
    if let Some((short, nt_case)) = fit_short(name) {
        return Some(StoredName {
            short,
            nt_case,
            long: None,
        });
    }

    let long: Vec<u16> = name.encode_utf16().collect();
    if long.is_empty() || long.len() > MAX_LONG_NAME {
        return None;
    }
    Some(StoredName {
        short: hashed_short(name),
        nt_case: 0,
        long: Some(long),
    })
}

pub fn lfn_checksum(short: &[u8; 11]) -> u8 {
    short
        .iter()
        .fold(0u8, |sum, &b| sum.rotate_right(1).wrapping_add(b))
}

/// Long-name slots for `long`, in on-disk order (highest sequence first).
fn lfn_slots(long: &[u16], checksum: u8) -> Vec<[u8; DIR_ENTRY_SIZE]> {
    const OFFSETS: [usize; LFN_CHARS_PER_SLOT] = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];

    let count = long.len().div_ceil(LFN_CHARS_PER_SLOT);
    let mut slots = Vec::with_capacity(count);
    for seq in (1..=count).rev() {
        let mut slot = [0u8; DIR_ENTRY_SIZE];
        slot[0] = seq as u8 | if seq == count { LFN_LAST } else { 0 };
        slot[11] = ATTR_LONG_NAME;
        slot[13] = checksum;

        let start = (seq - 1) * LFN_CHARS_PER_SLOT;
        for (i, &off) in OFFSETS.iter().enumerate() {
            let ch = match start + i {
                pos if pos < long.len() => long[pos],
                pos if pos == long.len() => 0x0000,
                _ => 0xFFFF,
            };
            slot[off..off + 2].copy_from_slice(&ch.to_le_bytes());
        }
        slots.push(slot);
    }
    slots
}

/// Accumulates the raw bytes of one directory.
pub struct DirWriter {
    bytes: Vec<u8>,
}

impl DirWriter {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn push(&mut self, entry: &DirEntry) {
        self.bytes.extend_from_slice(&entry.to_bytes());
    }

    /// Long-name slots, if any, followed by the short entry.
    pub fn push_named(&mut self, name: &StoredName, attr: u8, cluster: u32, size: u32) {
        if let Some(long) = &name.long {
            for slot in lfn_slots(long, lfn_checksum(&name.short)) {
                self.bytes.extend_from_slice(&slot);
            }
        }
        let mut entry = DirEntry::new(name.short, attr, cluster, size);
        entry.nt_case = name.nt_case;
        self.push(&entry);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Zero-pad to a whole number of `unit`-byte clusters.
    pub fn finish(mut self, unit: usize) -> Vec<u8> {
        let len = self.bytes.len().max(1).div_ceil(unit) * unit;
        self.bytes.resize(len, 0);
        self.bytes
    }
}

impl Default for DirWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Calculate CRC32 checksum of data (polynomial 0xEDB88320).
fn crc32(data: &[u8]) -> u32 {
    const POLYNOMIAL: u32 = 0xEDB88320;

    let mut crc: u32 = 0xFFFFFFFF;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }

    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_known_values() {
        assert_eq!(crc32(b""), 0x00000000);
        assert_eq!(crc32(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn test_plain_short_names() {
        let name = stored_name("BCD").unwrap();
        assert_eq!(&name.short, b"BCD        ");
        assert_eq!(name.nt_case, 0);
        assert_eq!(name.slots(), 1);

        let name = stored_name("boot.sdi").unwrap();
        assert_eq!(&name.short, b"BOOT    SDI");
        assert_eq!(name.nt_case, NT_LOWER_BASE | NT_LOWER_EXT);
        assert!(name.long.is_none());

        let name = stored_name("BOOT.wim").unwrap();
        assert_eq!(name.nt_case, NT_LOWER_EXT);
    }

    #[test]
    fn test_long_names_get_lfn_slots() {
        let name = stored_name("bootmgfw.efi").unwrap();
        assert!(name.long.is_none(), "8.3 fits: {:?}", name);

        let name = stored_name("BootMgr.efi").unwrap();
        assert_eq!(name.slots(), 2);
        assert_eq!(&name.short[8..], b"EFI");

        let name = stored_name("a-very-long-file-name.txt").unwrap();
        assert_eq!(name.slots(), 1 + 2);

        assert!(stored_name("").is_none());
    }

    #[test]
    fn test_lfn_slot_layout() {
        let long: Vec<u16> = "BootMgr.efi".encode_utf16().collect();
        let slots = lfn_slots(&long, 0x5A);
        assert_eq!(slots.len(), 1);
        let slot = &slots[0];
        assert_eq!(slot[0], 0x41);
        assert_eq!(slot[11], ATTR_LONG_NAME);
        assert_eq!(slot[13], 0x5A);
        assert_eq!(&slot[1..3], &[b'B', 0]);
        // 11 chars: NUL terminator at index 11 (offset 28), then 0xFFFF
        assert_eq!(&slot[28..30], &[0, 0]);
        assert_eq!(&slot[30..32], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_entry_encoding() {
        let mut writer = DirWriter::new();
        writer.push(&DirEntry::new(*b"EFI        ", ATTR_DIRECTORY, 0x0001_0003, 0));
        let bytes = writer.finish(512);
        assert_eq!(bytes.len(), 512);
        assert_eq!(&bytes[..11], b"EFI        ");
        assert_eq!(bytes[11], ATTR_DIRECTORY);
        assert_eq!(&bytes[20..22], &[1, 0]);
        assert_eq!(&bytes[26..28], &[3, 0]);
    }
}
