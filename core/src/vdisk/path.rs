//! Device paths for the virtual disk, its partition and the boot file.
//!
//! Paths are kept as raw byte strings in firmware layout: a sequence of
//! `{type, subtype, length}` nodes closed by an end node.

use alloc::vec::Vec;
use uguid::{guid, Guid};

/// Vendor node GUID identifying the virtual disk.
pub const VDISK_VENDOR_GUID: Guid = guid!("1322d197-15dc-4a45-a6a4-fa57054ea614");

const HARDWARE: u8 = 0x01;
const HW_VENDOR: u8 = 0x04;
const MESSAGING: u8 = 0x03;
const MSG_ATAPI: u8 = 0x01;
const MEDIA: u8 = 0x04;
const MEDIA_HARD_DRIVE: u8 = 0x01;
const MEDIA_FILE_PATH: u8 = 0x04;
const END: u8 = 0x7F;
const END_ENTIRE: u8 = 0xFF;

const MBR_PARTITION_FORMAT: u8 = 0x01;
const MBR_SIGNATURE_TYPE: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DevicePath {
    bytes: Vec<u8>,
}

impl DevicePath {
    fn node(&mut self, kind: u8, subtype: u8, body: &[u8]) {
        let len = (4 + body.len()) as u16;
        self.bytes.extend_from_slice(&[kind, subtype]);
        self.bytes.extend_from_slice(&len.to_le_bytes());
        self.bytes.extend_from_slice(body);
    }

    /// Vendor and ATAPI nodes shared by both devices.
    fn vdisk_prefix() -> Self {
        let mut path = Self::default();
        path.node(HARDWARE, HW_VENDOR, &VDISK_VENDOR_GUID.to_bytes());
        // primary, master, LUN 0
        path.node(MESSAGING, MSG_ATAPI, &[0, 0, 0, 0]);
        path
    }

    fn end(mut self) -> Self {
        self.node(END, END_ENTIRE, &[]);
        self
    }

    pub fn disk() -> Self {
        Self::vdisk_prefix().end()
    }

    pub fn partition(start_lba: u64, sectors: u64, mbr_signature: u32) -> Self {
        let mut path = Self::vdisk_prefix();
        let mut body = [0u8; 38];
        body[0..4].copy_from_slice(&1u32.to_le_bytes());
        body[4..12].copy_from_slice(&start_lba.to_le_bytes());
        body[12..20].copy_from_slice(&sectors.to_le_bytes());
        body[20..24].copy_from_slice(&mbr_signature.to_le_bytes());
        body[36] = MBR_PARTITION_FORMAT;
        body[37] = MBR_SIGNATURE_TYPE;
        path.node(MEDIA, MEDIA_HARD_DRIVE, &body);
        path.end()
    }

    /// This path with a file-path node for `file` inserted before the end.
    pub fn with_file(&self, file: &str) -> Self {
        let mut path = Self {
            bytes: self.bytes[..self.bytes.len() - 4].to_vec(),
        };
        let body: Vec<u8> = file
            .encode_utf16()
            .chain(core::iter::once(0))
            .flat_map(u16::to_le_bytes)
            .collect();
        path.node(MEDIA, MEDIA_FILE_PATH, &body);
        path.end()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `(type, subtype, length)` of each node, for inspection.
    pub fn nodes(&self) -> Vec<(u8, u8, u16)> {
        let mut nodes = Vec::new();
        let mut rest = &self.bytes[..];
        while rest.len() >= 4 {
            let len = u16::from_le_bytes([rest[2], rest[3]]);
            nodes.push((rest[0], rest[1], len));
            if (len as usize) < 4 || len as usize > rest.len() {
                break;
            }
            rest = &rest[len as usize..];
        }
        nodes
    }
}
