//! Read-only block devices over the virtual disk image.
//!
//! Two views share one image: the whole disk from LBA 0, and the FAT32
//! partition from `PARTITION_LBA`. The firmware glue forwards Block I/O
//! protocol calls here; the same devices also implement
//! [`gpt_disk_io::BlockIo`] so tests can mount them like a real disk.

use super::path::DevicePath;
use super::VirtualDisk;
use crate::log_warn;
use crate::status::{
    self, Status, BAD_BUFFER_SIZE, DEVICE_ERROR, INVALID_PARAMETER, MEDIA_CHANGED,
    WRITE_PROTECTED,
};
use core::fmt;
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

pub struct BlockDevice<'a> {
    disk: &'a VirtualDisk,
    base_lba: u64,
    blocks: u64,
    partition: bool,
    path: DevicePath,
}

impl<'a> BlockDevice<'a> {
    pub fn whole_disk(disk: &'a VirtualDisk) -> Self {
        Self {
            disk,
            base_lba: 0,
            blocks: disk.total_blocks(),
            partition: false,
            path: DevicePath::disk(),
        }
    }

    pub fn partition(disk: &'a VirtualDisk) -> Self {
        Self {
            disk,
            base_lba: disk.partition_lba(),
            blocks: disk.partition_blocks(),
            partition: true,
            path: DevicePath::partition(
                disk.partition_lba(),
                disk.partition_blocks(),
                disk.media_id(),
            ),
        }
    }

    pub fn disk(&self) -> &'a VirtualDisk {
        self.disk
    }

    pub fn media_id(&self) -> u32 {
        self.disk.media_id()
    }

    pub fn block_size(&self) -> u32 {
        self.disk.block_size() as u32
    }

    pub fn last_block(&self) -> u64 {
        self.blocks - 1
    }

    pub fn is_partition(&self) -> bool {
        self.partition
    }

    pub fn base_lba(&self) -> u64 {
        self.base_lba
    }

    pub fn device_path(&self) -> &DevicePath {
        &self.path
    }

    pub fn read(&self, media_id: u32, lba: u64, buf: &mut [u8]) -> Result<(), Status> {
        if media_id != self.media_id() {
            return Err(MEDIA_CHANGED);
        }
        let block_size = self.disk.block_size();
        if buf.len() % block_size != 0 {
            return Err(BAD_BUFFER_SIZE);
        }
        let count = (buf.len() / block_size) as u64;
        match lba.checked_add(count) {
            Some(end) if end <= self.blocks => {}
            _ => return Err(INVALID_PARAMETER),
        }

        let offset = (lba + self.base_lba) * block_size as u64;
        self.disk.read(offset, buf).map_err(|e| {
            log_warn!("virtual disk read at LBA {:#x} failed: {}", lba, e);
            DEVICE_ERROR
        })
    }

    pub fn write(&self, _media_id: u32, _lba: u64, _buf: &[u8]) -> Result<(), Status> {
        Err(WRITE_PROTECTED)
    }

    pub fn reset(&self, _extended_verification: bool) -> Status {
        status::SUCCESS
    }

    pub fn flush(&self) -> Status {
        status::SUCCESS
    }
}

/// Status from a failed block operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockError(pub Status);

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "virtual block device error: {:#x}", self.0)
    }
}

impl BlockIo for BlockDevice<'_> {
    type Error = BlockError;

    fn block_size(&self) -> BlockSize {
        BlockSize::BS_512
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok(self.blocks)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        BlockDevice::read(self, self.media_id(), start_lba.0, dst).map_err(BlockError)
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        BlockDevice::write(self, self.media_id(), start_lba.0, src).map_err(BlockError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
