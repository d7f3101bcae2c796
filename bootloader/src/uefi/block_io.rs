// UEFI Block I/O Protocol over the virtual disk devices

use super::{BLOCK_IO_PROTOCOL_GUID, DEVICE_PATH_PROTOCOL_GUID, EFI_NATIVE_INTERFACE};
use crate::BootServices;
use alloc::boxed::Box;
use core::ffi::c_void;
use core::ptr;
use wimboot_core::status::{self, Status};
use wimboot_core::vdisk::BlockDevice;

const BLOCK_IO_REVISION: u64 = 0x00010000;

#[repr(C)]
pub struct BlockIoProtocol {
    pub revision: u64,
    pub media: *const BlockIoMedia,
    pub reset: extern "efiapi" fn(*mut BlockIoProtocol, bool) -> usize,
    pub read_blocks: extern "efiapi" fn(
        *mut BlockIoProtocol,
        u32,     // MediaId
        u64,     // LBA
        usize,   // BufferSize
        *mut u8, // Buffer
    ) -> usize,
    pub write_blocks: extern "efiapi" fn(*mut BlockIoProtocol, u32, u64, usize, *const u8) -> usize,
    pub flush_blocks: extern "efiapi" fn(*mut BlockIoProtocol) -> usize,
}

#[repr(C)]
pub struct BlockIoMedia {
    pub media_id: u32,
    pub removable_media: bool,
    pub media_present: bool,
    pub logical_partition: bool,
    pub read_only: bool,
    pub write_caching: bool,
    pub block_size: u32,
    pub io_align: u32,
    pub last_block: u64,
}

/// Protocol instance handed to firmware. `protocol` must stay first so a
/// `*mut BlockIoProtocol` can be cast back.
#[repr(C)]
struct VirtualBlockIo {
    protocol: BlockIoProtocol,
    media: BlockIoMedia,
    device: &'static BlockDevice<'static>,
}

unsafe fn device<'a>(this: *mut BlockIoProtocol) -> &'a BlockDevice<'static> {
    (*(this as *mut VirtualBlockIo)).device
}

fn to_status(result: Result<(), Status>) -> usize {
    match result {
        Ok(()) => status::SUCCESS,
        Err(status) => status,
    }
}

extern "efiapi" fn reset(this: *mut BlockIoProtocol, extended: bool) -> usize {
    unsafe { device(this).reset(extended) }
}

extern "efiapi" fn read_blocks(
    this: *mut BlockIoProtocol,
    media_id: u32,
    lba: u64,
    size: usize,
    buffer: *mut u8,
) -> usize {
    if buffer.is_null() && size != 0 {
        return status::INVALID_PARAMETER;
    }
    unsafe {
        let dev = device(this);
        let buf: &mut [u8] = if size == 0 {
            &mut []
        } else {
            core::slice::from_raw_parts_mut(buffer, size)
        };
        to_status(dev.read(media_id, lba, buf))
    }
}

extern "efiapi" fn write_blocks(
    this: *mut BlockIoProtocol,
    media_id: u32,
    lba: u64,
    _size: usize,
    _buffer: *const u8,
) -> usize {
    unsafe { to_status(device(this).write(media_id, lba, &[])) }
}

extern "efiapi" fn flush_blocks(this: *mut BlockIoProtocol) -> usize {
    unsafe { device(this).flush() }
}

/// Publish `device` on a new handle with Block I/O and its device path.
pub fn install(bs: &BootServices, device: &'static BlockDevice<'static>) -> Result<*mut (), Status> {
    let instance = Box::leak(Box::new(VirtualBlockIo {
        protocol: BlockIoProtocol {
            revision: BLOCK_IO_REVISION,
            media: ptr::null(),
            reset,
            read_blocks,
            write_blocks,
            flush_blocks,
        },
        media: BlockIoMedia {
            media_id: device.media_id(),
            removable_media: false,
            media_present: true,
            logical_partition: device.is_partition(),
            read_only: true,
            write_caching: false,
            block_size: device.block_size(),
            io_align: 0,
            last_block: device.last_block(),
        },
        device,
    }));
    instance.protocol.media = &instance.media;

    let mut handle: *mut () = ptr::null_mut();
    let status = (bs.install_protocol_interface)(
        &mut handle,
        &BLOCK_IO_PROTOCOL_GUID,
        EFI_NATIVE_INTERFACE,
        &mut instance.protocol as *mut BlockIoProtocol as *mut c_void,
    );
    if status != status::SUCCESS {
        return Err(status);
    }

    let path = device.device_path().as_bytes();
    let status = (bs.install_protocol_interface)(
        &mut handle,
        &DEVICE_PATH_PROTOCOL_GUID,
        EFI_NATIVE_INTERFACE,
        path.as_ptr() as *mut c_void,
    );
    if status != status::SUCCESS {
        return Err(status);
    }
    Ok(handle)
}
