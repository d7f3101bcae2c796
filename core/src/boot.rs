//! Boot hand-off.
//!
//! Copies the boot target into firmware pages, loads it as an image against
//! the virtual partition and starts it. Every firmware call goes through
//! [`Firmware`] so the sequence can run against a fake.

use crate::catalog::FileEntry;
use crate::config::BootConfig;
use crate::error::{FirmwareStep, Result, WimbootError};
use crate::status::{self, Status};
use crate::vdisk::{BlockDevice, DevicePath};
use crate::{log_debug, log_info};
use alloc::string::String;
use core::convert::Infallible;

pub const PAGE_SIZE: usize = 4096;

/// Firmware services used by the pipeline.
pub trait Firmware {
    type Handle: Copy + PartialEq + core::fmt::Debug;

    /// Publish `device` with Block I/O and Device Path protocols on a new
    /// handle.
    fn install_block_device(
        &mut self,
        device: &'static BlockDevice<'static>,
    ) -> core::result::Result<Self::Handle, Status>;

    /// Allocate `pages` zeroed 4 KiB pages that are never freed.
    fn allocate_pages(&mut self, pages: usize) -> core::result::Result<&'static mut [u8], Status>;

    fn load_image(
        &mut self,
        path: &DevicePath,
        image: &[u8],
    ) -> core::result::Result<Self::Handle, Status>;

    /// Device handle recorded in a loaded image.
    fn image_device(&mut self, image: Self::Handle) -> core::result::Result<Self::Handle, Status>;

    fn set_image_device(
        &mut self,
        image: Self::Handle,
        device: Self::Handle,
    ) -> core::result::Result<(), Status>;

    fn wait_for_key(&mut self);

    fn start_image(&mut self, image: Self::Handle) -> Status;
}

fn firmware(step: FirmwareStep) -> impl Fn(Status) -> WimbootError {
    move |status| WimbootError::Firmware { step, status }
}

pub fn pages_for(len: u64) -> usize {
    len.div_ceil(PAGE_SIZE as u64) as usize
}

/// Allocate pages for `len` bytes, reporting failures as `what`.
pub fn allocate<F: Firmware>(
    fw: &mut F,
    len: u64,
    what: &'static str,
) -> Result<&'static mut [u8]> {
    let pages = pages_for(len);
    let fail = |status| WimbootError::Allocation {
        what,
        size: len,
        status,
    };
    let buf = fw.allocate_pages(pages).map_err(|s| fail(Some(s)))?;
    if (buf.len() as u64) < len {
        return Err(fail(None));
    }
    Ok(buf)
}

/// Load and start `target`. Only returns on failure; a boot manager that
/// comes back is a failure too.
pub fn invoke<F: Firmware>(
    fw: &mut F,
    target: &FileEntry,
    path: &DevicePath,
    partition: F::Handle,
    config: &BootConfig,
) -> Result<Infallible> {
    let len = target.len();
    let buf = allocate(fw, len, "boot image")?;
    let image = &mut buf[..len as usize];
    target.read(0, image).map_err(|error| WimbootError::Io {
        file: String::from(target.name()),
        error,
    })?;

    let handle = fw
        .load_image(path, image)
        .map_err(firmware(FirmwareStep::LoadImage))?;
    log_info!("loaded {} ({} bytes)", target.name(), len);

    let device = fw
        .image_device(handle)
        .map_err(firmware(FirmwareStep::HandleProtocol))?;
    if device != partition {
        log_debug!("image device {:?} -> {:?}", device, partition);
        fw.set_image_device(handle, partition)
            .map_err(firmware(FirmwareStep::HandleProtocol))?;
    }

    if config.pause {
        log_info!("Press any key to continue booting...");
        fw.wait_for_key();
    }

    let status = fw.start_image(handle);
    let step = if status::is_error(status) {
        FirmwareStep::StartImage
    } else {
        FirmwareStep::ImageReturned
    };
    Err(WimbootError::Firmware { step, status })
}
