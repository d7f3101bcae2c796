// `Firmware` over raw BootServices

use super::console::Console;
use super::file_system::{handle_protocol, LoadedImageProtocol};
use super::{block_io, EFI_LOADER_DATA, LOADED_IMAGE_PROTOCOL_GUID};
use crate::BootServices;
use core::ffi::c_void;
use core::ptr;
use wimboot_core::boot::{Firmware, PAGE_SIZE};
use wimboot_core::status::{self, Status};
use wimboot_core::vdisk::{BlockDevice, DevicePath};

const EFI_ALLOCATE_ANY_PAGES: usize = 0;

pub struct UefiFirmware {
    bs: &'static BootServices,
    image_handle: *mut (),
    console: Console,
}

impl UefiFirmware {
    pub fn new(bs: &'static BootServices, image_handle: *mut (), console: Console) -> Self {
        Self {
            bs,
            image_handle,
            console,
        }
    }

    fn loaded_image(&self, image: *mut ()) -> Result<*mut LoadedImageProtocol, Status> {
        unsafe { handle_protocol(self.bs, image, &LOADED_IMAGE_PROTOCOL_GUID) }
    }
}

impl Firmware for UefiFirmware {
    type Handle = *mut ();

    fn install_block_device(
        &mut self,
        device: &'static BlockDevice<'static>,
    ) -> Result<*mut (), Status> {
        block_io::install(self.bs, device)
    }

    fn allocate_pages(&mut self, pages: usize) -> Result<&'static mut [u8], Status> {
        if pages == 0 {
            return Ok(&mut []);
        }
        let mut addr = 0u64;
        let status = (self.bs.allocate_pages)(EFI_ALLOCATE_ANY_PAGES, EFI_LOADER_DATA, pages, &mut addr);
        if status != status::SUCCESS {
            return Err(status);
        }
        let len = pages * PAGE_SIZE;
        // SAFETY: firmware just handed us `pages` pages at `addr`; they are never freed
        unsafe {
            ptr::write_bytes(addr as *mut u8, 0, len);
            Ok(core::slice::from_raw_parts_mut(addr as *mut u8, len))
        }
    }

    fn load_image(&mut self, path: &DevicePath, image: &[u8]) -> Result<*mut (), Status> {
        let mut handle: *mut () = ptr::null_mut();
        let status = (self.bs.load_image)(
            false,
            self.image_handle,
            path.as_bytes().as_ptr() as *const (),
            image.as_ptr() as *const c_void,
            image.len(),
            &mut handle,
        );
        if status != status::SUCCESS {
            return Err(status);
        }
        Ok(handle)
    }

    fn image_device(&mut self, image: *mut ()) -> Result<*mut (), Status> {
        let loaded = self.loaded_image(image)?;
        Ok(unsafe { (*loaded).device_handle })
    }

    fn set_image_device(&mut self, image: *mut (), device: *mut ()) -> Result<(), Status> {
        let loaded = self.loaded_image(image)?;
        unsafe { (*loaded).device_handle = device };
        Ok(())
    }

    fn wait_for_key(&mut self) {
        self.console.wait_for_key(self.bs);
    }

    fn start_image(&mut self, image: *mut ()) -> Status {
        (self.bs.start_image)(image, ptr::null_mut(), ptr::null_mut())
    }
}
