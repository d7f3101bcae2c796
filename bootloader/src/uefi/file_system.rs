//! Loaded image and Simple File System access
//!
//! Inputs are opened on the volume this application was loaded from and read
//! lazily through [`HandleSource`].

use super::{LOADED_IMAGE_PROTOCOL_GUID, SIMPLE_FILE_SYSTEM_PROTOCOL_GUID};
use crate::BootServices;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::ptr;
use wimboot_core::archive::ArchiveEntry;
use wimboot_core::config::FileSpec;
use wimboot_core::error::{FirmwareStep, WimbootError};
use wimboot_core::log_debug;
use wimboot_core::source::{FileHandle, HandleSource, IoError};
use wimboot_core::status;

const EFI_FILE_MODE_READ: u64 = 0x0000000000000001;
/// Position value that seeks to end of file.
const END_OF_FILE: u64 = 0xFFFFFFFFFFFFFFFF;

#[repr(C)]
pub struct LoadedImageProtocol {
    _revision: u32,
    _parent_handle: *mut (),
    _system_table: *mut (),
    pub device_handle: *mut (),
    _file_path: *mut (),
    _reserved: *mut (),
    load_options_size: u32,
    load_options: *const u16,
    _image_base: *mut (),
    _image_size: u64,
    _image_code_type: u32,
    _image_data_type: u32,
    _unload: usize,
}

#[repr(C)]
pub struct SimpleFileSystemProtocol {
    _revision: u64,
    pub open_volume: extern "efiapi" fn(
        this: *mut SimpleFileSystemProtocol,
        root: *mut *mut FileProtocol,
    ) -> usize,
}

#[repr(C)]
pub struct FileProtocol {
    _revision: u64,
    pub open: extern "efiapi" fn(
        this: *mut FileProtocol,
        new_handle: *mut *mut FileProtocol,
        file_name: *const u16,
        open_mode: u64,
        attributes: u64,
    ) -> usize,
    pub close: extern "efiapi" fn(this: *mut FileProtocol) -> usize,
    _delete: usize,
    pub read: extern "efiapi" fn(
        this: *mut FileProtocol,
        buffer_size: *mut usize,
        buffer: *mut u8,
    ) -> usize,
    _write: usize,
    pub get_position: extern "efiapi" fn(this: *mut FileProtocol, position: *mut u64) -> usize,
    pub set_position: extern "efiapi" fn(this: *mut FileProtocol, position: u64) -> usize,
    _get_info: usize,
    _set_info: usize,
    _flush: usize,
}

/// Look up `guid` on `handle`.
pub unsafe fn handle_protocol<T>(
    bs: &BootServices,
    handle: *mut (),
    guid: &[u8; 16],
) -> Result<*mut T, usize> {
    let mut interface: *mut () = ptr::null_mut();
    let status = (bs.handle_protocol)(handle, guid, &mut interface);
    if status != status::SUCCESS {
        return Err(status);
    }
    if interface.is_null() {
        return Err(status::UNSUPPORTED);
    }
    Ok(interface as *mut T)
}

pub struct LoadedImage {
    bs: &'static BootServices,
    protocol: *mut LoadedImageProtocol,
}

impl LoadedImage {
    /// # Safety
    /// `image_handle` must be a live image handle.
    pub unsafe fn open(bs: &'static BootServices, image_handle: *mut ()) -> Result<Self, WimbootError> {
        let protocol = handle_protocol(bs, image_handle, &LOADED_IMAGE_PROTOCOL_GUID).map_err(
            |status| WimbootError::Firmware {
                step: FirmwareStep::HandleProtocol,
                status,
            },
        )?;
        Ok(Self { bs, protocol })
    }

    /// Load options as text, up to the first NUL.
    pub fn load_options(&self) -> String {
        let (data, size) = unsafe {
            (
                (*self.protocol).load_options,
                (*self.protocol).load_options_size as usize,
            )
        };
        if data.is_null() || size < 2 {
            return String::new();
        }
        let units = unsafe { core::slice::from_raw_parts(data, size / 2) };
        let end = units.iter().position(|&c| c == 0).unwrap_or(units.len());
        let text: String = char::decode_utf16(units[..end].iter().copied())
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
        log_debug!("load options: {}", text);
        text
    }

    /// Root directory of the volume the image was loaded from.
    ///
    /// # Safety
    /// The loaded image protocol must still be installed.
    pub unsafe fn volume(&self) -> Result<Volume, WimbootError> {
        let device = (*self.protocol).device_handle;
        let io = |status| WimbootError::Io {
            file: String::from("\\"),
            error: IoError::Device(status),
        };
        let fs: *mut SimpleFileSystemProtocol =
            handle_protocol(self.bs, device, &SIMPLE_FILE_SYSTEM_PROTOCOL_GUID).map_err(io)?;
        let mut root: *mut FileProtocol = ptr::null_mut();
        let status = ((*fs).open_volume)(fs, &mut root);
        if status != status::SUCCESS || root.is_null() {
            return Err(io(status));
        }
        Ok(Volume {
            root: UefiFile(root),
        })
    }
}

/// An open firmware file, closed on drop.
pub struct UefiFile(*mut FileProtocol);

impl UefiFile {
    fn check(status: usize) -> Result<(), IoError> {
        if status == status::SUCCESS {
            Ok(())
        } else {
            Err(IoError::Device(status))
        }
    }
}

impl FileHandle for UefiFile {
    fn size(&mut self) -> Result<u64, IoError> {
        let mut size = 0u64;
        unsafe {
            Self::check(((*self.0).set_position)(self.0, END_OF_FILE))?;
            Self::check(((*self.0).get_position)(self.0, &mut size))?;
            Self::check(((*self.0).set_position)(self.0, 0))?;
        }
        Ok(size)
    }

    fn set_position(&mut self, position: u64) -> Result<(), IoError> {
        unsafe { Self::check(((*self.0).set_position)(self.0, position)) }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        let mut len = buf.len();
        unsafe { Self::check(((*self.0).read)(self.0, &mut len, buf.as_mut_ptr()))? };
        Ok(len)
    }
}

impl Drop for UefiFile {
    fn drop(&mut self) {
        unsafe {
            ((*self.0).close)(self.0);
        }
    }
}

pub struct Volume {
    root: UefiFile,
}

impl Volume {
    /// Open `path` read-only. Forward slashes are accepted.
    pub fn open(&self, path: &str) -> Result<UefiFile, IoError> {
        let name: Vec<u16> = path
            .chars()
            .map(|c| if c == '/' { '\\' } else { c })
            .collect::<String>()
            .encode_utf16()
            .chain(core::iter::once(0))
            .collect();
        let root = self.root.0;
        let mut file: *mut FileProtocol = ptr::null_mut();
        let status =
            unsafe { ((*root).open)(root, &mut file, name.as_ptr(), EFI_FILE_MODE_READ, 0) };
        UefiFile::check(status)?;
        if file.is_null() {
            return Err(IoError::Device(status::NOT_FOUND));
        }
        Ok(UefiFile(file))
    }

    /// Open every file argument as an archive input.
    pub fn open_all(&self, specs: &[FileSpec]) -> Result<Vec<ArchiveEntry>, WimbootError> {
        let mut inputs = Vec::with_capacity(specs.len());
        for spec in specs {
            let source = self
                .open(&spec.path)
                .and_then(HandleSource::new)
                .map_err(|error| WimbootError::Io {
                    file: spec.path.clone(),
                    error,
                })?;
            log_debug!("opened {}", spec.path);
            let source = Rc::new(source);
            inputs.push(match &spec.name {
                Some(name) => ArchiveEntry::named(name, &spec.path, source),
                None => ArchiveEntry::raw(&spec.path, source),
            });
        }
        Ok(inputs)
    }
}
