//! Wimboot UEFI application
//!
//! Reads its file list from the load options, opens the files on the volume
//! it was started from, builds the virtual disk and chain-loads the boot
//! manager found among them. Returns only by halting on a fatal error.

#![no_std]
#![no_main]

extern crate alloc;

use core::fmt::Write;
use core::panic::PanicInfo;

mod uefi;
mod uefi_allocator;

use uefi::console::Console;
use uefi::firmware::UefiFirmware;
use wimboot_core::catalog::NoContainer;
use wimboot_core::{pipeline, WimbootError};

#[repr(C)]
pub struct InputKey {
    pub scan_code: u16,
    pub unicode_char: u16,
}

#[repr(C)]
pub struct SimpleTextInputProtocol {
    pub reset: extern "efiapi" fn(*mut SimpleTextInputProtocol, bool) -> usize,
    pub read_key_stroke: extern "efiapi" fn(*mut SimpleTextInputProtocol, *mut InputKey) -> usize,
    pub wait_for_key: *mut (),
}

#[repr(C)]
pub struct SimpleTextOutputProtocol {
    pub reset: extern "efiapi" fn(*mut SimpleTextOutputProtocol, bool) -> usize,
    pub output_string: extern "efiapi" fn(*mut SimpleTextOutputProtocol, *const u16) -> usize,
    _test_string: usize,
    _query_mode: usize,
    _set_mode: usize,
    pub set_attribute: extern "efiapi" fn(*mut SimpleTextOutputProtocol, usize) -> usize,
    _clear_screen: usize,
    _set_cursor_position: usize,
    _enable_cursor: usize,
    _mode: *const (),
}

#[repr(C)]
pub struct SystemTable {
    _header: [u8; 24],
    _firmware_vendor: *const u16,
    _firmware_revision: u32,
    _console_in_handle: *const (),
    pub con_in: *mut SimpleTextInputProtocol,
    _console_out_handle: *const (),
    pub con_out: *mut SimpleTextOutputProtocol,
    _stderr_handle: *const (),
    _stderr: *const (),
    _runtime_services: *const (),
    pub boot_services: *const BootServices,
    _number_of_table_entries: usize,
    _configuration_table: *const (),
}

#[repr(C)]
pub struct BootServices {
    _header: [u8; 24],
    // Task Priority Services
    _raise_tpl: usize,
    _restore_tpl: usize,
    // Memory Services
    pub allocate_pages: extern "efiapi" fn(
        allocate_type: usize,
        memory_type: usize,
        pages: usize,
        memory: *mut u64,
    ) -> usize,
    _free_pages: usize,
    _get_memory_map: usize,
    pub allocate_pool:
        extern "efiapi" fn(pool_type: usize, size: usize, buffer: *mut *mut u8) -> usize,
    pub free_pool: extern "efiapi" fn(buffer: *mut u8) -> usize,
    // Event & Timer Services
    _create_event: usize,
    _set_timer: usize,
    pub wait_for_event:
        extern "efiapi" fn(number_of_events: usize, event: *const *mut (), index: *mut usize) -> usize,
    _signal_event: usize,
    _close_event: usize,
    _check_event: usize,
    // Protocol Handler Services
    pub install_protocol_interface: extern "efiapi" fn(
        handle: *mut *mut (),
        protocol: *const [u8; 16],
        interface_type: usize,
        interface: *mut core::ffi::c_void,
    ) -> usize,
    _reinstall_protocol_interface: usize,
    _uninstall_protocol_interface: usize,
    pub handle_protocol: extern "efiapi" fn(
        handle: *mut (),
        protocol: *const [u8; 16],
        interface: *mut *mut (),
    ) -> usize,
    _reserved: usize,
    _register_protocol_notify: usize,
    _locate_handle: usize,
    _locate_device_path: usize,
    _install_configuration_table: usize,
    // Image Services
    pub load_image: extern "efiapi" fn(
        boot_policy: bool,
        parent_image_handle: *mut (),
        file_path: *const (),
        source_buffer: *const core::ffi::c_void,
        source_size: usize,
        image_handle: *mut *mut (),
    ) -> usize,
    pub start_image: extern "efiapi" fn(
        image_handle: *mut (),
        exit_data_size: *mut usize,
        exit_data: *mut *mut u16,
    ) -> usize,
    _exit: usize,
    _unload_image: usize,
    _exit_boot_services: usize,
    // Miscellaneous Services
    _get_next_monotonic_count: usize,
    _stall: usize,
    pub set_watchdog_timer: extern "efiapi" fn(
        timeout: usize,
        watchdog_code: u64,
        data_size: usize,
        watchdog_data: *const u16,
    ) -> usize,
}

#[no_mangle]
pub extern "efiapi" fn efi_main(image_handle: *mut (), system_table: *const ()) -> usize {
    // SAFETY: firmware hands us a valid system table that outlives boot services
    let st = unsafe { &*(system_table as *const SystemTable) };
    let bs = unsafe { &*st.boot_services };

    uefi_allocator::set_boot_services(st.boot_services);
    let console = Console::new(st.con_out, st.con_in);
    uefi::console::install(console);

    // The boot manager re-arms the watchdog itself.
    let _ = (bs.set_watchdog_timer)(0, 0, 0, core::ptr::null());

    let err = match run(image_handle, bs, console) {
        Ok(never) => match never {},
        Err(err) => err,
    };
    fatal(console, &err)
}

fn run(
    image_handle: *mut (),
    bs: &'static BootServices,
    console: Console,
) -> Result<core::convert::Infallible, WimbootError> {
    // SAFETY: image_handle is our own image, valid for the whole run
    let image = unsafe { uefi::file_system::LoadedImage::open(bs, image_handle)? };
    let options = image.load_options();
    let (config, specs) = wimboot_core::config::parse_load_options(&options)?;

    let volume = unsafe { image.volume()? };
    let inputs = volume.open_all(&specs)?;

    let mut fw = UefiFirmware::new(bs, image_handle, console);
    pipeline::run(&mut fw, &config, &inputs, &NoContainer)
}

fn fatal(mut console: Console, err: &WimbootError) -> ! {
    let _ = match err.status() {
        Some(status) => write!(
            console,
            "FATAL [{}] {} (status 0x{:x})\r\n",
            err.component(),
            err,
            status
        ),
        None => write!(console, "FATAL [{}] {}\r\n", err.component(), err),
    };
    halt()
}

fn halt() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    if let Some(mut console) = uefi::console::installed() {
        let _ = write!(console, "FATAL [panic] {}\r\n", info);
    }
    halt()
}
