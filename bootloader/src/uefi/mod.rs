pub mod block_io;
pub mod console;
pub mod file_system;
pub mod firmware;

use uguid::guid;

// Protocol GUIDs, in the byte order BootServices expects
pub const BLOCK_IO_PROTOCOL_GUID: [u8; 16] =
    guid!("964e5b21-6459-11d2-8e39-00a0c969723b").to_bytes();
pub const DEVICE_PATH_PROTOCOL_GUID: [u8; 16] =
    guid!("09576e91-6d3f-11d2-8e39-00a0c969723b").to_bytes();
pub const LOADED_IMAGE_PROTOCOL_GUID: [u8; 16] =
    guid!("5b1b31a1-9562-11d2-8e3f-00a0c969723b").to_bytes();
pub const SIMPLE_FILE_SYSTEM_PROTOCOL_GUID: [u8; 16] =
    guid!("964e5b22-6459-11d2-8e39-00a0c969723b").to_bytes();

pub const EFI_NATIVE_INTERFACE: usize = 0;
pub const EFI_LOADER_DATA: usize = 2;
