//! Read-time content rewriting.

/// In-place rewrite applied to every read of a file.
///
/// `offset` is the file offset of `data[0]`. Implementations may only change
/// bytes within `data`.
pub trait Patch {
    fn patch(&self, offset: u64, data: &mut [u8]);
}

const EXE: [u8; 8] = *b".\0e\0x\0e\0";
const EFI: [u8; 8] = *b".\0e\0f\0i\0";

/// Rewrites UTF-16LE `.exe` to `.efi` so one BCD store boots BIOS and UEFI.
///
/// Only matches wholly inside the buffer are rewritten.
pub struct BcdPatch;

impl Patch for BcdPatch {
    fn patch(&self, offset: u64, data: &mut [u8]) {
        if data.len() < EXE.len() {
            return;
        }
        for i in 0..=data.len() - EXE.len() {
            let window = &mut data[i..i + EXE.len()];
            if window.eq_ignore_ascii_case(&EXE) {
                window.copy_from_slice(&EFI);
                crate::log_debug!("patched BCD at {:#x}: .exe -> .efi", offset + i as u64);
            }
        }
    }
}
