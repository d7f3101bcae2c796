//! Raw EFI status codes.
//!
//! Statuses stay plain `usize` values, matching the firmware ABI, so they can
//! be passed through FFI callbacks and printed verbatim in fatal reports.

pub type Status = usize;

const ERROR_BIT: usize = 1usize << (usize::BITS - 1);

pub const SUCCESS: Status = 0;
pub const LOAD_ERROR: Status = ERROR_BIT | 1;
pub const INVALID_PARAMETER: Status = ERROR_BIT | 2;
pub const UNSUPPORTED: Status = ERROR_BIT | 3;
pub const BAD_BUFFER_SIZE: Status = ERROR_BIT | 4;
pub const BUFFER_TOO_SMALL: Status = ERROR_BIT | 5;
pub const NOT_READY: Status = ERROR_BIT | 6;
pub const DEVICE_ERROR: Status = ERROR_BIT | 7;
pub const WRITE_PROTECTED: Status = ERROR_BIT | 8;
pub const OUT_OF_RESOURCES: Status = ERROR_BIT | 9;
pub const NO_MEDIA: Status = ERROR_BIT | 12;
pub const MEDIA_CHANGED: Status = ERROR_BIT | 13;
pub const NOT_FOUND: Status = ERROR_BIT | 14;

#[inline]
pub const fn is_error(status: Status) -> bool {
    status & ERROR_BIT != 0
}
