//! Wimboot Core Library
//!
//! Builds a newc archive and a read-only virtual FAT32 disk from a list of
//! files, picks the boot manager among them and hands it to firmware.
//! Designed to be no_std compatible.

#![no_std]
#![allow(clippy::new_without_default)]

extern crate alloc;

pub mod archive;
pub mod boot;
pub mod catalog;
pub mod config;
pub mod error;
pub mod logger;
pub mod pipeline;
pub mod source;
pub mod status;
pub mod vdisk;

pub use error::{ConfigError, FirmwareStep, WimbootError};
