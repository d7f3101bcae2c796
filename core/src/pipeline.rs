//! The whole boot sequence, from input list to `StartImage`.

use crate::archive::{self, ArchiveEntry};
use crate::boot::{self, Firmware};
use crate::catalog::{names, Catalog, Container};
use crate::config::BootConfig;
use crate::error::{ConfigError, FirmwareStep, Result, WimbootError};
use crate::source::ReadAt;
use crate::vdisk::{BlockDevice, VirtualDisk};
use crate::{log_debug, log_info};
use alloc::boxed::Box;
use core::convert::Infallible;

/// Copy `entry` into fresh pages.
fn load_whole<F: Firmware>(fw: &mut F, entry: &ArchiveEntry) -> Result<&'static [u8]> {
    let len = entry.source.len();
    let buf = boot::allocate(fw, len, "input file")?;
    let data = &mut buf[..len as usize];
    entry
        .source
        .read_exact_at(0, data)
        .map_err(|error| WimbootError::Io {
            file: entry.path.clone(),
            error,
        })?;
    Ok(data)
}

/// Fill `catalog` from the inputs.
///
/// With `mem`, every input is first rendered into one newc archive in
/// memory and the catalog takes its files from there. Otherwise named inputs
/// are read on demand and prebuilt archives are loaded and unpacked.
pub fn collect<F: Firmware>(
    fw: &mut F,
    config: &BootConfig,
    inputs: &[ArchiveEntry],
    catalog: &mut Catalog<'_>,
) -> Result<()> {
    if inputs.is_empty() {
        return Err(ConfigError::EmptyFileList.into());
    }

    if config.mem {
        let size = archive::measure(inputs)?;
        let buf = boot::allocate(fw, size, "archive")?;
        let written = archive::render(inputs, &mut buf[..size as usize])?;
        log_debug!("rendered {} inputs into {} bytes", inputs.len(), written);
        let data: &'static [u8] = buf;
        return catalog.extract_archive(&data[..written]);
    }

    for entry in inputs {
        match &entry.name {
            Some(name) => catalog.register(name, entry.source.clone())?,
            None => {
                let data = load_whole(fw, entry)?;
                catalog.extract_archive(data)?;
            }
        }
    }
    Ok(())
}

/// Build the disk, publish it and start the boot manager. Only returns on
/// failure.
pub fn run<F: Firmware>(
    fw: &mut F,
    config: &BootConfig,
    inputs: &[ArchiveEntry],
    container: &dyn Container,
) -> Result<Infallible> {
    if config.gui {
        log_info!("graphical boot messages requested");
    }

    let mut catalog = Catalog::new(config, container);
    collect(fw, config, inputs, &mut catalog)?;
    let files = catalog.finish()?;
    log_info!("booting {}", files.boot_target().name());

    // Handed to firmware for good.
    let disk: &'static VirtualDisk = Box::leak(Box::new(VirtualDisk::build(files)?));
    let whole: &'static BlockDevice<'static> = Box::leak(Box::new(BlockDevice::whole_disk(disk)));
    let partition: &'static BlockDevice<'static> =
        Box::leak(Box::new(BlockDevice::partition(disk)));

    fw.install_block_device(whole)
        .map_err(|status| WimbootError::Firmware {
            step: FirmwareStep::InstallDisk,
            status,
        })?;
    let part_handle = fw
        .install_block_device(partition)
        .map_err(|status| WimbootError::Firmware {
            step: FirmwareStep::InstallPartition,
            status,
        })?;

    let path = partition
        .device_path()
        .with_file(&names::boot_file_path());
    boot::invoke(fw, disk.boot_target(), &path, part_handle, config)
}
