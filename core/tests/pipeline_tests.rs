//! End-to-end runs of the boot sequence against a recording firmware

mod common;

use common::{
    named, raw, render, utf16, Event, FakeContainer, FakeFirmware, FakeHandle, Fat32Reader,
};
use std::rc::Rc;
use wimboot_core::archive::ArchiveEntry;
use wimboot_core::catalog::{names, NoContainer};
use wimboot_core::config::BootConfig;
use wimboot_core::error::{ConfigError, FirmwareStep, WimbootError};
use wimboot_core::pipeline;
use wimboot_core::source::HandleSource;
use wimboot_core::status;
use wimboot_core::vdisk::BlockDevice;

fn windows_inputs() -> Vec<ArchiveEntry> {
    vec![
        named("bootmgfw.efi", b"MZ-bootmgr"),
        named("BCD", &utf16("winload.exe")),
        named("boot.sdi", b"sdi"),
    ]
}

fn run(fw: &mut FakeFirmware, config: &BootConfig, inputs: &[ArchiveEntry]) -> WimbootError {
    match pipeline::run(fw, config, inputs, &NoContainer) {
        Err(e) => e,
        Ok(never) => match never {},
    }
}

/// Read `path` from the installed partition the way the boot manager would.
fn read_installed(fw: &FakeFirmware, path: &str) -> Vec<u8> {
    let mut dev = BlockDevice::partition(fw.devices[1].disk());
    let fs = Fat32Reader::mount(&mut dev);
    let item = fs.lookup(&mut dev, path).expect("file on disk");
    fs.read_file(&mut dev, &item)
}

#[test]
fn test_stream_mode_boots_from_virtual_partition() {
    let mut fw = FakeFirmware::new();
    let err = run(&mut fw, &BootConfig::default(), &windows_inputs());

    assert!(matches!(
        err,
        WimbootError::Firmware {
            step: FirmwareStep::ImageReturned,
            ..
        }
    ));
    assert_eq!(
        fw.events,
        [
            Event::Install(100),
            Event::Install(101),
            Event::Allocate(1),
            Event::Load(1),
            Event::SetDevice {
                image: 1,
                device: 101
            },
            Event::Start(1),
        ]
    );
    assert!(!fw.devices[0].is_partition());
    assert!(fw.devices[1].is_partition());
    assert_eq!(fw.loaded_image, b"MZ-bootmgr");

    let expected = fw.devices[1]
        .device_path()
        .with_file(&names::boot_file_path());
    assert_eq!(fw.loaded_path, Some(expected));

    assert_eq!(read_installed(&fw, &names::boot_file_path()), b"MZ-bootmgr");
    assert_eq!(read_installed(&fw, "\\boot\\bcd"), utf16("winload.efi"));
}

#[test]
fn test_mem_mode_renders_inputs_first() {
    let inputs = windows_inputs();
    let mut fw = FakeFirmware::new();
    let config = BootConfig::default().mem(true);
    run(&mut fw, &config, &inputs);

    let archive_pages = (render(&inputs).len() + 4095) / 4096;
    assert_eq!(fw.allocations(), [archive_pages, 1]);
    assert_eq!(fw.events[0], Event::Allocate(archive_pages));
    assert_eq!(fw.loaded_image, b"MZ-bootmgr");
    assert_eq!(read_installed(&fw, "\\boot.sdi"), b"sdi");
}

#[test]
fn test_prebuilt_archive_is_loaded_and_unpacked() {
    let prebuilt = render(&[
        named("efi/boot/bootmgfw.efi", b"MZ-packed"),
        named("efi/microsoft/boot/bcd", b"regf"),
    ]);
    let inputs = [raw(&prebuilt), named("extra.txt", b"x")];
    let mut fw = FakeFirmware::new();
    run(&mut fw, &BootConfig::default(), &inputs);

    assert_eq!(fw.allocations()[0], (prebuilt.len() + 4095) / 4096);
    assert_eq!(fw.loaded_image, b"MZ-packed");
    assert_eq!(read_installed(&fw, "\\bcd"), b"regf");
    assert_eq!(read_installed(&fw, "\\extra.txt"), b"x");
}

#[test]
fn test_boot_manager_from_container() {
    let container = FakeContainer::with_boot_manager(b"MZ-inside-wim");
    let inputs = [
        named("BCD", b"regf"),
        named("sources/boot.wim", b"MSWIM\0\0\0"),
    ];
    let mut fw = FakeFirmware::new();
    let err = pipeline::run(&mut fw, &BootConfig::default(), &inputs, &container).unwrap_err();

    assert_eq!(err.component(), "firmware");
    assert_eq!(fw.loaded_image, b"MZ-inside-wim");
    assert_eq!(
        read_installed(&fw, &names::boot_file_path()),
        b"MZ-inside-wim"
    );
}

#[test]
fn test_install_failures_name_the_device() {
    let mut fw = FakeFirmware::new();
    fw.fail_install = Some((0, status::OUT_OF_RESOURCES));
    let err = run(&mut fw, &BootConfig::default(), &windows_inputs());
    assert_eq!(
        err,
        WimbootError::Firmware {
            step: FirmwareStep::InstallDisk,
            status: status::OUT_OF_RESOURCES
        }
    );
    assert!(fw.events.is_empty());

    let mut fw = FakeFirmware::new();
    fw.fail_install = Some((1, status::OUT_OF_RESOURCES));
    let err = run(&mut fw, &BootConfig::default(), &windows_inputs());
    assert_eq!(
        err,
        WimbootError::Firmware {
            step: FirmwareStep::InstallPartition,
            status: status::OUT_OF_RESOURCES
        }
    );
    assert_eq!(fw.events, [Event::Install(100)]);
}

#[test]
fn test_handle_backed_inputs_are_read_on_demand() {
    let bootmgr = FakeHandle::new(b"MZ-bootmgr-from-volume", 4);
    let reads = bootmgr.reads.clone();
    let sdi = FakeHandle::new(b"sdi-from-volume", 5);
    let inputs = vec![
        ArchiveEntry::named(
            "bootmgfw.efi",
            "\\efi\\bootmgfw.efi",
            Rc::new(HandleSource::new(bootmgr).unwrap()),
        ),
        ArchiveEntry::named(
            "boot.sdi",
            "\\boot.sdi",
            Rc::new(HandleSource::new(sdi).unwrap()),
        ),
    ];
    assert_eq!(reads.get(), 0);

    let mut fw = FakeFirmware::new();
    run(&mut fw, &BootConfig::default(), &inputs);

    assert!(reads.get() >= 6);
    assert_eq!(fw.loaded_image, b"MZ-bootmgr-from-volume");
    assert_eq!(read_installed(&fw, "\\boot.sdi"), b"sdi-from-volume");
}

#[test]
fn test_empty_input_list() {
    let mut fw = FakeFirmware::new();
    let err = run(&mut fw, &BootConfig::default(), &[]);
    assert_eq!(err, WimbootError::Config(ConfigError::EmptyFileList));
    assert!(fw.events.is_empty());
}

#[test]
fn test_missing_boot_file_changes_no_firmware_state() {
    let inputs = [named("BCD", b"regf"), named("boot.sdi", b"sdi")];
    let mut fw = FakeFirmware::new();
    let err = run(&mut fw, &BootConfig::default(), &inputs);

    assert_eq!(err, WimbootError::Config(ConfigError::NoBootTarget));
    assert_eq!(fw.installed(), 0);
    assert_eq!(err.to_string(), "no boot file found");
}

#[test]
fn test_pause_and_returned_status_reach_the_caller() {
    let mut fw = FakeFirmware::new();
    fw.start_status = status::DEVICE_ERROR;
    let config = BootConfig::default().pause(true);
    let err = run(&mut fw, &config, &windows_inputs());

    assert!(fw.events.contains(&Event::Key));
    assert_eq!(err.status(), Some(status::DEVICE_ERROR));
    assert_eq!(err.to_string(), "could not start image");
}
