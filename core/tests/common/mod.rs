//! Common test utilities: in-memory sources, a recording firmware and a
//! stub container

#![allow(dead_code)]

pub mod fat;
pub use fat::Fat32Reader;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wimboot_core::archive::{self, ArchiveEntry};
use wimboot_core::boot::Firmware;
use wimboot_core::catalog::{Container, Patch};
use wimboot_core::config::BootConfig;
use wimboot_core::source::{FileHandle, IoError, MemorySource, ReadAt};
use wimboot_core::status::Status;
use wimboot_core::vdisk::{BlockDevice, DevicePath};

/// Leak `data` so it can back a `MemorySource`.
pub fn leak(data: &[u8]) -> &'static [u8] {
    Box::leak(data.to_vec().into_boxed_slice())
}

pub fn mem(data: &[u8]) -> Rc<dyn ReadAt> {
    Rc::new(MemorySource::new(leak(data)))
}

pub fn named(name: &str, data: &[u8]) -> ArchiveEntry {
    ArchiveEntry::named(name, &format!("/test/{}", name), mem(data))
}

pub fn raw(data: &[u8]) -> ArchiveEntry {
    ArchiveEntry::raw("/test/prebuilt.cpio", mem(data))
}

/// Render `entries` into a buffer sized by `measure`.
pub fn render(entries: &[ArchiveEntry]) -> Vec<u8> {
    let size = archive::measure(entries).expect("measure") as usize;
    let mut buf = vec![0xEEu8; size];
    let written = archive::render(entries, &mut buf).expect("render");
    assert_eq!(written, size);
    buf
}

pub fn utf16(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect()
}

/// A source whose reads always fail.
pub struct FailingSource {
    pub len: u64,
    pub status: Status,
}

impl ReadAt for FailingSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, _offset: u64, _buf: &mut [u8]) -> Result<usize, IoError> {
        Err(IoError::Device(self.status))
    }
}

/// In-memory file that hands out at most `chunk` bytes per read.
pub struct FakeHandle {
    pub data: Vec<u8>,
    pub pos: u64,
    pub chunk: usize,
    pub reads: Rc<Cell<usize>>,
}

impl FakeHandle {
    pub fn new(data: &[u8], chunk: usize) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
            chunk,
            reads: Rc::new(Cell::new(0)),
        }
    }
}

impl FileHandle for FakeHandle {
    fn size(&mut self) -> Result<u64, IoError> {
        Ok(self.data.len() as u64)
    }

    fn set_position(&mut self, position: u64) -> Result<(), IoError> {
        self.pos = position;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        self.reads.set(self.reads.get() + 1);
        let start = (self.pos as usize).min(self.data.len());
        let n = buf.len().min(self.chunk).min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

/// Marks every byte it patches, and counts calls.
pub struct MarkingPatch {
    pub calls: Cell<usize>,
}

impl Patch for MarkingPatch {
    fn patch(&self, _offset: u64, data: &mut [u8]) {
        self.calls.set(self.calls.get() + 1);
        if let Some(first) = data.first_mut() {
            *first = b'#';
        }
    }
}

/// Container stub: hands out a fixed boot manager for one image index.
pub struct FakeContainer {
    pub boot_manager: Option<&'static [u8]>,
    pub index: u32,
    pub extract_calls: Cell<usize>,
    pub requested: RefCell<Vec<(u32, String)>>,
    pub patch: Rc<MarkingPatch>,
}

impl FakeContainer {
    pub fn with_boot_manager(data: &[u8]) -> Self {
        Self {
            boot_manager: Some(leak(data)),
            index: 0,
            extract_calls: Cell::new(0),
            requested: RefCell::new(Vec::new()),
            patch: Rc::new(MarkingPatch {
                calls: Cell::new(0),
            }),
        }
    }

    pub fn empty() -> Self {
        Self {
            boot_manager: None,
            ..Self::with_boot_manager(b"")
        }
    }
}

impl Container for FakeContainer {
    fn patcher(&self, _file: &Rc<dyn ReadAt>, _config: &BootConfig) -> Option<Rc<dyn Patch>> {
        Some(self.patch.clone())
    }

    fn extract(
        &self,
        _file: &Rc<dyn ReadAt>,
        index: u32,
        path: &str,
    ) -> Result<Option<Rc<dyn ReadAt>>, IoError> {
        self.extract_calls.set(self.extract_calls.get() + 1);
        self.requested.borrow_mut().push((index, path.to_string()));
        if index != self.index {
            return Ok(None);
        }
        Ok(self
            .boot_manager
            .map(|data| Rc::new(MemorySource::new(data)) as Rc<dyn ReadAt>))
    }
}

/// What the fake firmware saw, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Install(usize),
    Allocate(usize),
    Load(usize),
    SetDevice { image: usize, device: usize },
    Key,
    Start(usize),
}

/// Recording firmware. Handles are plain integers: installed devices get
/// 100, 101, ..., images get 1, 2, ...
pub struct FakeFirmware {
    pub events: Vec<Event>,
    pub devices: Vec<&'static BlockDevice<'static>>,
    pub loaded_path: Option<DevicePath>,
    pub loaded_image: Vec<u8>,
    /// Device handle `LoadImage` records in the image.
    pub image_device: usize,
    pub start_status: Status,
    pub fail_install: Option<(usize, Status)>,
    pub fail_allocate: Option<Status>,
    pub fail_load: Option<Status>,
    /// Fails lookups of the loaded image's device handle.
    pub fail_image_device: Option<Status>,
    next_image: usize,
}

impl FakeFirmware {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            devices: Vec::new(),
            loaded_path: None,
            loaded_image: Vec::new(),
            image_device: 7,
            start_status: 0,
            fail_install: None,
            fail_allocate: None,
            fail_load: None,
            fail_image_device: None,
            next_image: 1,
        }
    }

    pub fn allocations(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Allocate(pages) => Some(*pages),
                _ => None,
            })
            .collect()
    }

    pub fn installed(&self) -> usize {
        self.devices.len()
    }
}

impl Firmware for FakeFirmware {
    type Handle = usize;

    fn install_block_device(
        &mut self,
        device: &'static BlockDevice<'static>,
    ) -> Result<usize, Status> {
        let handle = 100 + self.devices.len();
        if let Some((nth, status)) = self.fail_install {
            if nth == self.devices.len() {
                return Err(status);
            }
        }
        self.devices.push(device);
        self.events.push(Event::Install(handle));
        Ok(handle)
    }

    fn allocate_pages(&mut self, pages: usize) -> Result<&'static mut [u8], Status> {
        if let Some(status) = self.fail_allocate {
            return Err(status);
        }
        self.events.push(Event::Allocate(pages));
        Ok(Box::leak(vec![0u8; pages * 4096].into_boxed_slice()))
    }

    fn load_image(&mut self, path: &DevicePath, image: &[u8]) -> Result<usize, Status> {
        if let Some(status) = self.fail_load {
            return Err(status);
        }
        let handle = self.next_image;
        self.next_image += 1;
        self.loaded_path = Some(path.clone());
        self.loaded_image = image.to_vec();
        self.events.push(Event::Load(handle));
        Ok(handle)
    }

    fn image_device(&mut self, _image: usize) -> Result<usize, Status> {
        if let Some(status) = self.fail_image_device {
            return Err(status);
        }
        Ok(self.image_device)
    }

    fn set_image_device(&mut self, image: usize, device: usize) -> Result<(), Status> {
        self.image_device = device;
        self.events.push(Event::SetDevice { image, device });
        Ok(())
    }

    fn wait_for_key(&mut self) {
        self.events.push(Event::Key);
    }

    fn start_image(&mut self, image: usize) -> Status {
        self.events.push(Event::Start(image));
        self.start_status
    }
}
