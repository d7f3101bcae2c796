//! File catalog.
//!
//! Collects the files that will appear on the virtual disk, classifies them
//! as they arrive and settles on exactly one boot target.

pub mod container;
pub mod names;
pub mod patch;

pub use container::{Container, NoContainer};
pub use patch::{BcdPatch, Patch};

use crate::archive::ArchiveReader;
use crate::config::BootConfig;
use crate::error::{ConfigError, Result, WimbootError};
use crate::source::{IoError, MemorySource, ReadAt};
use crate::{log_debug, log_info};
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

/// A file on the virtual disk.
#[derive(Clone)]
pub struct FileEntry {
    name: String,
    source: Rc<dyn ReadAt>,
    patch: Option<Rc<dyn Patch>>,
}

impl FileEntry {
    pub fn new(name: &str, source: Rc<dyn ReadAt>) -> Self {
        Self {
            name: String::from(name),
            source,
            patch: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_name(&self) -> &str {
        names::base_name(&self.name)
    }

    pub fn len(&self) -> u64 {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn source(&self) -> &Rc<dyn ReadAt> {
        &self.source
    }

    pub fn is_patched(&self) -> bool {
        self.patch.is_some()
    }

    /// Fill `buf` from `offset`, then run the patch hook over it.
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> core::result::Result<(), IoError> {
        self.source.read_exact_at(offset, buf)?;
        if let Some(patch) = &self.patch {
            patch.patch(offset, buf);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BootOrigin {
    Literal,
    Container,
}

pub struct Catalog<'a> {
    config: &'a BootConfig,
    container: &'a dyn Container,
    entries: Vec<FileEntry>,
    boot: Option<(usize, BootOrigin)>,
}

impl<'a> Catalog<'a> {
    pub fn new(config: &'a BootConfig, container: &'a dyn Container) -> Self {
        Self {
            config,
            container,
            entries: Vec::new(),
            boot: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&FileEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn boot_target(&self) -> Option<&FileEntry> {
        self.boot.map(|(idx, _)| &self.entries[idx])
    }

    /// Insert or replace by case-insensitive name.
    fn insert(&mut self, name: &str, source: Rc<dyn ReadAt>) -> usize {
        let len = source.len();
        let idx = match self
            .entries
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
        {
            Some(idx) => {
                log_debug!("replacing {} with new content", self.entries[idx].name);
                self.entries[idx] = FileEntry::new(name, source);
                idx
            }
            None => {
                self.entries.push(FileEntry::new(name, source));
                self.entries.len() - 1
            }
        };
        log_info!("file {}: {} ({} bytes)", idx, name, len);
        idx
    }

    /// Add a file and apply its special handling.
    ///
    /// A boot-name file becomes the boot target unless a literal one was
    /// already registered; it displaces a target taken from a container.
    pub fn register(&mut self, name: &str, source: Rc<dyn ReadAt>) -> Result<()> {
        let idx = self.insert(name, source.clone());

        if names::is_boot_name(name) {
            match self.boot {
                Some((_, BootOrigin::Literal)) => {}
                _ => {
                    log_info!("found boot file {}", name);
                    self.boot = Some((idx, BootOrigin::Literal));
                }
            }
        } else if names::is_bcd(name) {
            if !self.config.raw_bcd {
                log_debug!("patching {} .exe references", name);
                self.entries[idx].patch = Some(Rc::new(BcdPatch));
            }
        } else if names::is_container(name) {
            if !self.config.raw_wim {
                self.entries[idx].patch = self.container.patcher(&source, self.config);
            }
            if self.boot.is_none() {
                self.extract_boot_manager(name, &source)?;
            }
        }
        Ok(())
    }

    fn extract_boot_manager(&mut self, name: &str, source: &Rc<dyn ReadAt>) -> Result<()> {
        let inner = self
            .container
            .extract(source, self.config.index, names::CONTAINER_BOOT_PATH)
            .map_err(|error| WimbootError::Io {
                file: String::from(name),
                error,
            })?;

        if let Some(inner) = inner {
            log_info!(
                "extracted {} from {} as {}",
                names::CONTAINER_BOOT_PATH,
                name,
                names::BOOT_ARCH_NAME
            );
            let idx = self.insert(names::BOOT_ARCH_NAME, inner);
            self.boot = Some((idx, BootOrigin::Container));
        }
        Ok(())
    }

    /// Register every regular file in a newc buffer, possibly several
    /// archives back to back. Directories and trailers are skipped.
    pub fn extract_archive(&mut self, data: &'static [u8]) -> Result<()> {
        for record in ArchiveReader::new(data) {
            let record = record.map_err(ConfigError::Archive)?;
            if !record.is_file() {
                continue;
            }
            let name = record.name.trim_start_matches('/');
            if name.is_empty() {
                continue;
            }
            self.register(name, Rc::new(MemorySource::new(record.data)))?;
        }
        Ok(())
    }

    /// Close the catalog. Fails when nothing bootable was found.
    pub fn finish(self) -> Result<FileSet> {
        let (boot, _) = self.boot.ok_or(ConfigError::NoBootTarget)?;
        Ok(FileSet {
            entries: self.entries,
            boot,
        })
    }
}

/// The final file set, with its boot target.
pub struct FileSet {
    entries: Vec<FileEntry>,
    boot: usize,
}

impl FileSet {
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn boot_index(&self) -> usize {
        self.boot
    }

    pub fn boot_target(&self) -> &FileEntry {
        &self.entries[self.boot]
    }
}
