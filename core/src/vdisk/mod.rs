//! Virtual FAT32 disk over the catalog.
//!
//! The image is sparse. Metadata (MBR, boot sectors, FATs, directories) is
//! built in memory; file data is never copied and is served from each
//! file's [`FileEntry`] when a read falls inside its clusters. Everything
//! else reads as zero.

pub mod device;
pub mod dirent;
pub mod layout;
pub mod path;

pub use device::BlockDevice;
pub use path::DevicePath;

use crate::catalog::{names, FileEntry, FileSet};
use crate::error::{ConfigError, Result};
use crate::source::IoError;
use crate::{log_debug, log_warn};
use alloc::string::String;
use alloc::vec::Vec;
use dirent::{
    DirEntry, DirWriter, StoredName, ATTR_ARCHIVE, ATTR_DIRECTORY, ATTR_READ_ONLY, ATTR_VOLUME_ID,
};
use layout::{
    Fat32BootSector, FsInfoSector, Geometry, BACKUP_BOOT_SECTOR, CLUSTER_SIZE, FAT_EOC,
    FAT_MEDIA, FSINFO_SECTOR, NUM_FATS, ROOT_CLUSTER, SECTOR_SIZE, VOLUME_LABEL,
};

pub const PARTITION_LBA: u64 = 0x40;
pub const MBR_SIGNATURE: u32 = 0xc0ffeeee;

/// Directories that point back at the root so `\BOOT\BCD` and
/// `\SOURCES\BOOT.WIM` resolve in the flat file set.
const ROOT_ALIASES: [[u8; 11]; 2] = [*b"BOOT       ", *b"SOURCES    "];
const EFI_DIR: [u8; 11] = *b"EFI        ";
const DOT: [u8; 11] = *b".          ";
const DOTDOT: [u8; 11] = *b"..         ";

enum Content {
    Bytes(Vec<u8>),
    /// One of the FAT copies; both read from `VirtualDisk::fat`.
    Fat,
    /// Catalog file by index.
    File(usize),
}

struct Region {
    start: u64,
    len: u64,
    content: Content,
}

impl Region {
    fn end(&self) -> u64 {
        self.start + self.len
    }
}

/// A file placed on the volume.
struct Placement {
    entry: usize,
    /// `None` when only reachable through the boot alias.
    name: Option<StoredName>,
    cluster: u32,
    size: u32,
}

pub struct VirtualDisk {
    files: FileSet,
    regions: Vec<Region>,
    fat: Vec<u8>,
    geometry: Geometry,
    total_blocks: u64,
}

fn is_reserved(short: &[u8; 11]) -> bool {
    ROOT_ALIASES.contains(short) || *short == EFI_DIR
}

fn clusters_for(len: u64) -> u32 {
    len.div_ceil(CLUSTER_SIZE as u64) as u32
}

impl VirtualDisk {
    pub fn build(files: FileSet) -> Result<Self> {
        let entries = files.entries();
        let boot = files.boot_index();

        // One visible file per base name; the later registration wins. The
        // architecture boot name belongs to the boot target alone.
        let mut visible: Vec<(usize, StoredName)> = Vec::new();
        for (idx, entry) in entries.iter().enumerate() {
            let base = entry.base_name();
            let Some(name) = dirent::stored_name(base) else {
                log_warn!("{} cannot be stored on the virtual disk, skipping", entry.name());
                continue;
            };
            if is_reserved(&name.short) {
                log_warn!("{} clashes with a boot directory, skipping", entry.name());
                continue;
            }
            if idx != boot && base.eq_ignore_ascii_case(names::BOOT_ARCH_NAME) {
                log_warn!("{} is not the boot target, skipping", entry.name());
                continue;
            }
            match visible
                .iter_mut()
                .find(|(i, _)| entries[*i].base_name().eq_ignore_ascii_case(base))
            {
                Some(slot) => {
                    log_warn!("{} replaces {}", entry.name(), entries[slot.0].name());
                    *slot = (idx, name);
                }
                None => visible.push((idx, name)),
            }
        }

        for (idx, _) in &visible {
            let len = entries[*idx].len();
            if len > u32::MAX as u64 {
                return Err(ConfigError::FileTooLarge(String::from(entries[*idx].name())).into());
            }
        }

        // The boot manager must also be reachable as \EFI\BOOT\<arch>.
        let arch_visible = visible.iter().any(|(i, _)| {
            *i == boot && entries[*i].base_name().eq_ignore_ascii_case(names::BOOT_ARCH_NAME)
        });
        let boot_alias = if arch_visible {
            None
        } else {
            dirent::stored_name(names::BOOT_ARCH_NAME)
        };
        if entries[boot].len() > u32::MAX as u64 {
            return Err(ConfigError::FileTooLarge(String::from(entries[boot].name())).into());
        }

        let root_slots = 1
            + ROOT_ALIASES.len()
            + 1
            + visible.iter().map(|(_, n)| n.slots()).sum::<usize>()
            + boot_alias.as_ref().map_or(0, StoredName::slots);
        let root_clusters = clusters_for((root_slots * dirent::DIR_ENTRY_SIZE) as u64).max(1);
        let efi_cluster = ROOT_CLUSTER + root_clusters;
        let mut next_cluster = efi_cluster + 1;

        // Contiguous chains in catalog order.
        let mut chains: Vec<(u32, u32)> = Vec::new();
        chains.push((ROOT_CLUSTER, root_clusters));
        chains.push((efi_cluster, 1));

        let mut allocate = |len: u64, chains: &mut Vec<(u32, u32)>| -> u32 {
            let count = clusters_for(len);
            if count == 0 {
                return 0;
            }
            let first = next_cluster;
            chains.push((first, count));
            next_cluster += count;
            first
        };

        let mut placements: Vec<Placement> = Vec::new();
        for (idx, name) in visible {
            let len = entries[idx].len();
            let cluster = allocate(len, &mut chains);
            placements.push(Placement {
                entry: idx,
                name: Some(name),
                cluster,
                size: len as u32,
            });
        }
        let placed = placements.iter().find(|p| p.entry == boot).map(|p| p.cluster);
        let boot_cluster = match placed {
            Some(cluster) => cluster,
            None => {
                // hidden by a later file of the same name; keep its data
                let cluster = allocate(entries[boot].len(), &mut chains);
                placements.push(Placement {
                    entry: boot,
                    name: None,
                    cluster,
                    size: entries[boot].len() as u32,
                });
                cluster
            }
        };
        let used_clusters = next_cluster - 2;
        let geometry = Geometry::for_clusters(used_clusters);

        // FAT: reserved entries then one chain per directory and file.
        let mut fat_entries = alloc::vec![0u32; next_cluster as usize];
        fat_entries[0] = FAT_MEDIA;
        fat_entries[1] = FAT_EOC;
        for &(first, count) in &chains {
            for c in first..first + count {
                fat_entries[c as usize] = if c + 1 == first + count { FAT_EOC } else { c + 1 };
            }
        }
        let fat: Vec<u8> = fat_entries.iter().flat_map(|e| e.to_le_bytes()).collect();

        // Root directory
        let mut root = DirWriter::new();
        root.push(&DirEntry::new(VOLUME_LABEL, ATTR_VOLUME_ID, 0, 0));
        for alias in ROOT_ALIASES {
            root.push(&DirEntry::new(alias, ATTR_DIRECTORY, ROOT_CLUSTER, 0));
        }
        root.push(&DirEntry::new(EFI_DIR, ATTR_DIRECTORY, efi_cluster, 0));
        for p in &placements {
            if let Some(name) = &p.name {
                root.push_named(name, ATTR_READ_ONLY | ATTR_ARCHIVE, p.cluster, p.size);
            }
        }
        if let Some(alias) = &boot_alias {
            log_debug!(
                "{} also visible as {}",
                entries[boot].name(),
                names::BOOT_ARCH_NAME
            );
            root.push_named(
                alias,
                ATTR_READ_ONLY | ATTR_ARCHIVE,
                boot_cluster,
                entries[boot].len() as u32,
            );
        }
        let root = root.finish(CLUSTER_SIZE);

        // \EFI holds only BOOT -> root. ".." of a first-level directory is 0.
        let mut efi = DirWriter::new();
        efi.push(&DirEntry::new(DOT, ATTR_DIRECTORY, efi_cluster, 0));
        efi.push(&DirEntry::new(DOTDOT, ATTR_DIRECTORY, 0, 0));
        efi.push(&DirEntry::new(ROOT_ALIASES[0], ATTR_DIRECTORY, ROOT_CLUSTER, 0));
        let efi = efi.finish(CLUSTER_SIZE);

        let sector = |s: u32| (PARTITION_LBA + s as u64) * SECTOR_SIZE as u64;
        let cluster_offset = |c: u32| sector(geometry.cluster_to_sector(c));

        let boot_sector =
            Fat32BootSector::new(&geometry, PARTITION_LBA as u32, MBR_SIGNATURE).to_bytes();
        let free = geometry.clusters - used_clusters;
        let fsinfo = FsInfoSector::new(free, next_cluster).to_bytes();
        let mbr = layout::mbr(MBR_SIGNATURE, PARTITION_LBA as u32, geometry.total_sectors);

        let one_sector = |start: u64, bytes: &[u8; SECTOR_SIZE]| Region {
            start,
            len: SECTOR_SIZE as u64,
            content: Content::Bytes(bytes.to_vec()),
        };
        let mut regions = alloc::vec![
            one_sector(0, &mbr),
            one_sector(sector(0), &boot_sector),
            one_sector(sector(FSINFO_SECTOR), &fsinfo),
            one_sector(sector(BACKUP_BOOT_SECTOR), &boot_sector),
            one_sector(sector(BACKUP_BOOT_SECTOR + 1), &fsinfo),
        ];
        for copy in 0..NUM_FATS {
            regions.push(Region {
                start: sector(geometry.fat_start(copy)),
                len: fat.len() as u64,
                content: Content::Fat,
            });
        }
        regions.push(Region {
            start: cluster_offset(ROOT_CLUSTER),
            len: root.len() as u64,
            content: Content::Bytes(root),
        });
        regions.push(Region {
            start: cluster_offset(efi_cluster),
            len: efi.len() as u64,
            content: Content::Bytes(efi),
        });
        for p in placements.iter().filter(|p| p.cluster != 0) {
            regions.push(Region {
                start: cluster_offset(p.cluster),
                len: p.size as u64,
                content: Content::File(p.entry),
            });
        }
        regions.sort_by_key(|r| r.start);

        let total_blocks = PARTITION_LBA + geometry.total_sectors as u64;
        log_debug!(
            "virtual disk: {} blocks, {} clusters, {} used",
            total_blocks,
            geometry.clusters,
            used_clusters
        );

        Ok(Self {
            files,
            regions,
            fat,
            geometry,
            total_blocks,
        })
    }

    pub fn files(&self) -> &FileSet {
        &self.files
    }

    pub fn boot_target(&self) -> &FileEntry {
        self.files.boot_target()
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn block_size(&self) -> usize {
        SECTOR_SIZE
    }

    pub fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    pub fn partition_lba(&self) -> u64 {
        PARTITION_LBA
    }

    pub fn partition_blocks(&self) -> u64 {
        self.geometry.total_sectors as u64
    }

    pub fn media_id(&self) -> u32 {
        MBR_SIGNATURE
    }

    /// Fill `buf` with image bytes starting at byte `offset`.
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> core::result::Result<(), IoError> {
        let end = offset
            .checked_add(buf.len() as u64)
            .filter(|&end| end <= self.total_blocks * SECTOR_SIZE as u64)
            .ok_or(IoError::OutOfRange {
                offset,
                len: buf.len(),
            })?;
        buf.fill(0);

        let first = self.regions.partition_point(|r| r.end() <= offset);
        for region in self.regions[first..].iter().take_while(|r| r.start < end) {
            let from = offset.max(region.start);
            let to = end.min(region.end());
            if from >= to {
                continue;
            }
            let dst = &mut buf[(from - offset) as usize..(to - offset) as usize];
            let at = from - region.start;
            match &region.content {
                Content::Bytes(bytes) => {
                    dst.copy_from_slice(&bytes[at as usize..(to - region.start) as usize])
                }
                Content::Fat => {
                    dst.copy_from_slice(&self.fat[at as usize..(to - region.start) as usize])
                }
                Content::File(idx) => self.files.entries()[*idx].read(at, dst)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, NoContainer};
    use crate::config::BootConfig;
    use crate::source::{MemorySource, ReadAt};
    use alloc::rc::Rc;
    use alloc::vec;

    fn disk(files: &[(&str, &'static [u8])]) -> VirtualDisk {
        let config = BootConfig::default();
        let mut catalog = Catalog::new(&config, &NoContainer);
        for (name, data) in files {
            let src: Rc<dyn ReadAt> = Rc::new(MemorySource::new(*data));
            catalog.register(name, src).unwrap();
        }
        VirtualDisk::build(catalog.finish().unwrap()).unwrap()
    }

    fn sector(d: &VirtualDisk, lba: u64) -> Vec<u8> {
        let mut buf = vec![0u8; SECTOR_SIZE];
        d.read(lba * SECTOR_SIZE as u64, &mut buf).unwrap();
        buf
    }

    #[test]
    fn mbr_points_at_partition() {
        let d = disk(&[("bootmgfw.efi", b"MZ")]);
        let mbr = sector(&d, 0);
        assert_eq!(&mbr[510..], &[0x55, 0xAA]);
        assert_eq!(&mbr[446 + 8..446 + 12], &(PARTITION_LBA as u32).to_le_bytes());
        assert_eq!(
            &mbr[446 + 12..446 + 16],
            &(d.partition_blocks() as u32).to_le_bytes()
        );

        let bs = sector(&d, PARTITION_LBA);
        assert_eq!(&bs[0x52..0x5A], b"FAT32   ");
        assert_eq!(sector(&d, PARTITION_LBA + 6), bs);
    }

    #[test]
    fn file_bytes_come_from_catalog() {
        let d = disk(&[("bootmgfw.efi", b"MZ-boot"), ("BCD", b"x")]);
        let g = *d.geometry();
        // root (1 cluster), efi (1 cluster), then bootmgfw.efi
        let lba = PARTITION_LBA + g.cluster_to_sector(4) as u64;
        let data = sector(&d, lba);
        assert_eq!(&data[..7], b"MZ-boot");
        assert!(data[7..].iter().all(|&b| b == 0));
    }

    #[test]
    fn reads_past_the_end_fail() {
        let d = disk(&[("bootmgfw.efi", b"MZ")]);
        let mut buf = [0u8; SECTOR_SIZE];
        let last = (d.total_blocks() - 1) * SECTOR_SIZE as u64;
        assert!(d.read(last, &mut buf).is_ok());
        assert!(d.read(last + 1, &mut buf).is_err());
    }

    #[test]
    fn reads_span_regions() {
        let d = disk(&[("bootmgfw.efi", b"MZ")]);
        let mut buf = vec![0u8; 8 * SECTOR_SIZE];
        d.read(PARTITION_LBA * SECTOR_SIZE as u64, &mut buf).unwrap();
        assert_eq!(&buf[..SECTOR_SIZE], &sector(&d, PARTITION_LBA)[..]);
        assert_eq!(&buf[6 * SECTOR_SIZE..7 * SECTOR_SIZE], &sector(&d, PARTITION_LBA)[..]);
    }
}
