//! Minimal FAT32 reader for checking the virtual disk through `BlockIo`

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

const SECTOR_SIZE: usize = 512;
const ATTR_LONG_NAME: u8 = 0x0F;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;

/// One directory entry with its long name resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirItem {
    pub name: String,
    pub short: [u8; 11],
    pub long: bool,
    pub attr: u8,
    pub cluster: u32,
    pub size: u32,
}

impl DirItem {
    pub fn is_dir(&self) -> bool {
        self.attr & ATTR_DIRECTORY != 0
    }
}

pub struct Fat32Reader {
    pub sectors_per_cluster: u32,
    pub reserved_sectors: u32,
    pub fat_size: u32,
    pub num_fats: u32,
    pub root_cluster: u32,
    pub total_sectors: u32,
    pub data_start_sector: u32,
}

impl Fat32Reader {
    /// Parse the boot sector at block 0 of `dev`.
    pub fn mount<B: BlockIo>(dev: &mut B) -> Self {
        let mut bs = [0u8; SECTOR_SIZE];
        dev.read_blocks(Lba(0), &mut bs).expect("boot sector");
        assert_eq!(&bs[510..], &[0x55, 0xAA], "boot sector signature");
        assert_eq!(&bs[0x52..0x5A], b"FAT32   ");

        let u16_at = |o: usize| u16::from_le_bytes([bs[o], bs[o + 1]]) as u32;
        let u32_at = |o: usize| u32::from_le_bytes([bs[o], bs[o + 1], bs[o + 2], bs[o + 3]]);

        let sectors_per_cluster = bs[0x0D] as u32;
        let reserved_sectors = u16_at(0x0E);
        let num_fats = bs[0x10] as u32;
        let total_sectors = u32_at(0x20);
        let fat_size = u32_at(0x24);
        let root_cluster = u32_at(0x2C);

        Self {
            sectors_per_cluster,
            reserved_sectors,
            fat_size,
            num_fats,
            root_cluster,
            total_sectors,
            data_start_sector: reserved_sectors + num_fats * fat_size,
        }
    }

    pub fn cluster_count(&self) -> u32 {
        (self.total_sectors - self.data_start_sector) / self.sectors_per_cluster
    }

    pub fn cluster_to_sector(&self, cluster: u32) -> u32 {
        self.data_start_sector + (cluster - 2) * self.sectors_per_cluster
    }

    pub fn fat_entry<B: BlockIo>(&self, dev: &mut B, copy: u32, cluster: u32) -> u32 {
        let offset = cluster * 4;
        let sector = self.reserved_sectors + copy * self.fat_size + offset / SECTOR_SIZE as u32;
        let mut buf = [0u8; SECTOR_SIZE];
        dev.read_blocks(Lba(sector as u64), &mut buf).expect("fat sector");
        let at = (offset as usize) % SECTOR_SIZE;
        u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]) & 0x0FFFFFFF
    }

    /// Clusters of the chain starting at `first`.
    pub fn chain<B: BlockIo>(&self, dev: &mut B, first: u32) -> Vec<u32> {
        let mut clusters = Vec::new();
        let mut cur = first;
        while (2..0x0FFFFFF8).contains(&cur) {
            clusters.push(cur);
            assert!(clusters.len() < 1 << 20, "runaway FAT chain");
            cur = self.fat_entry(dev, 0, cur);
        }
        clusters
    }

    pub fn read_cluster<B: BlockIo>(&self, dev: &mut B, cluster: u32) -> Vec<u8> {
        let mut buf = vec![0u8; self.sectors_per_cluster as usize * SECTOR_SIZE];
        let lba = self.cluster_to_sector(cluster) as u64;
        dev.read_blocks(Lba(lba), &mut buf).expect("cluster read");
        buf
    }

    /// Contents of a file, following its FAT chain.
    pub fn read_file<B: BlockIo>(&self, dev: &mut B, item: &DirItem) -> Vec<u8> {
        let mut data = Vec::new();
        for cluster in self.chain(dev, item.cluster) {
            data.extend_from_slice(&self.read_cluster(dev, cluster));
        }
        data.truncate(item.size as usize);
        data
    }

    pub fn read_dir<B: BlockIo>(&self, dev: &mut B, cluster: u32) -> Vec<DirItem> {
        let mut raw = Vec::new();
        for c in self.chain(dev, cluster) {
            raw.extend_from_slice(&self.read_cluster(dev, c));
        }

        let mut items = Vec::new();
        let mut long: Vec<(u8, Vec<u16>)> = Vec::new();
        for entry in raw.chunks(32) {
            if entry[0] == 0 {
                break;
            }
            if entry[11] == ATTR_LONG_NAME {
                let chars = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30]
                    .iter()
                    .map(|&o| u16::from_le_bytes([entry[o], entry[o + 1]]))
                    .collect();
                long.push((entry[0] & 0x1F, chars));
                continue;
            }

            let mut short = [0u8; 11];
            short.copy_from_slice(&entry[..11]);
            let has_long = !long.is_empty();
            let name = if has_long {
                long.sort_by_key(|(seq, _)| *seq);
                let units: Vec<u16> = long
                    .drain(..)
                    .flat_map(|(_, chars)| chars)
                    .take_while(|&c| c != 0)
                    .collect();
                String::from_utf16(&units).expect("utf16 long name")
            } else {
                short_display(&short, entry[12])
            };

            items.push(DirItem {
                name,
                short,
                long: has_long,
                attr: entry[11],
                cluster: (u16::from_le_bytes([entry[20], entry[21]]) as u32) << 16
                    | u16::from_le_bytes([entry[26], entry[27]]) as u32,
                size: u32::from_le_bytes([entry[28], entry[29], entry[30], entry[31]]),
            });
        }
        items
    }

    /// Resolve a `\`-separated path from the root, case-insensitively.
    pub fn lookup<B: BlockIo>(&self, dev: &mut B, path: &str) -> Option<DirItem> {
        let mut dir = self.root_cluster;
        let mut found = None;
        for part in path.split('\\').filter(|p| !p.is_empty()) {
            let item = self
                .read_dir(dev, dir)
                .into_iter()
                .find(|i| i.attr & ATTR_VOLUME_ID == 0 && i.name.eq_ignore_ascii_case(part))?;
            dir = if item.cluster == 0 {
                self.root_cluster
            } else {
                item.cluster
            };
            found = Some(item);
        }
        found
    }
}

fn short_display(short: &[u8; 11], nt_case: u8) -> String {
    let mut base = String::from_utf8_lossy(&short[..8]).trim_end().to_string();
    let mut ext = String::from_utf8_lossy(&short[8..]).trim_end().to_string();
    if nt_case & 0x08 != 0 {
        base = base.to_ascii_lowercase();
    }
    if nt_case & 0x10 != 0 {
        ext = ext.to_ascii_lowercase();
    }
    if ext.is_empty() {
        base
    } else {
        format!("{}.{}", base, ext)
    }
}
