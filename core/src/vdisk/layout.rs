// MBR and FAT32 metadata for the virtual disk

pub const SECTOR_SIZE: usize = 512;
pub const SECTORS_PER_CLUSTER: u32 = 8; // 4KB clusters
pub const CLUSTER_SIZE: usize = SECTOR_SIZE * SECTORS_PER_CLUSTER as usize;
pub const RESERVED_SECTORS: u32 = 32;
pub const NUM_FATS: u32 = 2;
pub const FSINFO_SECTOR: u32 = 1;
pub const BACKUP_BOOT_SECTOR: u32 = 6;
pub const ROOT_CLUSTER: u32 = 2;

/// Below 65525 clusters drivers treat the volume as FAT16.
pub const MIN_CLUSTERS: u32 = 0x10000;

pub const FAT_MEDIA: u32 = 0x0FFFFFF8;
pub const FAT_EOC: u32 = 0x0FFFFFFF;

const PARTITION_TYPE_FAT32_LBA: u8 = 0x0C;
const PARTITION_BOOTABLE: u8 = 0x80;

pub const VOLUME_LABEL: [u8; 11] = *b"WIMBOOT    ";

/// Sector counts for a volume with a given number of data clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub clusters: u32,
    pub fat_sectors: u32,
    pub total_sectors: u32,
}

impl Geometry {
    /// Smallest FAT32 volume holding `used` clusters past the reserved two.
    pub fn for_clusters(used: u32) -> Self {
        let clusters = used.max(MIN_CLUSTERS);
        let fat_sectors = ((clusters + 2) * 4).div_ceil(SECTOR_SIZE as u32);
        let total_sectors =
            RESERVED_SECTORS + NUM_FATS * fat_sectors + clusters * SECTORS_PER_CLUSTER;
        Self {
            clusters,
            fat_sectors,
            total_sectors,
        }
    }

    pub fn fat_start(&self, copy: u32) -> u32 {
        RESERVED_SECTORS + copy * self.fat_sectors
    }

    pub fn data_start(&self) -> u32 {
        RESERVED_SECTORS + NUM_FATS * self.fat_sectors
    }

    pub fn cluster_to_sector(&self, cluster: u32) -> u32 {
        self.data_start() + (cluster - 2) * SECTORS_PER_CLUSTER
    }
}

/// Master boot record with a single FAT32 partition.
pub fn mbr(signature: u32, partition_lba: u32, partition_sectors: u32) -> [u8; SECTOR_SIZE] {
    let mut sector = [0u8; SECTOR_SIZE];
    sector[440..444].copy_from_slice(&signature.to_le_bytes());

    let entry = &mut sector[446..462];
    entry[0] = PARTITION_BOOTABLE;
    // CHS fields marked as LBA-only
    entry[1..4].copy_from_slice(&[0xFE, 0xFF, 0xFF]);
    entry[4] = PARTITION_TYPE_FAT32_LBA;
    entry[5..8].copy_from_slice(&[0xFE, 0xFF, 0xFF]);
    entry[8..12].copy_from_slice(&partition_lba.to_le_bytes());
    entry[12..16].copy_from_slice(&partition_sectors.to_le_bytes());

    sector[510] = 0x55;
    sector[511] = 0xAA;
    sector
}

/// FAT32 Boot Sector (first 512 bytes of partition)
#[repr(C, packed)]
pub struct Fat32BootSector {
    jmp_boot: [u8; 3],       // Jump instruction
    oem_name: [u8; 8],       // OEM name
    bytes_per_sector: u16,   // Bytes per sector (usually 512)
    sectors_per_cluster: u8, // Sectors per cluster
    reserved_sectors: u16,   // Reserved sectors (usually 32 for FAT32)
    num_fats: u8,            // Number of FAT copies (usually 2)
    root_entry_count: u16,   // Root entries (0 for FAT32)
    total_sectors_16: u16,   // Total sectors (0 for FAT32)
    media_type: u8,          // Media descriptor (0xF8 for hard disk)
    fat_size_16: u16,        // FAT size (0 for FAT32)
    sectors_per_track: u16,  // Sectors per track
    num_heads: u16,          // Number of heads
    hidden_sectors: u32,     // Hidden sectors (LBA start)
    total_sectors_32: u32,   // Total sectors (actual count)
    fat_size_32: u32,        // FAT size in sectors
    ext_flags: u16,          // Extension flags
    fs_version: u16,         // Filesystem version
    root_cluster: u32,       // Root directory cluster (usually 2)
    fs_info_sector: u16,     // FSInfo sector (usually 1)
    backup_boot_sector: u16, // Backup boot sector (usually 6)
    reserved: [u8; 12],      // Reserved
    drive_number: u8,        // Drive number
    reserved1: u8,           // Reserved
    boot_signature: u8,      // Boot signature (0x29)
    volume_id: u32,          // Volume serial number
    volume_label: [u8; 11],  // Volume label
    fs_type: [u8; 8],        // Filesystem type ("FAT32   ")
    boot_code: [u8; 420],    // Boot code
    boot_sector_sig: u16,    // Boot sector signature (0xAA55)
}

const _: () = assert!(core::mem::size_of::<Fat32BootSector>() == SECTOR_SIZE);

impl Fat32BootSector {
    pub fn new(geometry: &Geometry, hidden_sectors: u32, volume_id: u32) -> Self {
        Self {
            jmp_boot: [0xEB, 0x58, 0x90], // JMP short + NOP
            oem_name: *b"WIMBOOT ",
            bytes_per_sector: SECTOR_SIZE as u16,
            sectors_per_cluster: SECTORS_PER_CLUSTER as u8,
            reserved_sectors: RESERVED_SECTORS as u16,
            num_fats: NUM_FATS as u8,
            root_entry_count: 0, // FAT32 uses cluster chain
            total_sectors_16: 0, // Use 32-bit field
            media_type: 0xF8,    // Hard disk
            fat_size_16: 0,      // Use 32-bit field
            sectors_per_track: 63,
            num_heads: 255,
            hidden_sectors,
            total_sectors_32: geometry.total_sectors,
            fat_size_32: geometry.fat_sectors,
            ext_flags: 0,
            fs_version: 0,
            root_cluster: ROOT_CLUSTER,
            fs_info_sector: FSINFO_SECTOR as u16,
            backup_boot_sector: BACKUP_BOOT_SECTOR as u16,
            reserved: [0; 12],
            drive_number: 0x80, // Hard disk
            reserved1: 0,
            boot_signature: 0x29,
            volume_id,
            volume_label: VOLUME_LABEL,
            fs_type: *b"FAT32   ",
            boot_code: [0; 420],
            boot_sector_sig: 0xAA55,
        }
    }

    pub fn to_bytes(&self) -> [u8; SECTOR_SIZE] {
        // SAFETY: packed, plain-old-data, size checked above
        unsafe { core::mem::transmute_copy(self) }
    }
}

/// FSInfo sector (sector 1)
#[repr(C, packed)]
pub struct FsInfoSector {
    lead_sig: u32, // 0x41615252
    reserved1: [u8; 480],
    struc_sig: u32,  // 0x61417272
    free_count: u32, // Free cluster count (-1 = unknown)
    next_free: u32,  // Next free cluster
    reserved2: [u8; 12],
    trail_sig: u32, // 0xAA550000
}

const _: () = assert!(core::mem::size_of::<FsInfoSector>() == SECTOR_SIZE);

impl FsInfoSector {
    pub fn new(free_count: u32, next_free: u32) -> Self {
        Self {
            lead_sig: 0x41615252,
            reserved1: [0; 480],
            struc_sig: 0x61417272,
            free_count,
            next_free,
            reserved2: [0; 12],
            trail_sig: 0xAA550000,
        }
    }

    pub fn to_bytes(&self) -> [u8; SECTOR_SIZE] {
        // SAFETY: packed, plain-old-data, size checked above
        unsafe { core::mem::transmute_copy(self) }
    }
}
