//! Well-known file names.

use alloc::string::String;

#[cfg(target_arch = "x86_64")]
pub const BOOT_ARCH_NAME: &str = "bootx64.efi";
#[cfg(target_arch = "x86")]
pub const BOOT_ARCH_NAME: &str = "bootia32.efi";
#[cfg(target_arch = "aarch64")]
pub const BOOT_ARCH_NAME: &str = "bootaa64.efi";
#[cfg(target_arch = "arm")]
pub const BOOT_ARCH_NAME: &str = "bootarm.efi";
#[cfg(target_arch = "riscv64")]
pub const BOOT_ARCH_NAME: &str = "bootriscv64.efi";

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "x86",
    target_arch = "aarch64",
    target_arch = "arm",
    target_arch = "riscv64"
)))]
compile_error!("no removable-media boot file name for this architecture");

/// Boot manager name accepted on every architecture.
pub const GENERIC_BOOT_NAME: &str = "bootmgfw.efi";

pub const BCD_NAME: &str = "BCD";

pub const CONTAINER_EXTENSION: &str = ".wim";

/// Boot manager location inside a container image.
pub const CONTAINER_BOOT_PATH: &str = "\\Windows\\Boot\\EFI\\bootmgfw.efi";

/// Last component of a `/` or `\` separated path.
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

pub fn is_boot_name(name: &str) -> bool {
    let base = base_name(name);
    base.eq_ignore_ascii_case(BOOT_ARCH_NAME) || base.eq_ignore_ascii_case(GENERIC_BOOT_NAME)
}

pub fn is_bcd(name: &str) -> bool {
    base_name(name).eq_ignore_ascii_case(BCD_NAME)
}

pub fn is_container(name: &str) -> bool {
    let base = base_name(name).as_bytes();
    let ext = CONTAINER_EXTENSION.as_bytes();
    base.len() > ext.len() && base[base.len() - ext.len()..].eq_ignore_ascii_case(ext)
}

/// `\EFI\BOOT\BOOTX64.EFI` or the equivalent for this architecture.
pub fn boot_file_path() -> String {
    let mut path = String::from("\\EFI\\BOOT\\");
    path.push_str(&BOOT_ARCH_NAME.to_ascii_uppercase());
    path
}
