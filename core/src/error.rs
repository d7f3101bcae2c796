//! Boot pipeline errors.
//!
//! Every stage returns one of these. Only the UEFI entry point turns an error
//! into a halt, printing `FATAL [<component>] <message> (status 0x<hex>)`.

use crate::archive::{ArchiveError, PlanError};
use crate::source::IoError;
use crate::status::Status;
use alloc::string::String;
use core::fmt;

/// Problems with the input list, detected before any firmware state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No file arguments were given.
    EmptyFileList,
    /// Unknown switch or a file argument that does not parse.
    MalformedArgument(String),
    /// A switch that needs a value was last on the line.
    MissingValue(&'static str),
    /// `--index` value is not a number.
    BadIndex(String),
    /// An input archive is malformed, or a name or size overflows a header field.
    Archive(ArchiveError),
    /// A file is too large for the virtual FAT32 volume.
    FileTooLarge(String),
    /// Nothing in the file set can be booted.
    NoBootTarget,
}

impl ConfigError {
    pub fn description(&self) -> &'static str {
        match self {
            Self::EmptyFileList => "no files specified",
            Self::MalformedArgument(_) => "malformed argument",
            Self::MissingValue(_) => "missing option value",
            Self::BadIndex(_) => "invalid image index",
            Self::Archive(_) => "bad archive",
            Self::FileTooLarge(_) => "file too large for virtual disk",
            Self::NoBootTarget => "no boot file found",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedArgument(arg) => write!(f, "{} '{}'", self.description(), arg),
            Self::MissingValue(opt) => write!(f, "{} for {}", self.description(), opt),
            Self::BadIndex(value) => write!(f, "{} '{}'", self.description(), value),
            Self::Archive(e) => write!(f, "{}: {}", self.description(), e),
            Self::FileTooLarge(name) => write!(f, "{} '{}'", self.description(), name),
            _ => f.write_str(self.description()),
        }
    }
}

/// Firmware call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareStep {
    InstallDisk,
    InstallPartition,
    LoadImage,
    HandleProtocol,
    StartImage,
    /// `StartImage` came back, which the boot manager never should.
    ImageReturned,
}

impl FirmwareStep {
    pub fn description(&self) -> &'static str {
        match self {
            Self::InstallDisk => "could not install disk block device",
            Self::InstallPartition => "could not install partition block device",
            Self::LoadImage => "could not load image",
            Self::HandleProtocol => "could not get loaded image protocol",
            Self::StartImage => "could not start image",
            Self::ImageReturned => "boot image returned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WimbootError {
    Config(ConfigError),
    Allocation {
        what: &'static str,
        size: u64,
        status: Option<Status>,
    },
    Io {
        file: String,
        error: IoError,
    },
    Firmware {
        step: FirmwareStep,
        status: Status,
    },
}

impl WimbootError {
    pub fn component(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Allocation { .. } => "alloc",
            Self::Io { .. } => "io",
            Self::Firmware { .. } => "firmware",
        }
    }

    /// Raw EFI status, when the failure came with one.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Config(_) => None,
            Self::Allocation { status, .. } => *status,
            Self::Io { error, .. } => error.status(),
            Self::Firmware { status, .. } => Some(*status),
        }
    }
}

impl fmt::Display for WimbootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{}", e),
            Self::Allocation { what, size, .. } => {
                write!(f, "could not allocate {} ({} bytes)", what, size)
            }
            Self::Io { file, error } => write!(f, "could not read {}: {}", file, error),
            Self::Firmware { step, .. } => f.write_str(step.description()),
        }
    }
}

impl From<ConfigError> for WimbootError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<PlanError> for WimbootError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::Field(e) => Self::Config(ConfigError::Archive(e)),
            PlanError::Read { path, error } => Self::Io { file: path, error },
            PlanError::BufferTooSmall { needed, .. } => Self::Allocation {
                what: "archive buffer",
                size: needed,
                status: None,
            },
        }
    }
}

pub type Result<T> = core::result::Result<T, WimbootError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status;
    use alloc::format;

    #[test]
    fn component_and_status_follow_variant() {
        let e = WimbootError::Firmware {
            step: FirmwareStep::LoadImage,
            status: status::LOAD_ERROR,
        };
        assert_eq!(e.component(), "firmware");
        assert_eq!(e.status(), Some(status::LOAD_ERROR));
        assert_eq!(format!("{}", e), "could not load image");

        let e = WimbootError::from(ConfigError::NoBootTarget);
        assert_eq!(e.component(), "config");
        assert_eq!(e.status(), None);
    }

    #[test]
    fn plan_errors_map_to_pipeline_errors() {
        let e = WimbootError::from(PlanError::Read {
            path: "boot.wim".into(),
            error: IoError::Device(status::DEVICE_ERROR),
        });
        assert_eq!(e.component(), "io");
        assert_eq!(e.status(), Some(status::DEVICE_ERROR));
        assert!(format!("{}", e).starts_with("could not read boot.wim"));

        let e = WimbootError::from(PlanError::Field(ArchiveError::FileTooLarge {
            len: 1 << 33,
        }));
        assert!(matches!(
            e,
            WimbootError::Config(ConfigError::Archive(ArchiveError::FileTooLarge { .. }))
        ));
    }
}
