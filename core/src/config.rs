//! Boot configuration and load-options parsing.
//!
//! Command syntax:
//!
//! ```text
//! [--gui|-g] [--rawbcd|-b] [--rawwim|-w] [--pause|-p] [--mem|-m]
//! [--index=N|-i N] [--inject=DIR|-j DIR] <file>...
//! ```
//!
//! Each `<file>` is either `@:NAME:PATH`, placing PATH in the archive as
//! NAME, or a bare `PATH` naming a prebuilt newc archive.

use crate::error::ConfigError;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Directory the container layer injects extra files into.
pub const DEFAULT_INJECT_DIR: &str = "\\Windows\\System32";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootConfig {
    /// Graphical boot messages. Parsed and logged only.
    pub gui: bool,
    /// Leave `.exe` references in the BCD untouched.
    pub raw_bcd: bool,
    /// Do not patch container files.
    pub raw_wim: bool,
    /// Wait for a key before starting the boot manager.
    pub pause: bool,
    /// Copy every input into one in-memory archive before booting.
    pub mem: bool,
    /// Container image index; 0 selects the container's boot image.
    pub index: u32,
    pub inject_dir: String,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            gui: false,
            raw_bcd: false,
            raw_wim: false,
            pause: false,
            mem: false,
            index: 0,
            inject_dir: String::from(DEFAULT_INJECT_DIR),
        }
    }
}

impl BootConfig {
    pub fn gui(mut self, on: bool) -> Self {
        self.gui = on;
        self
    }

    pub fn raw_bcd(mut self, on: bool) -> Self {
        self.raw_bcd = on;
        self
    }

    pub fn raw_wim(mut self, on: bool) -> Self {
        self.raw_wim = on;
        self
    }

    pub fn pause(mut self, on: bool) -> Self {
        self.pause = on;
        self
    }

    pub fn mem(mut self, on: bool) -> Self {
        self.mem = on;
        self
    }

    pub fn index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    pub fn inject_dir(mut self, dir: &str) -> Self {
        self.inject_dir = String::from(dir);
        self
    }
}

/// One file argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    /// Archive name; `None` for a prebuilt archive.
    pub name: Option<String>,
    pub path: String,
}

impl FileSpec {
    fn parse(arg: &str) -> Result<Self, ConfigError> {
        let Some(rest) = arg.strip_prefix("@:") else {
            return Ok(Self {
                name: None,
                path: arg.to_string(),
            });
        };
        let rest = rest.trim_start_matches('/');
        match rest.split_once(':') {
            Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok(Self {
                name: Some(name.to_string()),
                path: path.to_string(),
            }),
            _ => Err(ConfigError::MalformedArgument(arg.to_string())),
        }
    }
}

/// Parse a sequence of arguments, switches first or interleaved with files.
pub fn parse_args<'a, I>(args: I) -> Result<(BootConfig, Vec<FileSpec>), ConfigError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut config = BootConfig::default();
    let mut files = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let (opt, inline) = match arg.split_once('=') {
            Some((opt, value)) if opt.starts_with("--") => (opt, Some(value)),
            _ => (arg, None),
        };

        match opt {
            "--gui" | "-g" => config.gui = true,
            "--rawbcd" | "-b" => config.raw_bcd = true,
            "--rawwim" | "-w" => config.raw_wim = true,
            "--pause" | "-p" => config.pause = true,
            "--mem" | "-m" => config.mem = true,
            "--index" | "-i" => {
                let value = inline
                    .or_else(|| args.next())
                    .ok_or(ConfigError::MissingValue("--index"))?;
                config.index = value
                    .parse()
                    .map_err(|_| ConfigError::BadIndex(value.to_string()))?;
            }
            "--inject" | "-j" => {
                let value = inline
                    .or_else(|| args.next())
                    .ok_or(ConfigError::MissingValue("--inject"))?;
                config.inject_dir = value.to_string();
            }
            _ if opt.starts_with('-') => {
                return Err(ConfigError::MalformedArgument(arg.to_string()))
            }
            _ => files.push(FileSpec::parse(arg)?),
        }
    }

    if files.is_empty() {
        return Err(ConfigError::EmptyFileList);
    }
    Ok((config, files))
}

/// Parse a firmware load-options string.
///
/// Words are separated by whitespace. Shells put the image path first; a
/// leading word ending in `.efi` that is not a file argument is skipped.
pub fn parse_load_options(line: &str) -> Result<(BootConfig, Vec<FileSpec>), ConfigError> {
    let mut words = line.split_whitespace().peekable();
    if let Some(first) = words.peek() {
        if first.len() >= 4
            && first.as_bytes()[first.len() - 4..].eq_ignore_ascii_case(b".efi")
            && !first.starts_with("@:")
        {
            words.next();
        }
    }
    parse_args(words)
}
