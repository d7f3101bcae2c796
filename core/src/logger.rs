// Global logging system for wimboot

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Write};
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Mutex;

const MAX_LOG_ENTRIES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Console output hook. The UEFI entry point installs one that writes to ConOut.
pub type LogSink = fn(Level, &str);

/// Fixed-capacity ring of formatted log lines. Oldest entries are overwritten.
struct LogRing {
    entries: Vec<(Level, String)>,
    head: usize,
}

impl LogRing {
    const fn new() -> Self {
        Self {
            entries: Vec::new(),
            head: 0,
        }
    }

    fn push(&mut self, level: Level, line: String) {
        if self.entries.len() < MAX_LOG_ENTRIES {
            self.entries.push((level, line));
        } else {
            self.entries[self.head] = (level, line);
        }
        self.head = (self.head + 1) % MAX_LOG_ENTRIES;
    }

    fn chronological(&self) -> impl Iterator<Item = &(Level, String)> {
        let split = if self.entries.len() < MAX_LOG_ENTRIES {
            0
        } else {
            self.head
        };
        self.entries[split..].iter().chain(self.entries[..split].iter())
    }
}

static LOG_BUFFER: Mutex<LogRing> = Mutex::new(LogRing::new());
static LOG_COUNT: AtomicUsize = AtomicUsize::new(0); // Total logs written
static SINK: Mutex<Option<LogSink>> = Mutex::new(None);

/// Route future log lines to `sink` in addition to the ring buffer.
pub fn set_sink(sink: LogSink) {
    *SINK.lock() = Some(sink);
}

pub fn clear_sink() {
    *SINK.lock() = None;
}

pub fn log(level: Level, args: fmt::Arguments<'_>) {
    let mut line = String::new();
    let _ = line.write_fmt(args);

    let sink = *SINK.lock();
    if let Some(sink) = sink {
        if level > Level::Debug || cfg!(feature = "verbose") {
            sink(level, &line);
        }
    }

    LOG_COUNT.fetch_add(1, Ordering::SeqCst);
    LOG_BUFFER.lock().push(level, line);
}

/// Copy of every retained log line, oldest first.
pub fn get_logs() -> Vec<(Level, String)> {
    LOG_BUFFER.lock().chronological().cloned().collect()
}

/// Get the last N log entries (up to the ring capacity)
pub fn get_last_n_logs(n: usize) -> Vec<(Level, String)> {
    let ring = LOG_BUFFER.lock();
    let available = ring.entries.len();
    ring.chronological()
        .skip(available.saturating_sub(n))
        .cloned()
        .collect()
}

pub fn log_count() -> usize {
    LOG_COUNT.load(Ordering::SeqCst).min(MAX_LOG_ENTRIES)
}

pub fn total_log_count() -> usize {
    LOG_COUNT.load(Ordering::SeqCst)
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Debug, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Error, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_keeps_most_recent_entries_in_order() {
        let mut ring = LogRing::new();
        for i in 0..MAX_LOG_ENTRIES + 3 {
            ring.push(Level::Info, alloc::format!("line {}", i));
        }

        let lines: Vec<&str> = ring.chronological().map(|(_, l)| l.as_str()).collect();
        assert_eq!(lines.len(), MAX_LOG_ENTRIES);
        assert_eq!(lines[0], "line 3");
        assert_eq!(
            lines[MAX_LOG_ENTRIES - 1],
            alloc::format!("line {}", MAX_LOG_ENTRIES + 2)
        );
    }

    #[test]
    fn macros_record_formatted_lines() {
        crate::log_warn!("catalog has {} entries", 7);
        let last = get_last_n_logs(MAX_LOG_ENTRIES);
        assert!(last
            .iter()
            .any(|(level, line)| *level == Level::Warn && line == "catalog has 7 entries"));
    }
}
