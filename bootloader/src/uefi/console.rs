// Firmware text console: log sink and key wait

use crate::{BootServices, InputKey, SimpleTextInputProtocol, SimpleTextOutputProtocol};
use core::fmt;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};
use wimboot_core::logger::{self, Level};

const EFI_BLACK: usize = 0x00;
const EFI_LIGHTGRAY: usize = 0x07;
const EFI_YELLOW: usize = 0x0E;
const EFI_LIGHTRED: usize = 0x0C;

static CON_OUT: AtomicPtr<SimpleTextOutputProtocol> = AtomicPtr::new(ptr::null_mut());
static CON_IN: AtomicPtr<SimpleTextInputProtocol> = AtomicPtr::new(ptr::null_mut());

#[derive(Clone, Copy)]
pub struct Console {
    out: *mut SimpleTextOutputProtocol,
    input: *mut SimpleTextInputProtocol,
}

impl Console {
    pub fn new(out: *mut SimpleTextOutputProtocol, input: *mut SimpleTextInputProtocol) -> Self {
        Self { out, input }
    }

    fn set_color(&self, foreground: usize) {
        if self.out.is_null() {
            return;
        }
        unsafe {
            ((*self.out).set_attribute)(self.out, foreground | (EFI_BLACK << 4));
        }
    }

    /// Write `text` as UTF-16, a chunk at a time.
    pub fn print(&self, text: &str) {
        if self.out.is_null() {
            return;
        }
        let mut buf = [0u16; 128];
        let mut len = 0;
        for unit in text.encode_utf16() {
            buf[len] = unit;
            len += 1;
            if len == buf.len() - 1 {
                self.flush(&mut buf, len);
                len = 0;
            }
        }
        if len > 0 {
            self.flush(&mut buf, len);
        }
    }

    fn flush(&self, buf: &mut [u16; 128], len: usize) {
        buf[len] = 0;
        unsafe {
            ((*self.out).output_string)(self.out, buf.as_ptr());
        }
    }

    /// Block until a key is pressed and swallow it.
    pub fn wait_for_key(&self, bs: &BootServices) {
        if self.input.is_null() {
            return;
        }
        unsafe {
            let input = &*self.input;
            (input.reset)(self.input, false);
            let mut index = 0usize;
            let event = input.wait_for_key;
            (bs.wait_for_event)(1, &event, &mut index);
            let mut key = InputKey {
                scan_code: 0,
                unicode_char: 0,
            };
            (input.read_key_stroke)(self.input, &mut key);
        }
    }
}

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.print(s);
        Ok(())
    }
}

fn sink(level: Level, line: &str) {
    let Some(console) = installed() else {
        return;
    };
    let color = match level {
        Level::Error => EFI_LIGHTRED,
        Level::Warn => EFI_YELLOW,
        _ => EFI_LIGHTGRAY,
    };
    console.set_color(color);
    if level >= Level::Warn {
        console.print(level.as_str());
        console.print(": ");
    }
    console.print(line);
    console.print("\r\n");
    console.set_color(EFI_LIGHTGRAY);
}

/// Make `console` the log sink and the panic handler's output.
pub fn install(console: Console) {
    CON_OUT.store(console.out, Ordering::SeqCst);
    CON_IN.store(console.input, Ordering::SeqCst);
    logger::set_sink(sink);
}

pub fn installed() -> Option<Console> {
    let out = CON_OUT.load(Ordering::SeqCst);
    if out.is_null() {
        return None;
    }
    Some(Console::new(out, CON_IN.load(Ordering::SeqCst)))
}
