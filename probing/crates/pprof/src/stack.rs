use std::ffi::c_void;
use std::io::{self, Write};

use crate::DEBUG_STACKS;

/// Deepest stack that will be recorded, frames beyond it are dropped.
pub const MAX_FRAMES: usize = 64;

/// A call stack captured as raw instruction pointers.
///
/// Capturing only walks the stack; symbols are resolved when the stack is
/// written, so recording a stack stays cheap on hot paths such as thread
/// creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Stack {
    frames: Vec<usize>,
}

/// One resolved symbol of a frame. Inlined functions produce several symbols
/// for the same address.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub filename: Option<String>,
    pub lineno: Option<u32>,
}

impl Stack {
    /// Captures the stack of the calling thread, skipping `skip` frames above
    /// the caller of `capture`.
    #[inline(never)]
    pub fn capture(skip: usize) -> Self {
        let mut frames = Vec::new();
        let mut to_skip = skip + 1;
        backtrace::trace(|frame| {
            if to_skip > 0 {
                to_skip -= 1;
                return true;
            }
            frames.push(frame.ip() as usize);
            frames.len() < MAX_FRAMES
        });
        Self { frames }
    }

    pub fn from_addresses(frames: Vec<usize>) -> Self {
        Self { frames }
    }

    pub fn addresses(&self) -> &[usize] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Writes the stack at the given debug level. Level 0 writes nothing,
    /// level 1 one line per frame with the address and the outermost symbol,
    /// level 2 every symbol of every frame with file and line.
    pub fn write_to(&self, w: &mut dyn Write, debug: u8) -> io::Result<()> {
        match debug {
            0 => Ok(()),
            DEBUG_STACKS => {
                for ip in &self.frames {
                    let name = resolve(*ip)
                        .into_iter()
                        .last()
                        .map(|s| s.name)
                        .unwrap_or_else(|| "<unknown>".to_string());
                    writeln!(w, "#\t{:#x}\t{}", ip, name)?;
                }
                Ok(())
            }
            _ => self.write_symbolized(w),
        }
    }

    fn write_symbolized(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{} frames:", self.frames.len())?;
        for (cnt, ip) in self.frames.iter().enumerate() {
            writeln!(w, "frame #{:<2} - {:#02$x}:", cnt, ip, 20)?;
            let symbols = resolve(*ip);
            if symbols.is_empty() {
                writeln!(w, "\t<unknown>")?;
            }
            for symbol in symbols {
                if let (Some(filename), Some(lineno)) = (&symbol.filename, symbol.lineno) {
                    writeln!(w, "\t{}\n\t  at {:13} : {:4}", symbol.name, filename, lineno)?;
                } else {
                    writeln!(w, "\t{}", symbol.name)?;
                }
            }
        }
        Ok(())
    }
}

/// Resolves every symbol known for an instruction pointer.
pub fn resolve(ip: usize) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    backtrace::resolve(ip as *mut c_void, |symbol| {
        symbols.push(Symbol {
            name: symbol
                .name()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            filename: symbol.filename().map(|f| f.to_string_lossy().to_string()),
            lineno: symbol.lineno(),
        });
    });
    symbols
}
