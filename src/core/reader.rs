use crate::domain::error::TwiconResult;
use crate::infrastructure::terminal::ConsoleIo;

/// Incremental, non-blocking line-buffer accumulator turning a
/// character stream into a 16-bit decimal value.
///
/// Each `poll` consumes at most one available character and echoes it.
/// When the terminator arrives the buffered text parses as a decimal
/// integer and the reader reports ready; the caller consumes the value
/// with `take`, which rearms the reader for the next word. An empty
/// buffer at the terminator parses as zero, which callers must accept
/// as a valid (if likely unintended) entry.
#[derive(Debug)]
pub struct WordReader {
    buf: [u8; Self::CAPACITY],
    ix: usize,
    ready: bool,
}

impl WordReader {
    /// Fixed buffer capacity; the write index clamps at the last slot
    /// instead of overflowing.
    pub const CAPACITY: usize = 16;

    /// Carriage return ends a word.
    pub const TERMINATOR: char = '\r';

    pub fn new() -> Self {
        Self {
            buf: [0; Self::CAPACITY],
            ix: 0,
            ready: false,
        }
    }

    /// True once a terminator has been seen and the value awaits `take`.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Consume at most one available character. Returns `true` when a
    /// character was consumed, `false` when nothing was available or
    /// the reader is already ready.
    pub fn poll(&mut self, console: &mut dyn ConsoleIo) -> TwiconResult<bool> {
        if self.ready {
            return Ok(false);
        }
        let Some(c) = console.try_read_key()? else {
            return Ok(false);
        };
        if c == Self::TERMINATOR {
            self.ready = true;
        } else {
            self.buf[self.ix] = c as u8;
            console.print(&c.to_string())?;
            self.ix = (self.ix + 1).min(Self::CAPACITY - 1);
        }
        Ok(true)
    }

    /// Parse and return the accumulated value, clearing the ready flag
    /// and the buffer so the reader can collect the next word.
    pub fn take(&mut self) -> u16 {
        let value = parse_decimal(&self.buf[..self.ix]);
        self.reset();
        value
    }

    /// Discard any partial input and the ready flag.
    pub fn reset(&mut self) {
        self.buf = [0; Self::CAPACITY];
        self.ix = 0;
        self.ready = false;
    }
}

impl Default for WordReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Decimal parse with C `atoi` semantics: leading digits only, empty
/// or non-numeric input yields zero, overflow truncates to 16 bits.
fn parse_decimal(bytes: &[u8]) -> u16 {
    let mut value: u64 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            break;
        }
        value = value.wrapping_mul(10).wrapping_add((b - b'0') as u64);
    }
    value as u16
}
