use std::collections::VecDeque;
use std::io::{self, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::debug;

use crate::domain::error::{TwiconError, TwiconResult};

/// Raw character terminal seam.
///
/// The console UI is plain ANSI-escaped text over this interface:
/// a non-blocking character probe, a blocking character read, and
/// formatted output. `read_key` returning `None` means the operator
/// quit (end of input, Ctrl-C or Esc).
pub trait ConsoleIo: Send {
    /// Consume one character if one is available, without blocking.
    fn try_read_key(&mut self) -> TwiconResult<Option<char>>;

    /// Block until a character arrives. `None` signals quit.
    fn read_key(&mut self) -> TwiconResult<Option<char>>;

    /// Write text verbatim, escape sequences included.
    fn print(&mut self, text: &str) -> TwiconResult<()>;

    fn flush(&mut self) -> TwiconResult<()>;
}

/// Production console on the process's own terminal, in raw mode for
/// single-character input. Raw mode is restored on drop.
pub struct CrosstermConsole {
    stdout: io::Stdout,
}

impl CrosstermConsole {
    pub fn new() -> TwiconResult<Self> {
        enable_raw_mode().map_err(|e| TwiconError::Terminal(e.to_string()))?;
        Ok(Self {
            stdout: io::stdout(),
        })
    }

    fn map_key(key: KeyEvent) -> Option<Option<char>> {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(None),
            KeyCode::Esc => Some(None),
            KeyCode::Enter => Some(Some('\r')),
            KeyCode::Char(c) => Some(Some(c)),
            _ => None,
        }
    }
}

impl ConsoleIo for CrosstermConsole {
    fn try_read_key(&mut self) -> TwiconResult<Option<char>> {
        while event::poll(Duration::ZERO).map_err(|e| TwiconError::Terminal(e.to_string()))? {
            let ev = event::read().map_err(|e| TwiconError::Terminal(e.to_string()))?;
            if let Event::Key(key) = ev {
                match Self::map_key(key) {
                    Some(Some(c)) => return Ok(Some(c)),
                    // Quit keys are only honored by the blocking read;
                    // mid-word they are ignored.
                    Some(None) | None => continue,
                }
            }
        }
        Ok(None)
    }

    fn read_key(&mut self) -> TwiconResult<Option<char>> {
        loop {
            let ev = event::read().map_err(|e| TwiconError::Terminal(e.to_string()))?;
            if let Event::Key(key) = ev {
                if let Some(mapped) = Self::map_key(key) {
                    return Ok(mapped);
                }
            }
        }
    }

    fn print(&mut self, text: &str) -> TwiconResult<()> {
        self.stdout.write_all(text.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> TwiconResult<()> {
        self.stdout.flush()?;
        Ok(())
    }
}

impl Drop for CrosstermConsole {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            debug!(error = %e, "failed to leave raw mode");
        }
    }
}

/// Scripted console replaying a fixed key sequence and capturing all
/// output. Used by the test suites and the simulated demos; quits when
/// the script runs out.
pub struct ScriptedConsole {
    script: VecDeque<char>,
    output: String,
}

impl ScriptedConsole {
    pub fn new(script: &str) -> Self {
        Self {
            script: script.chars().collect(),
            output: String::new(),
        }
    }

    /// Everything printed so far.
    pub fn output(&self) -> &str {
        &self.output
    }
}

impl ConsoleIo for ScriptedConsole {
    fn try_read_key(&mut self) -> TwiconResult<Option<char>> {
        Ok(self.script.pop_front())
    }

    fn read_key(&mut self) -> TwiconResult<Option<char>> {
        Ok(self.script.pop_front())
    }

    fn print(&mut self, text: &str) -> TwiconResult<()> {
        self.output.push_str(text);
        Ok(())
    }

    fn flush(&mut self) -> TwiconResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_console_replay() {
        let mut console = ScriptedConsole::new("ab");
        assert_eq!(console.try_read_key().unwrap(), Some('a'));
        assert_eq!(console.read_key().unwrap(), Some('b'));
        assert_eq!(console.read_key().unwrap(), None);
    }

    #[test]
    fn test_scripted_console_captures_output() {
        let mut console = ScriptedConsole::new("");
        console.print("hello ").unwrap();
        console.print("world").unwrap();
        console.flush().unwrap();
        assert_eq!(console.output(), "hello world");
    }
}
