use uuid::Uuid;

use crate::core::transport::{DeviceMode, Transport, TransportFactory};
use crate::domain::error::TwiconResult;

/// Mutable state of one console session.
///
/// These fields were free-floating globals in earlier incarnations of
/// this tool; here they live in one value owned by the controller.
/// `mode` is written only from discovery results, the word fields only
/// by the word-reading plumbing.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Mode reported by the most recent discovery.
    pub mode: DeviceMode,
    /// Last keystroke routed through the dispatcher.
    pub last_key: Option<char>,
    /// Word collected by the reader, awaiting consumption.
    pub pending_word: Option<u16>,
    /// Set when `pending_word` holds a fresh value.
    pub word_ready: bool,
    /// Flash page base address selected for the next upload.
    pub page_addr: u16,
}

impl SessionState {
    pub fn new(mode: DeviceMode) -> Self {
        Self {
            mode,
            last_key: None,
            pending_word: None,
            word_ready: false,
            page_addr: 0,
        }
    }

    /// Store a freshly read word.
    pub fn set_word(&mut self, value: u16) {
        self.pending_word = Some(value);
        self.word_ready = true;
    }

    /// Consume the pending word, clearing the ready flag.
    pub fn take_word(&mut self) -> Option<u16> {
        self.word_ready = false;
        self.pending_word.take()
    }
}

/// Transport bound to one discovered device address.
///
/// Exclusively owned by the session controller. Reset, run and erase
/// invalidate the device side of the link, so those commands release
/// the handle, re-discover, and construct a fresh one; the old handle
/// is gone before discovery begins.
pub struct DeviceHandle {
    id: Uuid,
    address: u8,
    transport: Box<dyn Transport>,
}

impl DeviceHandle {
    /// Open a transport bound to `address`.
    pub async fn open(factory: &dyn TransportFactory, address: u8) -> TwiconResult<Self> {
        let transport = factory.open(address).await?;
        Ok(Self {
            id: Uuid::new_v4(),
            address,
            transport,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn transport(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("id", &self.id)
            .field("address", &self.address)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_lifecycle() {
        let mut state = SessionState::new(DeviceMode::Bootloader);
        assert!(!state.word_ready);
        assert_eq!(state.take_word(), None);

        state.set_word(123);
        assert!(state.word_ready);
        assert_eq!(state.take_word(), Some(123));
        assert!(!state.word_ready);
        assert_eq!(state.take_word(), None);
    }

    #[test]
    fn test_initial_state() {
        let state = SessionState::new(DeviceMode::Application);
        assert_eq!(state.mode, DeviceMode::Application);
        assert_eq!(state.last_key, None);
        assert_eq!(state.page_addr, 0);
    }
}
