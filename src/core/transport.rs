use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "devinfo")]
use crate::core::status::DevSettingsRecord;
use crate::core::status::StatusRecord;
use crate::domain::error::TwiconResult;

/// Running mode reported by the device during a bus scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMode {
    /// The device is executing the bootloader.
    Bootloader,
    /// The device is executing the user application.
    Application,
}

impl std::fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceMode::Bootloader => write!(f, "bootloader"),
            DeviceMode::Application => write!(f, "application"),
        }
    }
}

/// Result of a successful bus scan: the responding address and its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub address: u8,
    pub mode: DeviceMode,
}

/// Single-byte commands understood by the user application.
///
/// Each command byte has a fixed acknowledge byte the device answers
/// with; the transport verifies the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwiCmd {
    StartBlink,
    StopBlink,
    ResetMcu,
}

impl TwiCmd {
    /// Command opcode sent on the wire.
    pub fn opcode(self) -> u8 {
        match self {
            TwiCmd::StartBlink => 0xE1,
            TwiCmd::StopBlink => 0xE0,
            TwiCmd::ResetMcu => 0x80,
        }
    }

    /// Acknowledge byte expected back from the device.
    pub fn ack(self) -> u8 {
        match self {
            TwiCmd::StartBlink => 0x1E,
            TwiCmd::StopBlink => 0x1F,
            TwiCmd::ResetMcu => 0x7F,
        }
    }
}

/// Bootloader/application transport bound to one discovered device.
///
/// The wire-level request/acknowledge protocol lives behind this
/// trait; command failures surface as `TwiconError::Command` carrying
/// the device-reported error code verbatim.
#[async_trait]
pub trait Transport: Send + Sync {
    /// TWI address this transport is bound to.
    fn twi_address(&self) -> u8;

    /// Fetch the raw status record from the bootloader.
    async fn get_status(&mut self) -> TwiconResult<StatusRecord>;

    /// Fetch the extended device settings snapshot.
    #[cfg(feature = "devinfo")]
    async fn get_dev_settings(&mut self) -> TwiconResult<DevSettingsRecord>;

    /// Upload a firmware payload starting at the given flash page address.
    async fn upload_application(&mut self, payload: &[u8], page_addr: u16) -> TwiconResult<()>;

    /// Erase the user application from flash memory.
    async fn delete_application(&mut self) -> TwiconResult<()>;

    /// Exit the bootloader and jump into the user application.
    async fn run_application(&mut self) -> TwiconResult<()>;

    /// Read one flash memory chunk (for memory dumps).
    #[cfg(feature = "memdump")]
    async fn read_flash(&mut self, addr: u16, len: u8) -> TwiconResult<Vec<u8>>;

    /// Read one EEPROM byte.
    #[cfg(feature = "eeprom")]
    async fn read_eeprom(&mut self, addr: u16) -> TwiconResult<u8>;

    /// Write one EEPROM byte.
    #[cfg(feature = "eeprom")]
    async fn write_eeprom(&mut self, addr: u16, value: u8) -> TwiconResult<()>;

    /// Send a single-byte application command and verify its acknowledge.
    async fn send_command(&mut self, cmd: TwiCmd) -> TwiconResult<()>;
}

/// Bus-scan collaborator: answers with the single responding device, if any.
#[async_trait]
pub trait BusScan: Send + Sync {
    /// Scan the bus once. `None` means no device answered.
    async fn scan_bus(&mut self) -> TwiconResult<Option<Presence>>;
}

/// Opens a transport bound to a discovered bus address.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(&self, address: u8) -> TwiconResult<Box<dyn Transport>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_mode_display() {
        assert_eq!(DeviceMode::Bootloader.to_string(), "bootloader");
        assert_eq!(DeviceMode::Application.to_string(), "application");
    }

    #[test]
    fn test_command_ack_pairs() {
        assert_eq!(TwiCmd::StartBlink.opcode(), 0xE1);
        assert_eq!(TwiCmd::StartBlink.ack(), 0x1E);
        assert_eq!(TwiCmd::ResetMcu.opcode(), 0x80);
        assert_eq!(TwiCmd::ResetMcu.ack(), 0x7F);
    }
}
