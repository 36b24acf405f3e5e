use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

#[cfg(feature = "devinfo")]
use crate::core::status::DevSettingsRecord;
use crate::core::status::{StatusRecord, APP_START_UNSET, BOOTLOADER_SIGNATURE};
use crate::core::transport::{
    BusScan, DeviceMode, Presence, Transport, TransportFactory, TwiCmd,
};
use crate::domain::error::{TwiconError, TwiconResult};

/// Device-reported error code for an upload that would collide with
/// the bootloader section.
const ERR_ADDR_RANGE: u8 = 3;
/// Device-reported error code for a command the current mode refuses.
const ERR_WRONG_MODE: u8 = 2;

/// Construction parameters for the simulated device.
#[derive(Debug, Clone)]
pub struct SimDeviceConfig {
    /// TWI address the device answers on.
    pub address: u8,
    /// Number of scans to ignore before the device "powers up".
    pub boot_delay_scans: u32,
    /// Mode the device starts in.
    pub initial_mode: DeviceMode,
    /// Flash memory size in bytes.
    pub flash_size: u16,
    /// Bootloader start address inside flash.
    pub bootloader_start: u16,
    /// Highest valid EEPROM address.
    pub eeprom_top: u16,
}

impl Default for SimDeviceConfig {
    fn default() -> Self {
        Self {
            address: 11,
            boot_delay_scans: 0,
            initial_mode: DeviceMode::Bootloader,
            flash_size: 8192,
            bootloader_start: 0x1C00,
            eeprom_top: 511,
        }
    }
}

/// Call counters, exposed so tests can assert interaction sequences.
#[derive(Debug, Default, Clone)]
pub struct SimCounters {
    pub scans: u32,
    pub status_fetches: u32,
    pub uploads: u32,
    pub erases: u32,
    pub runs: u32,
    pub commands: u32,
}

/// In-memory stand-in for a bootloader-equipped device on the bus.
///
/// Implements just enough observable behavior to exercise the console:
/// mode transitions on run/reset/erase, a plausible status record,
/// flash pages and EEPROM bytes. The wire protocol itself is out of
/// scope; methods answer as if every transaction succeeded unless the
/// request is invalid.
pub struct SimDevice {
    config: SimDeviceConfig,
    mode: DeviceMode,
    scans_ignored: u32,
    flash: Vec<u8>,
    eeprom: Vec<u8>,
    application_start: u16,
    counters: SimCounters,
}

impl SimDevice {
    pub fn new(config: SimDeviceConfig) -> Self {
        let flash = vec![0xFF; config.flash_size as usize];
        let eeprom = vec![0xFF; config.eeprom_top as usize + 1];
        Self {
            mode: config.initial_mode,
            scans_ignored: 0,
            flash,
            eeprom,
            application_start: APP_START_UNSET,
            counters: SimCounters::default(),
            config,
        }
    }

    fn status(&self) -> StatusRecord {
        match self.mode {
            // An application-mode device answers the status request
            // with garbage that fails the bootloader identity check.
            DeviceMode::Application => StatusRecord::default(),
            DeviceMode::Bootloader => StatusRecord {
                signature: BOOTLOADER_SIGNATURE,
                version_major: 1,
                version_minor: 6,
                bootloader_start: self.config.bootloader_start,
                application_start: self.application_start,
                features_code: 0b1000_1000,
                ext_features_code: 0b0011_0000,
                low_fuse_setting: 0x62,
                oscillator_cal: 0x8F,
            },
        }
    }
}

/// Shared handle to one simulated device, usable as both the bus-scan
/// collaborator and the transport factory.
#[derive(Clone)]
pub struct SimBus {
    device: Arc<Mutex<SimDevice>>,
}

impl SimBus {
    pub fn new(config: SimDeviceConfig) -> Self {
        Self {
            device: Arc::new(Mutex::new(SimDevice::new(config))),
        }
    }

    /// Snapshot of the interaction counters.
    pub async fn counters(&self) -> SimCounters {
        self.device.lock().await.counters.clone()
    }

    /// Mode the simulated device is currently in.
    pub async fn mode(&self) -> DeviceMode {
        self.device.lock().await.mode
    }
}

#[async_trait]
impl BusScan for SimBus {
    async fn scan_bus(&mut self) -> TwiconResult<Option<Presence>> {
        let mut device = self.device.lock().await;
        device.counters.scans += 1;
        if device.scans_ignored < device.config.boot_delay_scans {
            device.scans_ignored += 1;
            return Ok(None);
        }
        Ok(Some(Presence {
            address: device.config.address,
            mode: device.mode,
        }))
    }
}

#[async_trait]
impl TransportFactory for SimBus {
    async fn open(&self, address: u8) -> TwiconResult<Box<dyn Transport>> {
        let device = self.device.lock().await;
        if address != device.config.address {
            return Err(TwiconError::Bus {
                message: format!("no device at address {}", address),
            });
        }
        drop(device);
        Ok(Box::new(SimTransport {
            device: Arc::clone(&self.device),
            address,
        }))
    }
}

/// Transport bound to the simulated device.
pub struct SimTransport {
    device: Arc<Mutex<SimDevice>>,
    address: u8,
}

#[async_trait]
impl Transport for SimTransport {
    fn twi_address(&self) -> u8 {
        self.address
    }

    async fn get_status(&mut self) -> TwiconResult<StatusRecord> {
        let mut device = self.device.lock().await;
        device.counters.status_fetches += 1;
        Ok(device.status())
    }

    #[cfg(feature = "devinfo")]
    async fn get_dev_settings(&mut self) -> TwiconResult<DevSettingsRecord> {
        Ok(DevSettingsRecord {
            low_fuse_bits: 0x62,
            high_fuse_bits: 0xDF,
            extended_fuse_bits: 0xFF,
            lock_bits: 0xFF,
            signature_byte_0: 0x1E,
            signature_byte_1: 0x93,
            signature_byte_2: 0x0B,
            calibration_0: 0x8F,
            calibration_1: 0x6A,
        })
    }

    async fn upload_application(&mut self, payload: &[u8], page_addr: u16) -> TwiconResult<()> {
        let mut device = self.device.lock().await;
        device.counters.uploads += 1;
        if device.mode != DeviceMode::Bootloader {
            return Err(TwiconError::Command {
                code: ERR_WRONG_MODE,
            });
        }
        let end = page_addr as usize + payload.len();
        if end > device.config.bootloader_start as usize {
            return Err(TwiconError::Command {
                code: ERR_ADDR_RANGE,
            });
        }
        device.flash[page_addr as usize..end].copy_from_slice(payload);
        device.application_start = page_addr;
        debug!(page_addr, len = payload.len(), "simulated upload");
        Ok(())
    }

    async fn delete_application(&mut self) -> TwiconResult<()> {
        let mut device = self.device.lock().await;
        device.counters.erases += 1;
        if device.mode != DeviceMode::Bootloader {
            return Err(TwiconError::Command {
                code: ERR_WRONG_MODE,
            });
        }
        device.flash.fill(0xFF);
        device.application_start = APP_START_UNSET;
        Ok(())
    }

    async fn run_application(&mut self) -> TwiconResult<()> {
        let mut device = self.device.lock().await;
        device.counters.runs += 1;
        if device.mode != DeviceMode::Bootloader {
            return Err(TwiconError::Command {
                code: ERR_WRONG_MODE,
            });
        }
        // With no application in flash the device falls straight back
        // into the bootloader, as the real hardware does.
        if device.application_start != APP_START_UNSET {
            device.mode = DeviceMode::Application;
        }
        Ok(())
    }

    #[cfg(feature = "memdump")]
    async fn read_flash(&mut self, addr: u16, len: u8) -> TwiconResult<Vec<u8>> {
        let device = self.device.lock().await;
        let start = addr as usize;
        let end = (start + len as usize).min(device.flash.len());
        Ok(device.flash[start..end].to_vec())
    }

    #[cfg(feature = "eeprom")]
    async fn read_eeprom(&mut self, addr: u16) -> TwiconResult<u8> {
        let device = self.device.lock().await;
        device
            .eeprom
            .get(addr as usize)
            .copied()
            .ok_or(TwiconError::Command {
                code: ERR_ADDR_RANGE,
            })
    }

    #[cfg(feature = "eeprom")]
    async fn write_eeprom(&mut self, addr: u16, value: u8) -> TwiconResult<()> {
        let mut device = self.device.lock().await;
        let slot = device
            .eeprom
            .get_mut(addr as usize)
            .ok_or(TwiconError::Command {
                code: ERR_ADDR_RANGE,
            })?;
        *slot = value;
        Ok(())
    }

    async fn send_command(&mut self, cmd: TwiCmd) -> TwiconResult<()> {
        let mut device = self.device.lock().await;
        device.counters.commands += 1;
        if device.mode != DeviceMode::Application {
            return Err(TwiconError::Command {
                code: ERR_WRONG_MODE,
            });
        }
        if cmd == TwiCmd::ResetMcu {
            device.mode = DeviceMode::Bootloader;
        }
        Ok(())
    }
}
