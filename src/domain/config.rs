use serde::{Deserialize, Serialize};

use crate::domain::error::{TwiconError, TwiconResult};

/// Twicon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwiconConfig {
    /// Console behavior settings
    #[serde(default)]
    pub global: GlobalConfig,
    /// Target device memory profile
    #[serde(default)]
    pub device: DeviceProfile,
}

/// Console behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Progress indicator rotation cadence in milliseconds
    #[serde(default = "default_rotation_delay")]
    pub rotation_delay_ms: u64,
    /// Settling delay after mode-changing commands in milliseconds
    #[serde(default = "default_mode_switch_delay")]
    pub mode_switch_delay_ms: u64,
    /// Pause between bus scans while waiting for a device, in milliseconds
    #[serde(default = "default_scan_pause")]
    pub scan_pause_ms: u64,
}

/// Memory layout of the target microcontroller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Total flash memory in bytes
    #[serde(default = "default_mcu_total_mem")]
    pub mcu_total_mem: u16,
    /// Flash page size (erase/write granularity) in bytes
    #[serde(default = "default_page_size")]
    pub page_size: u16,
    /// Highest valid EEPROM address
    #[serde(default = "default_eeprom_top")]
    pub eeprom_top: u16,
    /// Slave-to-master packet size used when dumping flash memory
    #[serde(default = "default_packet_size")]
    pub packet_size: u8,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation_delay() -> u64 {
    150
}

fn default_mode_switch_delay() -> u64 {
    250
}

fn default_scan_pause() -> u64 {
    10
}

fn default_mcu_total_mem() -> u16 {
    8192
}

fn default_page_size() -> u16 {
    64
}

fn default_eeprom_top() -> u16 {
    511
}

fn default_packet_size() -> u8 {
    32
}

impl Default for TwiconConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            device: DeviceProfile::default(),
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            rotation_delay_ms: default_rotation_delay(),
            mode_switch_delay_ms: default_mode_switch_delay(),
            scan_pause_ms: default_scan_pause(),
        }
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            mcu_total_mem: default_mcu_total_mem(),
            page_size: default_page_size(),
            eeprom_top: default_eeprom_top(),
            packet_size: default_packet_size(),
        }
    }
}

impl TwiconConfig {
    /// Check the configuration for values the console cannot work with.
    pub fn validate(&self) -> TwiconResult<()> {
        if self.device.page_size == 0 {
            return Err(TwiconError::Config {
                message: "device.page_size must be non-zero".to_string(),
            });
        }
        if self.device.mcu_total_mem % self.device.page_size != 0 {
            return Err(TwiconError::Config {
                message: format!(
                    "device.mcu_total_mem ({}) is not a multiple of device.page_size ({})",
                    self.device.mcu_total_mem, self.device.page_size
                ),
            });
        }
        if self.device.packet_size == 0 {
            return Err(TwiconError::Config {
                message: "device.packet_size must be non-zero".to_string(),
            });
        }
        if self.global.rotation_delay_ms == 0 {
            return Err(TwiconError::Config {
                message: "global.rotation_delay_ms must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
