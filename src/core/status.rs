use serde::{Deserialize, Serialize};

/// Signature byte a genuine bootloader reports in its status record.
pub const BOOTLOADER_SIGNATURE: u8 = 0x54;

/// Sentinel meaning "application start address not set".
pub const APP_START_UNSET: u16 = 0xFFFF;

/// Bit positions inside `StatusRecord::features_code`.
pub mod features {
    pub const ENABLE_LED_UI: u8 = 0;
    pub const AUTO_PAGE_ADDR: u8 = 1;
    pub const APP_USE_TPL_PG: u8 = 2;
    pub const CMD_SETPGADDR: u8 = 3;
    pub const TWO_STEP_INIT: u8 = 4;
    pub const USE_WDT_RESET: u8 = 5;
    pub const APP_AUTORUN: u8 = 6;
    pub const CMD_READFLASH: u8 = 7;
}

/// Bit positions inside `StatusRecord::ext_features_code`.
pub mod ext_features {
    pub const AUTO_CLK_TWEAK: u8 = 0;
    pub const FORCE_ERASE_PG: u8 = 1;
    pub const CLEAR_BIT_7_R31: u8 = 2;
    pub const CHECK_PAGE_IX: u8 = 3;
    pub const CMD_READDEVS: u8 = 4;
    pub const EEPROM_ACCESS: u8 = 5;
}

/// True when the given bit of a feature bitmask is set.
pub fn feature_bit(code: u8, bit: u8) -> bool {
    (code >> bit) & 1 == 1
}

/// Fixed-layout status record reported by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub signature: u8,
    pub version_major: u8,
    pub version_minor: u8,
    pub bootloader_start: u16,
    pub application_start: u16,
    pub features_code: u8,
    pub ext_features_code: u8,
    pub low_fuse_setting: u8,
    pub oscillator_cal: u8,
}

/// Extended device settings snapshot, fetched on demand and never cached.
#[cfg(feature = "devinfo")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevSettingsRecord {
    pub low_fuse_bits: u8,
    pub high_fuse_bits: u8,
    pub extended_fuse_bits: u8,
    pub lock_bits: u8,
    pub signature_byte_0: u8,
    pub signature_byte_1: u8,
    pub signature_byte_2: u8,
    pub calibration_0: u8,
    pub calibration_1: u8,
}

impl StatusRecord {
    /// A record is a valid bootloader identity when the signature
    /// matches and at least one version field is non-zero. Anything
    /// else means the user application is running, which is a
    /// legitimate state rather than a decode failure.
    pub fn is_bootloader_identity(&self) -> bool {
        self.signature == BOOTLOADER_SIGNATURE
            && (self.version_major != 0 || self.version_minor != 0)
    }

    /// Nickname of the reported major version.
    pub fn version_nickname(&self) -> &'static str {
        match self.version_major {
            0 => "\"Pre-release\"",
            1 => "\"Sandra\"",
            _ => "\"Unknown\"",
        }
    }

    /// Flash address of the relocated jump instruction the bootloader
    /// installs at the top of flash to hand control to the user
    /// application.
    ///
    /// The stored application start is byte-swapped, masked to the
    /// 12-bit relative-jump window and negated two's-complement style,
    /// then subtracted from the word-addressed bootloader start.
    /// Meaningless while the application start is unset.
    pub fn trampoline(&self) -> Option<u16> {
        if self.application_start == APP_START_UNSET {
            return None;
        }
        let msb = (self.application_start >> 8) & 0xFF;
        let lsb = self.application_start & 0xFF;
        let msb_first = (lsb << 8) | msb;
        let inverted = ((!msb_first) & 0x0FFF).wrapping_add(1);
        Some((((self.bootloader_start >> 1).wrapping_sub(inverted)) & 0x0FFF) << 1)
    }

    /// Render the human-readable status report for a device answering
    /// at `twi_address`. Lines use CR-LF ordering suitable for a raw
    /// mode terminal.
    pub fn render_report(&self, twi_address: u8) -> String {
        if !self.is_bootloader_identity() {
            return format!(
                "\r\n *************************************************\
                 \r\n * User application running on TWI device {:02} ... *\
                 \r\n *************************************************\r\n\r\n",
                twi_address
            );
        }
        let mut out = String::new();
        out.push_str(&format!(
            "\r\n Timonel v{}.{} {} (TWI: {:02})\r\n",
            self.version_major,
            self.version_minor,
            self.version_nickname(),
            twi_address
        ));
        out.push_str(" ====================================\r\n");
        out.push_str(&format!(
            " Bootloader address: 0x{:X}\r\n",
            self.bootloader_start
        ));
        match self.trampoline() {
            Some(trampoline) => out.push_str(&format!(
                "  Application start: 0x{:04X} (0x{:X})\r\n",
                self.application_start, trampoline
            )),
            None => out.push_str(&format!(
                "  Application start: 0x{:04X} (Not Set)\r\n",
                self.application_start
            )),
        }
        let clocking = if feature_bit(self.ext_features_code, ext_features::AUTO_CLK_TWEAK) {
            "(Auto)"
        } else {
            "(Fixed)"
        };
        out.push_str(&format!(
            "      Features code: {} | {} {}\r\n",
            self.features_code, self.ext_features_code, clocking
        ));
        out.push_str(&format!(
            "           Low fuse: 0x{:02X}\r\n",
            self.low_fuse_setting
        ));
        out.push_str(&format!("             RC osc: 0x{:02X}", self.oscillator_cal));
        out
    }
}

#[cfg(feature = "devinfo")]
impl DevSettingsRecord {
    /// Render the extended settings block appended to a status report.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("\r\n ....................................\r\n");
        out.push_str(&format!(
            " Fuse settings: L=0x{:02X} H=0x{:02X} E=0x{:02X}\r\n",
            self.low_fuse_bits, self.high_fuse_bits, self.extended_fuse_bits
        ));
        out.push_str(&format!(" Lock bits: 0x{:02X}\r\n", self.lock_bits));
        out.push_str(&format!(
            " Signature: 0x{:02X} 0x{:02X} 0x{:02X}\r\n",
            self.signature_byte_0, self.signature_byte_1, self.signature_byte_2
        ));
        out.push_str(&format!(
            " Oscillator: 8.0Mhz=0x{:02X}, 6.4Mhz=0x{:02X}",
            self.calibration_0, self.calibration_1
        ));
        out
    }
}
