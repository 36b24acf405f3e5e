use crate::core::status::{ext_features, feature_bit, features, StatusRecord};

/// Commands available while the device runs the user application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    StartBlink,
    StopBlink,
    ResetDevice,
    Help,
}

impl AppCommand {
    /// Decode a keystroke against the application-mode table.
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'a' | 'A' => Some(AppCommand::StartBlink),
            's' | 'S' => Some(AppCommand::StopBlink),
            'z' | 'Z' => Some(AppCommand::ResetDevice),
            '?' | 'h' | 'H' => Some(AppCommand::Help),
            _ => None,
        }
    }
}

/// Commands available while the device runs the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootCommand {
    RestartConsole,
    ShowStatus,
    RunApplication,
    EraseFirmware,
    WriteFlash,
    #[cfg(feature = "setpgaddr")]
    SetPageAddress,
    #[cfg(feature = "memdump")]
    DumpMemory,
    #[cfg(feature = "eeprom")]
    WriteEeprom,
    #[cfg(feature = "eeprom")]
    ReadEeprom,
}

impl BootCommand {
    /// Decode a keystroke against the bootloader-mode table. Keys for
    /// commands compiled out of this build decode as unknown.
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'z' | 'Z' => Some(BootCommand::RestartConsole),
            'v' | 'V' | '\r' => Some(BootCommand::ShowStatus),
            'r' | 'R' => Some(BootCommand::RunApplication),
            'e' | 'E' => Some(BootCommand::EraseFirmware),
            'w' | 'W' => Some(BootCommand::WriteFlash),
            #[cfg(feature = "setpgaddr")]
            'b' | 'B' => Some(BootCommand::SetPageAddress),
            #[cfg(feature = "memdump")]
            'm' | 'M' => Some(BootCommand::DumpMemory),
            #[cfg(feature = "eeprom")]
            'p' | 'P' => Some(BootCommand::WriteEeprom),
            #[cfg(feature = "eeprom")]
            'o' | 'O' => Some(BootCommand::ReadEeprom),
            _ => None,
        }
    }
}

/// Optional commands a build/device pair may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    SetPageAddress,
    MemoryDump,
    EepromAccess,
    DeviceInfo,
}

/// Set of optional capabilities currently in effect.
///
/// The menu and the dispatcher consult the intersection of what this
/// build compiles in with what the connected device reports, so a
/// command only exists when both sides support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet {
    set_page_address: bool,
    memory_dump: bool,
    eeprom_access: bool,
    device_info: bool,
}

impl CapabilitySet {
    /// Capabilities compiled into this build.
    pub fn compiled() -> Self {
        Self {
            set_page_address: cfg!(feature = "setpgaddr"),
            memory_dump: cfg!(feature = "memdump"),
            eeprom_access: cfg!(feature = "eeprom"),
            device_info: cfg!(feature = "devinfo"),
        }
    }

    /// Capabilities the device advertises in its status record.
    pub fn reported(status: &StatusRecord) -> Self {
        Self {
            set_page_address: feature_bit(status.features_code, features::CMD_SETPGADDR),
            memory_dump: feature_bit(status.features_code, features::CMD_READFLASH),
            eeprom_access: feature_bit(status.ext_features_code, ext_features::EEPROM_ACCESS),
            device_info: feature_bit(status.ext_features_code, ext_features::CMD_READDEVS),
        }
    }

    /// Capabilities present in both sets.
    pub fn intersect(self, other: Self) -> Self {
        Self {
            set_page_address: self.set_page_address && other.set_page_address,
            memory_dump: self.memory_dump && other.memory_dump,
            eeprom_access: self.eeprom_access && other.eeprom_access,
            device_info: self.device_info && other.device_info,
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::SetPageAddress => self.set_page_address,
            Capability::MemoryDump => self.memory_dump,
            Capability::EepromAccess => self.eeprom_access,
            Capability::DeviceInfo => self.device_info,
        }
    }
}

/// Blinking input caret.
pub const CARET: &str = "\x1b[5m_\x1b[0m";

/// Menu line for application mode.
pub fn application_menu() -> String {
    format!(
        "Application command ('z' reset device, 'a' blink, 's' stop, '?' help): {}",
        CARET
    )
}

/// Menu line for bootloader mode, listing only capability-enabled entries.
pub fn bootloader_menu(caps: &CapabilitySet) -> String {
    let mut menu = String::from(
        "Bootloader command ('z' restart console, 'v' version, 'r' run app, \
         'e' erase flash, 'w' write flash",
    );
    if caps.supports(Capability::SetPageAddress) {
        menu.push_str(", 'b' set addr");
    }
    if caps.supports(Capability::MemoryDump) {
        menu.push_str(", 'm' mem dump");
    }
    if caps.supports(Capability::EepromAccess) {
        menu.push_str(", 'o/p' read/write eeprom");
    }
    menu.push_str("): ");
    menu.push_str(CARET);
    menu
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::status::BOOTLOADER_SIGNATURE;

    fn full_featured_status() -> StatusRecord {
        StatusRecord {
            signature: BOOTLOADER_SIGNATURE,
            version_major: 1,
            version_minor: 6,
            bootloader_start: 0x1C00,
            application_start: 0xFFFF,
            features_code: 1 << features::CMD_SETPGADDR | 1 << features::CMD_READFLASH,
            ext_features_code: 1 << ext_features::EEPROM_ACCESS | 1 << ext_features::CMD_READDEVS,
            low_fuse_setting: 0x62,
            oscillator_cal: 0x8F,
        }
    }

    #[test]
    fn test_app_command_decoding() {
        assert_eq!(AppCommand::from_key('a'), Some(AppCommand::StartBlink));
        assert_eq!(AppCommand::from_key('S'), Some(AppCommand::StopBlink));
        assert_eq!(AppCommand::from_key('z'), Some(AppCommand::ResetDevice));
        assert_eq!(AppCommand::from_key('?'), Some(AppCommand::Help));
        assert_eq!(AppCommand::from_key('x'), None);
    }

    #[test]
    fn test_boot_command_decoding() {
        assert_eq!(BootCommand::from_key('z'), Some(BootCommand::RestartConsole));
        assert_eq!(BootCommand::from_key('\r'), Some(BootCommand::ShowStatus));
        assert_eq!(BootCommand::from_key('E'), Some(BootCommand::EraseFirmware));
        assert_eq!(BootCommand::from_key('w'), Some(BootCommand::WriteFlash));
        assert_eq!(BootCommand::from_key('q'), None);
    }

    #[test]
    fn test_capability_intersection() {
        let compiled = CapabilitySet::compiled();
        let reported = CapabilitySet::reported(&full_featured_status());
        let effective = compiled.intersect(reported);
        assert_eq!(
            effective.supports(Capability::SetPageAddress),
            cfg!(feature = "setpgaddr")
        );
        assert_eq!(
            effective.supports(Capability::EepromAccess),
            cfg!(feature = "eeprom")
        );

        let mut bare = full_featured_status();
        bare.features_code = 0;
        bare.ext_features_code = 0;
        let none = compiled.intersect(CapabilitySet::reported(&bare));
        assert!(!none.supports(Capability::SetPageAddress));
        assert!(!none.supports(Capability::MemoryDump));
        assert!(!none.supports(Capability::EepromAccess));
        assert!(!none.supports(Capability::DeviceInfo));
    }

    #[test]
    fn test_menu_reflects_capabilities() {
        let all = CapabilitySet::compiled().intersect(CapabilitySet::reported(
            &full_featured_status(),
        ));
        let menu = bootloader_menu(&all);
        assert!(menu.contains("'v' version"));
        assert_eq!(menu.contains("'b' set addr"), cfg!(feature = "setpgaddr"));
        assert_eq!(menu.contains("'m' mem dump"), cfg!(feature = "memdump"));
        assert_eq!(
            menu.contains("'o/p' read/write eeprom"),
            cfg!(feature = "eeprom")
        );

        let mut bare = full_featured_status();
        bare.features_code = 0;
        bare.ext_features_code = 0;
        let menu = bootloader_menu(&CapabilitySet::reported(&bare));
        assert!(!menu.contains("set addr"));
        assert!(!menu.contains("mem dump"));
        assert!(!menu.contains("eeprom"));
    }
}
