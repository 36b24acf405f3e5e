use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::discovery::{wait_for_device, DiscoverySettings};
use crate::core::reader::WordReader;
use crate::core::session::dispatch::{
    application_menu, bootloader_menu, AppCommand, BootCommand, CapabilitySet,
};
use crate::core::session::state::{DeviceHandle, SessionState};
use crate::core::status::StatusRecord;
#[cfg(feature = "setpgaddr")]
use crate::core::status::{feature_bit, features};
use crate::core::transport::{BusScan, DeviceMode, Transport, TransportFactory, TwiCmd};
use crate::domain::config::TwiconConfig;
use crate::domain::error::{TwiconError, TwiconResult};
use crate::infrastructure::terminal::ConsoleIo;

/// ANSI clear-screen plus cursor-home.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Backspaces erasing the blinking "PLEASE WAIT" marker.
const ERASE_WAIT: &str = "\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08";

/// Pause between empty polls while collecting a word.
const WORD_POLL_PAUSE: Duration = Duration::from_millis(5);

/// What a dispatched command asks the session loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Restart,
}

/// How one full session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Restart,
    Quit,
}

/// Top-level interactive session loop.
///
/// Owns the terminal, the bus-scan collaborator and the single
/// `DeviceHandle`. Every keystroke pays a full discovery cycle before
/// dispatch so the mode is always fresh; that cost is deliberate (see
/// DESIGN.md) and keeps the dispatcher free of stale-mode handling.
pub struct SessionController<C: ConsoleIo> {
    console: C,
    bus: Box<dyn BusScan>,
    factory: Box<dyn TransportFactory>,
    config: TwiconConfig,
    payload: Vec<u8>,
    state: SessionState,
    handle: Option<DeviceHandle>,
    reader: WordReader,
}

impl<C: ConsoleIo> SessionController<C> {
    pub fn new(
        console: C,
        bus: Box<dyn BusScan>,
        factory: Box<dyn TransportFactory>,
        config: TwiconConfig,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            console,
            bus,
            factory,
            config,
            payload,
            state: SessionState::new(DeviceMode::Bootloader),
            handle: None,
            reader: WordReader::new(),
        }
    }

    /// Console this controller prints to.
    pub fn console(&self) -> &C {
        &self.console
    }

    /// Session state, exposed for inspection.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Run sessions until the operator quits. The bootloader-mode
    /// restart command tears the whole session down and starts over.
    pub async fn run(&mut self) -> TwiconResult<()> {
        loop {
            match self.run_session().await? {
                Outcome::Restart => continue,
                Outcome::Quit => {
                    info!("console session ended");
                    return Ok(());
                }
            }
        }
    }

    async fn run_session(&mut self) -> TwiconResult<Outcome> {
        self.console.print(CLEAR_SCREEN)?;
        self.print_logo()?;
        self.console
            .print("\r\nWaiting until a TWI slave device is detected on the bus   ")?;
        let presence = self.discover().await?;
        self.state.mode = presence.mode;
        self.show_header()?;
        self.handle = Some(DeviceHandle::open(self.factory.as_ref(), presence.address).await?);
        if self.state.mode == DeviceMode::Bootloader {
            self.print_status().await?;
        }
        self.show_menu().await?;

        loop {
            let Some(key) = self.console.read_key()? else {
                return Ok(Outcome::Quit);
            };
            match self.dispatch_key(key).await? {
                Flow::Restart => return Ok(Outcome::Restart),
                Flow::Continue => self.show_menu().await?,
            }
        }
    }

    /// Re-probe device presence and mode, then route the keystroke to
    /// the table of whichever mode the device is actually in.
    async fn dispatch_key(&mut self, key: char) -> TwiconResult<Flow> {
        self.state.last_key = Some(key);
        let presence = self.discover().await?;
        self.state.mode = presence.mode;
        self.console.print("\x08\r\n")?;
        debug!(key = %key.escape_default(), mode = %self.state.mode, "dispatching");
        match self.state.mode {
            DeviceMode::Application => self.dispatch_application(key).await,
            DeviceMode::Bootloader => self.dispatch_bootloader(key).await,
        }
    }

    async fn dispatch_application(&mut self, key: char) -> TwiconResult<Flow> {
        match AppCommand::from_key(key) {
            Some(AppCommand::StartBlink) => {
                self.console
                    .print("\r\nApplication Cmd >>> Starting blink")?;
                let ret = self.transport()?.send_command(TwiCmd::StartBlink).await;
                self.report_ack(ret)?;
            }
            Some(AppCommand::StopBlink) => {
                self.console
                    .print("\r\nApplication Cmd >>> Stopping blink")?;
                let ret = self.transport()?.send_command(TwiCmd::StopBlink).await;
                self.report_ack(ret)?;
            }
            Some(AppCommand::ResetDevice) => {
                let ret = self.transport()?.send_command(TwiCmd::ResetMcu).await;
                self.console.print("\r\n  .\r\n . .\r\n. . .\r\n\r\n")?;
                match split_command_error(ret)? {
                    Ok(()) => self
                        .console
                        .print(" > OK Resetting device, going back to bootloader!\r\n")?,
                    Err(code) => self.console.print(&format!(" > Error: {}\r\n\r\n", code))?,
                }
                self.settle().await;
                self.recycle_handle().await?;
            }
            Some(AppCommand::Help) => {
                self.console
                    .print("\r\n Help: Available application commands:\r\n")?;
                self.console
                    .print(" =====================================\r\n")?;
                self.console
                    .print(" a) Start LED blinking on the device.\r\n")?;
                self.console
                    .print(" s) Stop LED blinking on the device.\r\n")?;
                self.console
                    .print(" z) Reset the device and jump back to the bootloader.\r\n\r\n")?;
            }
            None => self.print_unknown(key)?,
        }
        Ok(Flow::Continue)
    }

    async fn dispatch_bootloader(&mut self, key: char) -> TwiconResult<Flow> {
        match BootCommand::from_key(key) {
            Some(BootCommand::RestartConsole) => {
                self.console
                    .print("\r\nResetting the console ...\r\n.\r\n.\r\n.\r\n")?;
                self.settle().await;
                return Ok(Flow::Restart);
            }
            Some(BootCommand::ShowStatus) => {
                self.console
                    .print("\r\nBootloader Cmd >>> Get bootloader version ...\r\n")?;
                self.print_status().await?;
                // One diagnostic scan after the report; it may change
                // the mode the next menu is drawn for.
                if let Some(presence) = self.bus.scan_bus().await? {
                    debug!(address = presence.address, mode = %presence.mode, "diagnostic scan");
                    self.state.mode = presence.mode;
                }
            }
            Some(BootCommand::RunApplication) => {
                self.console
                    .print("\r\nBootloader Cmd >>> Run application ...\r\n")?;
                self.console.print("\r\n. . .\r\n . .\r\n  .\r\n\r\n")?;
                self.console.print("Please wait ...\r\n\r\n")?;
                let ret = self.transport()?.run_application().await;
                match split_command_error(ret)? {
                    Ok(()) => self.console.print(
                        "Bootloader exit successful, running the user application (if there is one) ...\r\n",
                    )?,
                    Err(code) => self
                        .console
                        .print(&format!(" [ command error! {} ]", code))?,
                }
                self.settle().await;
                self.recycle_handle().await?;
            }
            Some(BootCommand::EraseFirmware) => {
                self.console.print(
                    "\r\nBootloader Cmd >>> Delete app firmware from flash memory, \
                     \x1b[5mPLEASE WAIT\x1b[0m ...",
                )?;
                let ret = self.transport()?.delete_application().await;
                self.console.print(ERASE_WAIT)?;
                match split_command_error(ret)? {
                    Ok(()) => self.console.print(" successful        ")?,
                    Err(code) => self
                        .console
                        .print(&format!(" [ command error! {} ]", code))?,
                }
                self.console.print("\r\n")?;
                // Erasing may change the reported mode, and the old
                // session with the device is gone either way.
                self.settle().await;
                self.recycle_handle().await?;
            }
            Some(BootCommand::WriteFlash) => {
                self.console.print(
                    "\r\nBootloader Cmd >>> Firmware upload to flash memory, \
                     \x1b[5mPLEASE WAIT\x1b[0m ...",
                )?;
                let payload = self.payload.clone();
                let page_addr = self.state.page_addr;
                let ret = self
                    .transport()?
                    .upload_application(&payload, page_addr)
                    .await;
                self.console.print(ERASE_WAIT)?;
                match split_command_error(ret)? {
                    Ok(()) => self
                        .console
                        .print(" successful, press 'r' to run the user app")?,
                    Err(code) => self
                        .console
                        .print(&format!(" [ command error! {} ]", code))?,
                }
                self.console.print("\r\n\r\n")?;
            }
            #[cfg(feature = "setpgaddr")]
            Some(BootCommand::SetPageAddress) => self.set_page_address().await?,
            #[cfg(feature = "memdump")]
            Some(BootCommand::DumpMemory) => self.dump_memory().await?,
            #[cfg(feature = "eeprom")]
            Some(BootCommand::WriteEeprom) => self.write_eeprom().await?,
            #[cfg(feature = "eeprom")]
            Some(BootCommand::ReadEeprom) => self.read_eeprom().await?,
            None => self.print_unknown(key)?,
        }
        Ok(Flow::Continue)
    }

    /// Collect a flash page base address, validating it against the
    /// memory layout the device reports.
    #[cfg(feature = "setpgaddr")]
    async fn set_page_address(&mut self) -> TwiconResult<()> {
        let Some(status) = self.fetch_status().await? else {
            return Ok(());
        };
        if !feature_bit(status.features_code, features::CMD_SETPGADDR) {
            self.console.print(
                "\r\nSet address command not supported by current device features ...\r\n",
            )?;
            return Ok(());
        }
        self.console
            .print("\r\nPlease enter the flash memory page base address: ")?;
        self.prompt_word().await?;
        let addr = self.state.take_word().unwrap_or(0);
        self.console
            .print(&format!("\r\nFlash memory page base address: {}\r\n", addr))?;
        self.console.print(&format!(
            "Address high byte: {} (<< 8) + Address low byte: {}\r\n",
            (addr & 0xFF00) >> 8,
            addr & 0xFF
        ))?;
        if status.bootloader_start > self.config.device.mcu_total_mem {
            self.console.print(
                "\r\n\r\nWarning: bootloader start address unknown, \
                 please run 'version' command to find it !\r\n",
            )?;
            return Ok(());
        }
        let top = status
            .bootloader_start
            .saturating_sub(self.config.device.page_size);
        if addr >= top || addr == 0xFFFF {
            self.console.print(&format!(
                "\r\nWarning: flash page addresses must be below {} (0x{:X}), \
                 please correct it !!!\r\n\r\n",
                top, top
            ))?;
            self.state.page_addr = 0;
            return Ok(());
        }
        self.state.page_addr = addr;
        Ok(())
    }

    /// Dump the device flash memory in fixed-width hex lines.
    #[cfg(feature = "memdump")]
    async fn dump_memory(&mut self) -> TwiconResult<()> {
        const VALUES_PER_LINE: u16 = 32;
        let total = self.config.device.mcu_total_mem;
        let packet = self.config.device.packet_size.max(1) as u16;
        self.console.print("\r\n")?;
        let mut addr = 0u16;
        while addr < total {
            let len = packet.min(total - addr) as u8;
            let chunk = match self.transport()?.read_flash(addr, len).await {
                Ok(chunk) => chunk,
                Err(TwiconError::Command { code }) => {
                    self.console
                        .print(&format!("\r\n [ command error! {} ]\r\n", code))?;
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            let mut line = String::new();
            for (offset, byte) in chunk.iter().enumerate() {
                let byte_addr = addr + offset as u16;
                if byte_addr % VALUES_PER_LINE == 0 {
                    line.push_str(&format!("\r\n{:04X}: ", byte_addr));
                }
                line.push_str(&format!("{:02X} ", byte));
            }
            self.console.print(&line)?;
            addr += len as u16;
        }
        self.console.print("\r\n\r\n")?;
        Ok(())
    }

    /// Collect an EEPROM address and a data byte, then write it.
    #[cfg(feature = "eeprom")]
    async fn write_eeprom(&mut self) -> TwiconResult<()> {
        let eeprom_top = self.config.device.eeprom_top;
        self.console
            .print("\r\nPlease enter the EEPROM memory address: ")?;
        self.prompt_word().await?;
        let addr = self.state.take_word().unwrap_or(0);
        if addr > eeprom_top {
            self.console.print(&format!(
                "\r\nWarning: The highest EEPROM address available is {} (0x{:X}), \
                 please correct it !!!",
                eeprom_top, eeprom_top
            ))?;
            return Ok(());
        }
        self.console.print("\r\nPlease enter EEPROM data: ")?;
        self.prompt_word().await?;
        let data = self.state.take_word().unwrap_or(0) as u8;
        self.console.print(&format!(
            "\r\nWriting {} to EEPROM address 0x{:04X}\r\n\r\n",
            data, addr
        ))?;
        let ret = self.transport()?.write_eeprom(addr, data).await;
        if let Err(code) = split_command_error(ret)? {
            self.console
                .print(&format!(" [ command error! {} ]\r\n", code))?;
        }
        Ok(())
    }

    /// Print every EEPROM byte from address zero through the top.
    #[cfg(feature = "eeprom")]
    async fn read_eeprom(&mut self) -> TwiconResult<()> {
        let eeprom_top = self.config.device.eeprom_top;
        self.console.print("\r\n")?;
        for addr in 0..=eeprom_top {
            let value = match self.transport()?.read_eeprom(addr).await {
                Ok(value) => value,
                Err(TwiconError::Command { code }) => {
                    self.console
                        .print(&format!("\r\n [ command error! {} ]\r\n", code))?;
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            self.console.print(&format!("{:03}={:02} ", addr, value))?;
        }
        self.console.print("\r\n\r\n")?;
        Ok(())
    }

    /// Fetch and print the status report, including the extended
    /// settings block when both sides support it.
    async fn print_status(&mut self) -> TwiconResult<Option<StatusRecord>> {
        let Some(status) = self.fetch_status().await? else {
            return Ok(None);
        };
        let address = self.device_address()?;
        self.console.print(&status.render_report(address))?;
        #[cfg(feature = "devinfo")]
        if status.is_bootloader_identity()
            && feature_bit_ext(&status, crate::core::status::ext_features::CMD_READDEVS)
        {
            match self.transport()?.get_dev_settings().await {
                Ok(settings) => self.console.print(&settings.render_report())?,
                Err(TwiconError::Command { code }) => self
                    .console
                    .print(&format!(" [ command error! {} ]", code))?,
                Err(e) => return Err(e),
            }
        }
        self.console.print("\r\n\r\n")?;
        Ok(Some(status))
    }

    /// Redraw the menu for the current mode, offering only the
    /// capability-enabled subset of commands.
    async fn show_menu(&mut self) -> TwiconResult<()> {
        let menu = match self.state.mode {
            DeviceMode::Application => application_menu(),
            DeviceMode::Bootloader => {
                let reported = match self.fetch_status().await? {
                    Some(status) => CapabilitySet::reported(&status),
                    None => CapabilitySet::reported(&StatusRecord::default()),
                };
                bootloader_menu(&CapabilitySet::compiled().intersect(reported))
            }
        };
        self.console.print(&menu)?;
        self.console.flush()
    }

    /// Tear down the current handle, re-discover, and build a fresh
    /// one. Reset-to-bootloader, run-application and erase all share
    /// this sequence; there is never a window with two live handles.
    async fn recycle_handle(&mut self) -> TwiconResult<()> {
        self.handle = None;
        self.console.print("\r\nWaiting for device   ")?;
        let presence = self.discover().await?;
        self.state.mode = presence.mode;
        self.handle = Some(DeviceHandle::open(self.factory.as_ref(), presence.address).await?);
        self.show_header()?;
        self.console.print("\r\n")?;
        Ok(())
    }

    async fn discover(&mut self) -> TwiconResult<crate::core::transport::Presence> {
        let settings = DiscoverySettings::from_config(&self.config.global);
        wait_for_device(&mut self.console, self.bus.as_mut(), &settings).await
    }

    /// Run the word reader until a full word is available, parking
    /// briefly between empty polls.
    async fn prompt_word(&mut self) -> TwiconResult<()> {
        self.reader.reset();
        loop {
            let consumed = self.reader.poll(&mut self.console)?;
            if self.reader.is_ready() {
                break;
            }
            if !consumed {
                tokio::time::sleep(WORD_POLL_PAUSE).await;
            }
        }
        let value = self.reader.take();
        self.state.set_word(value);
        Ok(())
    }

    /// Fetch the status record, surfacing device error codes to the
    /// operator instead of failing the session.
    async fn fetch_status(&mut self) -> TwiconResult<Option<StatusRecord>> {
        match self.transport()?.get_status().await {
            Ok(status) => Ok(Some(status)),
            Err(TwiconError::Command { code }) => {
                warn!(code, "status fetch refused by device");
                self.console
                    .print(&format!(" [ command error! {} ]\r\n", code))?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn transport(&mut self) -> TwiconResult<&mut dyn Transport> {
        match self.handle.as_mut() {
            Some(handle) => Ok(handle.transport()),
            None => Err(TwiconError::Session {
                message: "no active device handle".to_string(),
            }),
        }
    }

    fn device_address(&self) -> TwiconResult<u8> {
        match self.handle.as_ref() {
            Some(handle) => Ok(handle.address()),
            None => Err(TwiconError::Session {
                message: "no active device handle".to_string(),
            }),
        }
    }

    fn report_ack(&mut self, result: TwiconResult<()>) -> TwiconResult<()> {
        match split_command_error(result)? {
            Ok(()) => self.console.print(" > OK!\r\n\r\n"),
            Err(code) => self.console.print(&format!(" > Error: {}\r\n\r\n", code)),
        }
    }

    fn print_unknown(&mut self, key: char) -> TwiconResult<()> {
        self.console
            .print(&format!("Command '{}' unknown ...\r\n", key as u32))
    }

    fn print_logo(&mut self) -> TwiconResult<()> {
        self.console.print("   _          _                 \r\n")?;
        self.console.print("  | |___ __ _(_)__ ___ _ _      \r\n")?;
        self.console.print("  |  _\\ V  V / | _/ _ \\ ' \\  \r\n")?;
        self.console.print("   \\__|\\_/\\_/|_|_|\\___/_||_|\r\n")?;
        self.console.print("\r\n")?;
        self.console.print(&format!(
            "twicon | TWI bootloader operator console | Version: {}\r\n",
            env!("CARGO_PKG_VERSION")
        ))?;
        Ok(())
    }

    fn show_header(&mut self) -> TwiconResult<()> {
        self.console
            .print("\r\n............................................................\r\n")?;
        self.console
            .print(". twicon - TWI bootloader and application console          .\r\n")?;
        self.console
            .print("............................................................\r\n")?;
        let mode = match self.state.mode {
            DeviceMode::Application => "[ USER APPLICATION ]  ",
            DeviceMode::Bootloader => "[ BOOTLOADER ]        ",
        };
        self.console
            .print(&format!(". Running mode: {}                     .\r\n", mode))?;
        self.console
            .print("............................................................\r\n")?;
        Ok(())
    }

    async fn settle(&mut self) {
        tokio::time::sleep(Duration::from_millis(self.config.global.mode_switch_delay_ms)).await;
    }
}

/// Split device-reported command failures from fatal session errors.
fn split_command_error(result: TwiconResult<()>) -> TwiconResult<Result<(), u8>> {
    match result {
        Ok(()) => Ok(Ok(())),
        Err(TwiconError::Command { code }) => Ok(Err(code)),
        Err(e) => Err(e),
    }
}

#[cfg(feature = "devinfo")]
fn feature_bit_ext(status: &StatusRecord, bit: u8) -> bool {
    crate::core::status::feature_bit(status.ext_features_code, bit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_command_error() {
        assert!(matches!(split_command_error(Ok(())), Ok(Ok(()))));
        assert!(matches!(
            split_command_error(Err(TwiconError::Command { code: 7 })),
            Ok(Err(7))
        ));
        assert!(split_command_error(Err(TwiconError::Session {
            message: "gone".to_string()
        }))
        .is_err());
    }
}
