use std::io;

use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::core::status::StatusRecord;
use crate::core::transport::Presence;

/// Status report enriched with the decoder's derived fields, shaped
/// for one-shot CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub twi_address: u8,
    pub identity: String,
    pub record: StatusRecord,
    pub trampoline: Option<u16>,
}

impl StatusReport {
    pub fn new(twi_address: u8, record: StatusRecord) -> Self {
        let identity = if record.is_bootloader_identity() {
            "bootloader".to_string()
        } else {
            "application".to_string()
        };
        Self {
            twi_address,
            identity,
            trampoline: record.trampoline(),
            record,
        }
    }
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::TwiconError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer for the non-interactive commands.
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn write_scan(&self, presence: &Option<Presence>) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => match presence {
                Some(presence) => println!(
                    "Device at address {} ({} mode)",
                    presence.address, presence.mode
                ),
                None => println!("No device answered on the bus"),
            },
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(presence)?);
            }
        }
        Ok(())
    }

    pub fn write_status(&self, report: &StatusReport) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                // The interactive report already renders for a raw
                // terminal; normalize the line endings here.
                let text = report.record.render_report(report.twi_address);
                println!("{}", text.replace("\r\n", "\n"));
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(report)?);
            }
        }
        Ok(())
    }

    pub fn write_message(&self, message: &str) -> Result<(), OutputError> {
        println!("{}", message);
        Ok(())
    }

    pub fn write_error(&self, error: &str) -> Result<(), OutputError> {
        eprintln!("Error: {}", error);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::status::BOOTLOADER_SIGNATURE;

    fn report() -> StatusReport {
        StatusReport::new(
            11,
            StatusRecord {
                signature: BOOTLOADER_SIGNATURE,
                version_major: 1,
                version_minor: 6,
                bootloader_start: 0x1C00,
                application_start: 0xFFFF,
                features_code: 0,
                ext_features_code: 0,
                low_fuse_setting: 0x62,
                oscillator_cal: 0x8F,
            },
        )
    }

    #[test]
    fn test_status_report_identity() {
        let report = report();
        assert_eq!(report.identity, "bootloader");
        assert_eq!(report.trampoline, None);

        let mut record = report.record;
        record.signature = 0;
        let report = StatusReport::new(11, record);
        assert_eq!(report.identity, "application");
    }

    #[test]
    fn test_status_report_serializes() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["twi_address"], 11);
        assert_eq!(json["identity"], "bootloader");
        assert!(json["trampoline"].is_null());
        assert_eq!(json["record"]["bootloader_start"], 0x1C00);
    }
}
