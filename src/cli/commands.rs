use std::fs;
use std::path::Path;

use tracing::info;

use crate::cli::args::{Args, Command, ConsoleArgs};
use crate::cli::output::{ConsoleWriter, StatusReport};
use crate::core::session::SessionController;
use crate::core::transport::BusScan;
use crate::domain::config::TwiconConfig;
use crate::domain::error::{TwiconError, TwiconResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::sim::{SimBus, SimDeviceConfig};
use crate::infrastructure::terminal::CrosstermConsole;

/// Built-in demo payload: a tiny LED-blink image for the target MCU,
/// used when no payload file is given.
const DEMO_PAYLOAD: &[u8] = &[
    0x0E, 0xC0, 0x15, 0xC0, 0x14, 0xC0, 0x13, 0xC0, 0x12, 0xC0, 0x11, 0xC0, 0x10, 0xC0, 0x0F,
    0xC0, 0x0E, 0xC0, 0x0D, 0xC0, 0x0C, 0xC0, 0x0B, 0xC0, 0x0A, 0xC0, 0x09, 0xC0, 0x08, 0xC0,
    0x11, 0x24, 0x1F, 0xBE, 0xCF, 0xE5, 0xD2, 0xE0, 0xDE, 0xBF, 0xCD, 0xBF, 0x02, 0xD0, 0x02,
    0xC0, 0xE5, 0xCF, 0xBA, 0x9A, 0xC2, 0x9A, 0x2F, 0xEF, 0x81, 0xEE, 0x94, 0xE5, 0x21, 0x50,
    0x80, 0x40, 0x90, 0x40, 0xE1, 0xF7, 0x00, 0xC0, 0x00, 0x00, 0xC2, 0x98, 0x2F, 0xEF, 0x81,
    0xEE, 0x94, 0xE5, 0x21, 0x50, 0x80, 0x40, 0x90, 0x40, 0xE1, 0xF7, 0x00, 0xC0, 0x00, 0x00,
    0xEB, 0xCF,
];

/// Execute a CLI command.
pub async fn execute_command(args: Args) -> Result<(), TwiconError> {
    let writer = ConsoleWriter::new(args.output.clone());

    let config_manager = ConfigManager::new()?;
    let config = match &args.config {
        Some(path) => config_manager.load_config_from_path(Path::new(path))?,
        None => config_manager.load_config()?,
    };

    if !args.quiet {
        let level = if args.verbose {
            "debug"
        } else {
            config.global.log_level.as_str()
        };
        // A failed logging init (e.g. a second init in-process) is not
        // worth failing the command over.
        let _ = init_logging(level);
    }

    let backend = backend(&args)?;

    match args.command.unwrap_or(Command::Console(ConsoleArgs::default())) {
        Command::Console(console_args) => run_console(console_args, backend, config).await,
        Command::Scan => run_scan(backend, &writer).await,
        Command::Status => run_status(backend, &writer).await,
        Command::Version => {
            writer.write_message(&format!("twicon {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
    }
}

/// Select the bus backend. The wire-level I2C transport is an external
/// collaborator; this build ships only the simulated device.
fn backend(args: &Args) -> TwiconResult<SimBus> {
    if args.simulate {
        Ok(SimBus::new(SimDeviceConfig {
            boot_delay_scans: args.sim_boot_scans,
            ..SimDeviceConfig::default()
        }))
    } else {
        Err(TwiconError::Config {
            message: "no hardware bus backend is compiled into this build; \
                      run with --simulate to use the built-in device"
                .to_string(),
        })
    }
}

async fn run_console(
    console_args: ConsoleArgs,
    backend: SimBus,
    config: TwiconConfig,
) -> Result<(), TwiconError> {
    let payload = load_payload(console_args.payload.as_deref())?;
    info!(payload_len = payload.len(), "starting interactive console");
    let console = CrosstermConsole::new()?;
    let mut controller = SessionController::new(
        console,
        Box::new(backend.clone()),
        Box::new(backend),
        config,
        payload,
    );
    controller.run().await
}

async fn run_scan(mut backend: SimBus, writer: &ConsoleWriter) -> Result<(), TwiconError> {
    let presence = backend.scan_bus().await?;
    writer.write_scan(&presence)?;
    Ok(())
}

async fn run_status(mut backend: SimBus, writer: &ConsoleWriter) -> Result<(), TwiconError> {
    use crate::core::transport::TransportFactory;

    let Some(presence) = backend.scan_bus().await? else {
        return Err(TwiconError::Bus {
            message: "no device answered on the bus".to_string(),
        });
    };
    let mut transport = backend.open(presence.address).await?;
    let record = transport.get_status().await?;
    writer.write_status(&StatusReport::new(presence.address, record))?;
    Ok(())
}

/// Read the firmware payload: raw binary by default, hex text for
/// `.hex` files, the built-in demo image when no file is given.
fn load_payload(path: Option<&str>) -> TwiconResult<Vec<u8>> {
    let Some(path) = path else {
        return Ok(DEMO_PAYLOAD.to_vec());
    };
    let path = Path::new(path);
    if path.extension().and_then(|e| e.to_str()) == Some("hex") {
        let text = fs::read_to_string(path)?;
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(&compact).map_err(|e| TwiconError::Validation {
            message: format!("invalid hex payload {}: {}", path.display(), e),
        })
    } else {
        Ok(fs::read(path)?)
    }
}
