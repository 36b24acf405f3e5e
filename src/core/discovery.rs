use std::time::{Duration, Instant};

use tracing::debug;

use crate::core::transport::{BusScan, Presence};
use crate::domain::config::GlobalConfig;
use crate::domain::error::TwiconResult;
use crate::infrastructure::terminal::ConsoleIo;

/// Timing knobs for the discovery loop.
#[derive(Debug, Clone, Copy)]
pub struct DiscoverySettings {
    /// Cadence of the rotating progress indicator.
    pub rotation_delay: Duration,
    /// Pause between consecutive bus scans.
    pub scan_pause: Duration,
}

impl DiscoverySettings {
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            rotation_delay: Duration::from_millis(config.rotation_delay_ms),
            scan_pause: Duration::from_millis(config.scan_pause_ms),
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            rotation_delay: Duration::from_millis(150),
            scan_pause: Duration::from_millis(10),
        }
    }
}

/// 4-phase rotating progress indicator. Each turn backspaces over the
/// previous glyph so the bar spins in place.
#[derive(Debug, Default)]
pub struct Spinner {
    phase: u8,
}

impl Spinner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next phase and return the text to print.
    pub fn turn(&mut self) -> &'static str {
        let glyph = match self.phase {
            0 => "\x08\x08| ",
            1 => "\x08\x08/ ",
            2 => "\x08\x08- ",
            _ => "\x08\x08\\ ",
        };
        self.phase = (self.phase + 1) % 4;
        glyph
    }
}

/// Poll the bus until exactly one device answers, spinning the
/// progress indicator on a fixed cadence independent of scan latency.
///
/// This wait is intentionally unbounded: the operator is expected to
/// power or reset the target while the console sits here. The loop
/// terminates the instant a non-zero address is reported.
pub async fn wait_for_device(
    console: &mut dyn ConsoleIo,
    bus: &mut dyn BusScan,
    settings: &DiscoverySettings,
) -> TwiconResult<Presence> {
    let mut spinner = Spinner::new();
    let mut last_turn = Instant::now();
    loop {
        if let Some(presence) = bus.scan_bus().await? {
            debug!(address = presence.address, mode = %presence.mode, "device discovered");
            console.print(&format!(
                "\x08\x08>>> device active at address [{}]\r\n",
                presence.address
            ))?;
            return Ok(presence);
        }
        if last_turn.elapsed() >= settings.rotation_delay {
            console.print(spinner.turn())?;
            console.flush()?;
            last_turn = Instant::now();
        }
        tokio::time::sleep(settings.scan_pause).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::DeviceMode;
    use crate::infrastructure::terminal::ScriptedConsole;
    use async_trait::async_trait;

    struct CountingScan {
        misses_left: u32,
        calls: u32,
        presence: Presence,
    }

    #[async_trait]
    impl BusScan for CountingScan {
        async fn scan_bus(&mut self) -> TwiconResult<Option<Presence>> {
            self.calls += 1;
            if self.misses_left > 0 {
                self.misses_left -= 1;
                Ok(None)
            } else {
                Ok(Some(self.presence))
            }
        }
    }

    #[tokio::test]
    async fn test_discovery_stops_at_first_answer() {
        let mut console = ScriptedConsole::new("");
        let mut scan = CountingScan {
            misses_left: 5,
            calls: 0,
            presence: Presence {
                address: 8,
                mode: DeviceMode::Bootloader,
            },
        };
        let settings = DiscoverySettings {
            rotation_delay: Duration::from_millis(1),
            scan_pause: Duration::from_millis(1),
        };
        let presence = wait_for_device(&mut console, &mut scan, &settings)
            .await
            .unwrap();
        assert_eq!(presence.address, 8);
        assert_eq!(presence.mode, DeviceMode::Bootloader);
        // 5 misses plus the hit, nothing afterwards.
        assert_eq!(scan.calls, 6);
        assert!(console.output().contains("device active at address [8]"));
    }

    #[tokio::test]
    async fn test_immediate_answer_skips_spinner() {
        let mut console = ScriptedConsole::new("");
        let mut scan = CountingScan {
            misses_left: 0,
            calls: 0,
            presence: Presence {
                address: 11,
                mode: DeviceMode::Application,
            },
        };
        let presence = wait_for_device(&mut console, &mut scan, &DiscoverySettings::default())
            .await
            .unwrap();
        assert_eq!(presence.address, 11);
        assert_eq!(scan.calls, 1);
        assert!(!console.output().contains('|'));
    }

    #[test]
    fn test_spinner_cycles_four_phases() {
        let mut spinner = Spinner::new();
        let first = spinner.turn();
        assert_eq!(first, "\x08\x08| ");
        spinner.turn();
        spinner.turn();
        assert_eq!(spinner.turn(), "\x08\x08\\ ");
        assert_eq!(spinner.turn(), first);
    }
}
