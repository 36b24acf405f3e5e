//! Twicon Library
//!
//! Interactive I2C bootloader operator console library: device
//! discovery, status decoding, and a mode-keyed command dispatcher
//! for Timonel-style bootloaders.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::discovery::{wait_for_device, DiscoverySettings};
pub use crate::core::reader::WordReader;
pub use crate::core::session::{CapabilitySet, SessionController, SessionState};
pub use crate::core::status::StatusRecord;
pub use crate::core::transport::{
    BusScan, DeviceMode, Presence, Transport, TransportFactory, TwiCmd,
};
pub use domain::config::TwiconConfig;
pub use domain::error::{TwiconError, TwiconResult};
