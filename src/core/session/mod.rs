// Session module - Interactive session control
pub mod controller;
pub mod dispatch;
pub mod state;

pub use controller::SessionController;
pub use dispatch::{AppCommand, BootCommand, Capability, CapabilitySet};
pub use state::{DeviceHandle, SessionState};
