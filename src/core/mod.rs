// Core module - Session control, discovery, and status decoding
pub mod discovery;
pub mod reader;
pub mod session;
pub mod status;
pub mod transport;
