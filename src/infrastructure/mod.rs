// Infrastructure module - Terminal, configuration, logging, simulation
pub mod config;
pub mod logging;
pub mod sim;
pub mod terminal;
