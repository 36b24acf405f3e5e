use thiserror::Error;

/// Twicon unified error type
#[derive(Error, Debug)]
pub enum TwiconError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("Device command failed with code {code}")]
    Command { code: u8 },

    #[error("Bus error: {message}")]
    Bus { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Output error: {0}")]
    Output(String),
}

impl TwiconError {
    /// Device-reported error code, when this error carries one.
    pub fn command_code(&self) -> Option<u8> {
        match self {
            TwiconError::Command { code } => Some(*code),
            _ => None,
        }
    }
}

pub type TwiconResult<T> = Result<T, TwiconError>;
