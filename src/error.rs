use thiserror::Error;

#[derive(Error, Debug)]
pub enum CfdboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Validation(String),

    #[error("invalid timestep range '{input}': {reason}")]
    InvalidRangeFormat { input: String, reason: String },

    #[error("cannot connect to SSH even after {attempts} attempts: {last}")]
    ConnectionExhausted { attempts: u32, last: String },

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("command {command} exited with {status}")]
    Subprocess { command: String, status: String },

    #[error("{0} is not supported yet")]
    UnsupportedOperation(String),
}

pub type Error = CfdboxError;
pub type Result<T> = std::result::Result<T, Error>;
