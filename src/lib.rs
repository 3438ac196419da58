//! Stages CFD result files, locally or from an SFTP server, and exports them
//! to CGNS one timestep at a time.

pub mod config;
pub mod error;
pub mod export;
pub mod process;
pub mod remote;
pub mod timesteps;

pub use error::{CfdboxError, Error, Result};
