// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;
use std::io;
use std::process::ExitCode;

/// CLI-specific error type with exit code mapping
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments
    InvalidArgs(String),
    /// Device node or register block not found or inaccessible
    DeviceNotFound(String),
    /// Operation timed out
    Timeout(String),
    /// Kernel driver or hardware rejected an operation
    Hardware(String),
    /// General error
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            CliError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            CliError::Hardware(msg) => write!(f, "Hardware error: {}", msg),
            CliError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn code(&self) -> u8 {
        match self {
            CliError::InvalidArgs(_) => 2,
            CliError::DeviceNotFound(_) => 3,
            CliError::Timeout(_) => 6,
            CliError::Hardware(_) => 7,
            CliError::General(_) => 1,
        }
    }
}

fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    )
}

/// Map rpi_hwio::Error to CliError with appropriate exit codes
impl From<rpi_hwio::Error> for CliError {
    fn from(err: rpi_hwio::Error) -> Self {
        use rpi_hwio::Error;

        let msg = err.to_string();
        match err {
            Error::InvalidPin(_) | Error::InvalidFunction(_) => CliError::InvalidArgs(msg),

            Error::NoCaptureDevices => CliError::DeviceNotFound(msg),
            Error::DeviceOpen { ref source, .. } | Error::Map(ref source) if is_missing(source) => {
                CliError::DeviceNotFound(msg)
            }

            Error::PollTimeout(_) => CliError::Timeout(msg),

            Error::Io(ref io_err) => match io_err.kind() {
                io::ErrorKind::NotFound => CliError::DeviceNotFound(msg),
                io::ErrorKind::TimedOut => CliError::Timeout(msg),
                _ => CliError::General(msg),
            },

            Error::PinChangeForbidden
            | Error::DeviceChangeForbidden
            | Error::NotInitialized
            | Error::NotStreaming => CliError::General(msg),

            _ => CliError::Hardware(msg),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        CliError::General(format!("I/O error: {}", err))
    }
}

/// Helper function to convert result to exit code
pub fn result_to_exit_code<T>(result: Result<T, CliError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}
