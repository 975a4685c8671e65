// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use rpi_hwio::{
    fourcc::FourCC,
    gpio::{Function, Level, Pin},
};
use signal_hook::consts::SIGINT;
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Parse resolution string in format "WxH" or "W*H"
pub fn parse_resolution(s: &str) -> Result<(u32, u32), CliError> {
    let (width_str, height_str) = s
        .split_once('x')
        .or_else(|| s.split_once('*'))
        .ok_or_else(|| {
            CliError::InvalidArgs(format!(
                "Invalid resolution format (expected WxH or W*H): {}",
                s
            ))
        })?;

    let width = width_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid width in resolution: {}", s)))?;
    let height = height_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid height in resolution: {}", s)))?;

    if width == 0 || height == 0 {
        return Err(CliError::InvalidArgs(format!(
            "Resolution dimensions must be positive: {}",
            s
        )));
    }

    Ok((width, height))
}

/// Parse a four character pixel format code such as "YUYV"
pub fn parse_fourcc(s: &str) -> Result<FourCC, CliError> {
    s.parse::<FourCC>().map_err(CliError::InvalidArgs)
}

/// Parse a BCM GPIO number, accepting an optional "GPIO" prefix
pub fn parse_pin(s: &str) -> Result<Pin, CliError> {
    let digits = s
        .strip_prefix("GPIO")
        .or_else(|| s.strip_prefix("gpio"))
        .unwrap_or(s);
    let number = digits
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid pin number: {}", s)))?;
    Ok(Pin::new(number)?)
}

/// Parse a pin function name ("input", "output", "alt0".."alt5")
pub fn parse_function(s: &str) -> Result<Function, CliError> {
    let lower = s.to_ascii_lowercase();
    match lower.as_str() {
        "in" => return Ok(Function::Input),
        "out" => return Ok(Function::Output),
        _ => {}
    }
    Function::ALL
        .into_iter()
        .find(|f| f.name() == lower)
        .ok_or_else(|| CliError::InvalidArgs(format!("Unknown pin function: {}", s)))
}

/// Parse a pin level ("0", "1", "low", "high")
pub fn parse_level(s: &str) -> Result<Level, CliError> {
    match s.to_ascii_lowercase().as_str() {
        "0" | "low" | "off" => Ok(Level::Low),
        "1" | "high" | "on" => Ok(Level::High),
        _ => Err(CliError::InvalidArgs(format!("Invalid pin level: {}", s))),
    }
}

/// Install signal handler for graceful shutdown on Ctrl+C
///
/// Returns an Arc<AtomicBool> that will be set to true when SIGINT is received.
/// Check this flag periodically in your main loop to exit gracefully.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, CliError> {
    let term = Arc::new(AtomicBool::new(false));

    flag::register(SIGINT, Arc::clone(&term))
        .map_err(|e| CliError::General(format!("Failed to register signal handler: {}", e)))?;

    log::debug!("Installed SIGINT handler");
    Ok(term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_resolution("640*480").unwrap(), (640, 480));
        assert!(parse_resolution("1920").is_err());
        assert!(parse_resolution("0x480").is_err());
        assert!(parse_resolution("-1x480").is_err());
        assert!(parse_resolution("axb").is_err());
    }

    #[test]
    fn test_parse_fourcc() {
        assert_eq!(parse_fourcc("YUYV").unwrap(), FourCC::YUYV);
        assert!(parse_fourcc("YUV").is_err());
        assert!(parse_fourcc("YUYV2").is_err());
    }

    #[test]
    fn test_parse_pin() {
        assert_eq!(parse_pin("17").unwrap().number(), 17);
        assert_eq!(parse_pin("GPIO4").unwrap().number(), 4);
        assert_eq!(parse_pin("gpio27").unwrap().number(), 27);
        assert!(matches!(parse_pin("28"), Err(CliError::InvalidArgs(_))));
        assert!(matches!(parse_pin("pin"), Err(CliError::InvalidArgs(_))));
    }

    #[test]
    fn test_parse_function() {
        assert_eq!(parse_function("output").unwrap(), Function::Output);
        assert_eq!(parse_function("IN").unwrap(), Function::Input);
        assert_eq!(parse_function("alt5").unwrap(), Function::Alt5);
        assert!(parse_function("alt6").is_err());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("1").unwrap(), Level::High);
        assert_eq!(parse_level("Low").unwrap(), Level::Low);
        assert!(parse_level("2").is_err());
    }
}
