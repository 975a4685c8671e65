// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! V4L2 capture node discovery.

use crate::error::CliError;
use clap::Args as ClapArgs;
use rpi_hwio::v4l2::{DeviceEnumerator, DEVICE_ROOT};
use serde::Serialize;
use std::path::PathBuf;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Directory scanned for videoN nodes
    #[arg(long, default_value = DEVICE_ROOT)]
    root: PathBuf,
}

#[derive(Debug, Serialize)]
struct DevicesOutput {
    devices: Vec<String>,
    count: usize,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing devices command: {:?}", args);

    let devices = DeviceEnumerator::enumerate_in(&args.root).map_err(|e| {
        CliError::General(format!(
            "Failed to enumerate {}: {}",
            args.root.display(),
            e
        ))
    })?;

    let output = DevicesOutput {
        count: devices.len(),
        devices: devices
            .iter()
            .map(|path| path.display().to_string())
            .collect(),
    };

    if json {
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::General(format!("Failed to serialize JSON: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    if output.devices.is_empty() {
        println!("No capture devices found under {}", args.root.display());
        return Ok(());
    }

    println!("Capture devices:");
    for device in &output.devices {
        println!("  {}", device);
    }
    println!();
    println!("Total: {} device(s)", output.count);
    Ok(())
}
