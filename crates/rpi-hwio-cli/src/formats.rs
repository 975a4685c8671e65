// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Pixel formats offered by a capture node.

use crate::error::CliError;
use clap::Args as ClapArgs;
use rpi_hwio::v4l2::{DeviceEnumerator, FormatNegotiator};
use serde::Serialize;
use std::path::PathBuf;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Capture device (defaults to the first /dev/videoN)
    #[arg(short, long)]
    device: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FormatsOutput {
    device: String,
    formats: Vec<FormatInfo>,
}

#[derive(Debug, Serialize)]
struct FormatInfo {
    index: u32,
    fourcc: String,
    description: String,
    compressed: bool,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing formats command: {:?}", args);

    let device = match args.device {
        Some(path) => path,
        None => DeviceEnumerator::first()?,
    };

    let mut negotiator = FormatNegotiator::open(&device)?;
    let formats = negotiator
        .enumerate_formats()?
        .iter()
        .map(|desc| FormatInfo {
            index: desc.index,
            fourcc: desc.fourcc.to_string(),
            description: desc.description.clone(),
            compressed: desc.compressed,
        })
        .collect();

    let output = FormatsOutput {
        device: device.display().to_string(),
        formats,
    };

    if json {
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::General(format!("Failed to serialize JSON: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    println!("{}:", output.device);
    for format in &output.formats {
        println!(
            "  [{}] {} {}{}",
            format.index,
            format.fourcc,
            format.description,
            if format.compressed {
                " (compressed)"
            } else {
                ""
            }
        );
    }
    Ok(())
}
