// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Single-shot frame capture to a raw file.

use crate::error::CliError;
use crate::utils::{install_signal_handler, parse_fourcc, parse_resolution};
use clap::{Args as ClapArgs, ValueEnum};
use rpi_hwio::{
    camera::Camera,
    fourcc::FourCC,
    v4l2::{FormatPolicy, DEFAULT_BUFFER_COUNT},
};
use serde::Serialize;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    sync::atomic::Ordering,
    time::{Duration, Instant},
};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Policy {
    /// First format listed by the driver
    First,
    /// Last format listed by the driver
    Last,
}

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Capture device (defaults to the first /dev/videoN)
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Requested resolution (WxH); the driver may adjust it
    #[arg(short, long, default_value = "640x480", value_parser = parse_resolution)]
    resolution: (u32, u32),

    /// Number of driver buffers
    #[arg(short, long, default_value_t = DEFAULT_BUFFER_COUNT)]
    buffers: u32,

    /// Preferred pixel format (FOURCC); falls back to --policy when absent
    #[arg(short, long, value_parser = parse_fourcc)]
    format: Option<FourCC>,

    /// Format chosen from the driver's list
    #[arg(long, value_enum, default_value_t = Policy::Last)]
    policy: Policy,

    /// Seconds to wait for each frame
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,

    /// Number of frames to capture
    #[arg(short, long, default_value_t = 1)]
    count: u32,

    /// Output file receiving the packed frames back to back
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct SnapOutput {
    device: String,
    width: u32,
    height: u32,
    fourcc: String,
    bytes_per_pixel: u32,
    frames: Vec<FrameInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
struct FrameInfo {
    sequence: u32,
    bytes: usize,
    timestamp_sec: i64,
    timestamp_nsec: u32,
}

fn policy(args: &Args) -> FormatPolicy {
    match (args.format, args.policy) {
        (Some(fourcc), _) => FormatPolicy::Prefer(fourcc),
        (None, Policy::First) => FormatPolicy::First,
        (None, Policy::Last) => FormatPolicy::Last,
    }
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing snap command: {:?}", args);

    if args.count == 0 {
        return Err(CliError::InvalidArgs("--count must be at least 1".into()));
    }

    let (width, height) = args.resolution;
    let mut camera = Camera::default()
        .with_resolution(width, height)
        .with_buffers(args.buffers)
        .with_policy(policy(&args))
        .with_poll_timeout(Duration::from_secs(args.timeout));
    if let Some(device) = &args.device {
        camera.set_device(device)?;
    }
    camera.initialize()?;

    let format = *camera.format()?;
    let device = camera
        .device()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    log::info!("{}: {}", device, format);

    let mut writer = match &args.output {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                CliError::General(format!("Failed to create {}: {}", path.display(), e))
            })?;
            Some(BufWriter::new(file))
        }
        None => None,
    };

    let term = install_signal_handler()?;
    let start = Instant::now();
    let mut frames = Vec::with_capacity(args.count as usize);

    for _ in 0..args.count {
        if term.load(Ordering::Relaxed) {
            log::info!("Interrupted after {} frame(s)", frames.len());
            break;
        }

        let frame = camera.snap_frame()?;
        if let Some(writer) = writer.as_mut() {
            writer.write_all(frame.data())?;
        }
        let timestamp = frame.timestamp();
        log::debug!("{}", frame);
        frames.push(FrameInfo {
            sequence: frame.sequence(),
            bytes: frame.data().len(),
            timestamp_sec: timestamp.seconds(),
            timestamp_nsec: timestamp.subsec(9),
        });
    }

    if let Some(mut writer) = writer {
        writer.flush()?;
    }
    camera.shutdown()?;

    let output = SnapOutput {
        device,
        width: format.width,
        height: format.height,
        fourcc: format.fourcc.to_string(),
        bytes_per_pixel: format.bytes_per_pixel(),
        frames,
        output: args.output.as_ref().map(|p| p.display().to_string()),
        elapsed_ms: start.elapsed().as_millis(),
    };

    if json {
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::General(format!("Failed to serialize JSON: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    println!(
        "Captured {} frame(s) of {}x{} {} from {} in {} ms",
        output.frames.len(),
        output.width,
        output.height,
        output.fourcc,
        output.device,
        output.elapsed_ms
    );
    for frame in &output.frames {
        println!(
            "  seq {} {} bytes @ {}.{:09}",
            frame.sequence, frame.bytes, frame.timestamp_sec, frame.timestamp_nsec
        );
    }
    if let Some(path) = &output.output {
        println!("Wrote {}", path);
    }
    Ok(())
}
