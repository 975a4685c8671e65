// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! GPIO pin control through /dev/gpiomem.

use crate::error::CliError;
use crate::utils::{install_signal_handler, parse_function, parse_level, parse_pin};
use clap::{Args as ClapArgs, Subcommand};
use rpi_hwio::gpio::{Function, GpioController, GpioDevice, Level, Pin, RegisterMap};
use serde::Serialize;
use std::{sync::atomic::Ordering, thread, time::Duration};

#[derive(ClapArgs, Debug)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show or set the function of a pin
    Mode {
        /// BCM pin number (0-27)
        #[arg(value_parser = parse_pin)]
        pin: Pin,

        /// New function (input, output, alt0..alt5); omit to show the current one
        #[arg(value_parser = parse_function)]
        function: Option<Function>,
    },

    /// Read pin levels (all header pins when none given)
    Read {
        /// BCM pin numbers
        #[arg(value_parser = parse_pin)]
        pins: Vec<Pin>,
    },

    /// Drive an output pin
    Write {
        #[arg(value_parser = parse_pin)]
        pin: Pin,

        /// Level to drive (0/1, low/high)
        #[arg(value_parser = parse_level)]
        level: Level,
    },

    /// Toggle an output pin until interrupted or the count is reached
    Blink {
        #[arg(value_parser = parse_pin)]
        pin: Pin,

        /// Half period in milliseconds
        #[arg(short, long, default_value_t = 500)]
        interval: u64,

        /// Number of toggles (0 runs until Ctrl+C)
        #[arg(short, long, default_value_t = 0)]
        count: u32,
    },
}

#[derive(Debug, Serialize)]
struct PinInfo {
    pin: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    level: Option<u8>,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing gpio command: {:?}", args);

    match args.command {
        Command::Mode { pin, function } => mode(pin, function, json),
        Command::Read { pins } => read(pins, json),
        Command::Write { pin, level } => write(pin, level, json),
        Command::Blink {
            pin,
            interval,
            count,
        } => blink(pin, Duration::from_millis(interval), count, json),
    }
}

fn controller() -> Result<GpioController<RegisterMap>, CliError> {
    Ok(GpioController::new(RegisterMap::open()?))
}

fn report(pins: &[PinInfo], json: bool) -> Result<(), CliError> {
    if json {
        let text = serde_json::to_string_pretty(pins)
            .map_err(|e| CliError::General(format!("Failed to serialize JSON: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    for info in pins {
        let mut line = format!("GPIO{:<2}", info.pin);
        if let Some(function) = &info.function {
            line.push_str(&format!(" {:<6}", function));
        }
        if let Some(level) = info.level {
            line.push_str(&format!(" {}", level));
        }
        println!("{}", line.trim_end());
    }
    Ok(())
}

fn mode(pin: Pin, function: Option<Function>, json: bool) -> Result<(), CliError> {
    let mut gpio = controller()?;
    if let Some(function) = function {
        gpio.set_mode(pin, function)?;
        log::info!("{} set to {}", pin, function);
    }
    let current = gpio.mode(pin)?;
    report(
        &[PinInfo {
            pin: pin.number(),
            function: Some(current.to_string()),
            level: None,
        }],
        json,
    )
}

fn read(pins: Vec<Pin>, json: bool) -> Result<(), CliError> {
    let gpio = controller()?;
    let pins: Vec<Pin> = if pins.is_empty() {
        Pin::all().collect()
    } else {
        pins
    };

    let mut infos = Vec::with_capacity(pins.len());
    for pin in pins {
        infos.push(PinInfo {
            pin: pin.number(),
            function: Some(gpio.mode(pin)?.to_string()),
            level: Some(gpio.read(pin)?.into()),
        });
    }
    report(&infos, json)
}

fn write(pin: Pin, level: Level, json: bool) -> Result<(), CliError> {
    let mut gpio = controller()?;
    if gpio.mode(pin)? != Function::Output {
        log::warn!("{} is not configured as an output", pin);
    }
    gpio.write(pin, level)?;
    report(
        &[PinInfo {
            pin: pin.number(),
            function: None,
            level: Some(level.into()),
        }],
        json,
    )
}

fn blink(pin: Pin, interval: Duration, count: u32, json: bool) -> Result<(), CliError> {
    let term = install_signal_handler()?;
    let mut device: GpioDevice = GpioDevice::new(pin);
    device.initialize()?;

    let mut toggles = 0u32;
    let mut level = Level::Low;
    while !term.load(Ordering::Relaxed) && (count == 0 || toggles < count) {
        level = if level.is_high() {
            Level::Low
        } else {
            Level::High
        };
        device.set_state(level)?;
        toggles += 1;
        thread::sleep(interval);
    }

    device.set_state(Level::Low)?;
    device.shutdown()?;
    log::info!("{} toggled {} time(s)", pin, toggles);

    report(
        &[PinInfo {
            pin: pin.number(),
            function: Some(Function::Output.to_string()),
            level: Some(device.state().into()),
        }],
        json,
    )
}
