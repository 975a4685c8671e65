// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Memory-mapped GPIO for BCM283x SoCs
//!
//! Pins are driven by writing the peripheral registers directly rather than
//! through the kernel's character device, which keeps each operation to a
//! single load or store.
//!
//! # Layers
//!
//! | Type | Role |
//! |------|------|
//! | [`RegisterMap`] | Owns the mapping of the 4 KiB register block |
//! | [`GpioController`] | Function select, set/clear and level arithmetic |
//! | [`GpioDevice`] | Lifecycle and configured-pin handle used by hosts |
//!
//! Register access goes through the [`RegisterFile`] trait so the controller
//! can run against [`MemoryRegisters`] when no hardware is present.
//!
//! # Example
//!
//! ```no_run
//! use rpi_hwio::gpio::{Function, GpioController, Level, Pin, RegisterMap};
//!
//! let mut gpio = GpioController::new(RegisterMap::open()?);
//! let button = Pin::new(27)?;
//! gpio.set_mode(button, Function::Input)?;
//! if gpio.read(button)? == Level::High {
//!     println!("pressed");
//! }
//! # Ok::<(), rpi_hwio::Error>(())
//! ```

mod controller;
mod device;
mod registers;

pub use controller::{Function, GpioController, Level, Pin};
pub use device::GpioDevice;
pub use registers::{Bank, MemoryRegisters, RegisterFile, RegisterMap};
