// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use super::{
    controller::{Function, GpioController, Level, Pin},
    registers::{RegisterFile, RegisterMap},
};
use crate::Error;

/// Output pin with an explicit initialize/shutdown lifecycle.
///
/// The device is configured with a single pin which it drives as an output.
/// Arbitrary pins can still be addressed through [`set_pin_mode`],
/// [`write_pin`] and [`read_pin`] once the registers are mapped.
///
/// [`set_pin_mode`]: Self::set_pin_mode
/// [`write_pin`]: Self::write_pin
/// [`read_pin`]: Self::read_pin
#[derive(Debug)]
pub struct GpioDevice<R: RegisterFile = RegisterMap> {
    pin: Pin,
    state: Level,
    controller: Option<GpioController<R>>,
}

impl GpioDevice<RegisterMap> {
    /// Map `/dev/gpiomem` and configure the pin as an output.
    pub fn initialize(&mut self) -> Result<(), Error> {
        if self.is_initialized() {
            return Ok(());
        }
        self.initialize_with(RegisterMap::open()?)
    }
}

impl<R: RegisterFile> GpioDevice<R> {
    pub fn new(pin: Pin) -> Self {
        GpioDevice {
            pin,
            state: Level::Low,
            controller: None,
        }
    }

    pub fn pin(&self) -> Pin {
        self.pin
    }

    /// Change the configured pin. Only allowed before initialization; the
    /// previous pin is kept on error.
    pub fn set_pin(&mut self, pin: Pin) -> Result<(), Error> {
        if self.is_initialized() {
            return Err(Error::PinChangeForbidden);
        }
        self.pin = pin;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.controller.is_some()
    }

    /// Take ownership of `registers` and configure the pin as an output.
    ///
    /// Does nothing when already initialized, in which case `registers` is
    /// closed and dropped.
    pub fn initialize_with(&mut self, mut registers: R) -> Result<(), Error> {
        if self.is_initialized() {
            registers.close();
            return Ok(());
        }

        let mut controller = GpioController::new(registers);
        if let Err(err) = controller.set_mode(self.pin, Function::Output) {
            controller.into_inner().close();
            return Err(err);
        }

        log::debug!("{} configured as output", self.pin);
        self.controller = Some(controller);
        Ok(())
    }

    /// Release the register block. Safe to call repeatedly and before
    /// initialization.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        if let Some(controller) = self.controller.take() {
            controller.into_inner().close();
            log::debug!("{} released", self.pin);
        }
        Ok(())
    }

    fn controller(&self) -> Result<&GpioController<R>, Error> {
        self.controller.as_ref().ok_or(Error::NotInitialized)
    }

    fn controller_mut(&mut self) -> Result<&mut GpioController<R>, Error> {
        self.controller.as_mut().ok_or(Error::NotInitialized)
    }

    pub fn set_pin_mode(&mut self, pin: Pin, function: Function) -> Result<(), Error> {
        self.controller_mut()?.set_mode(pin, function)
    }

    pub fn pin_mode(&self, pin: Pin) -> Result<Function, Error> {
        self.controller()?.mode(pin)
    }

    pub fn write_pin(&mut self, pin: Pin, level: Level) -> Result<(), Error> {
        self.controller_mut()?.write(pin, level)?;
        if pin == self.pin {
            self.state = level;
        }
        Ok(())
    }

    pub fn read_pin(&self, pin: Pin) -> Result<Level, Error> {
        self.controller()?.read(pin)
    }

    /// Drive the configured pin.
    pub fn set_state(&mut self, level: Level) -> Result<(), Error> {
        let pin = self.pin;
        self.write_pin(pin, level)
    }

    /// Last level written to the configured pin.
    pub fn state(&self) -> Level {
        self.state
    }

    /// Sample the configured pin from the level register.
    pub fn read_state(&self) -> Result<Level, Error> {
        self.read_pin(self.pin)
    }
}

impl<R: RegisterFile> Drop for GpioDevice<R> {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
