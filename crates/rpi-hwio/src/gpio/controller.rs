// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use super::registers::{Bank, RegisterFile};
use crate::Error;
use rpi_hwio_sys::bcm;
use std::fmt;

/// GPIO pin in Broadcom numbering.
///
/// Only the 28 pins routed to the 40-pin header (0–27) are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pin(u8);

impl Pin {
    pub const MAX: u32 = 27;

    pub fn new(number: u32) -> Result<Self, Error> {
        if number > Self::MAX {
            return Err(Error::InvalidPin(number));
        }
        Ok(Pin(number as u8))
    }

    pub fn number(self) -> u32 {
        u32::from(self.0)
    }

    /// All header pins in ascending order.
    pub fn all() -> impl Iterator<Item = Pin> {
        (0..=Self::MAX as u8).map(Pin)
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

/// Pin function as encoded in the 3-bit function select field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Function {
    Input = bcm::FSEL_INPUT,
    Output = bcm::FSEL_OUTPUT,
    Alt0 = bcm::FSEL_ALT0,
    Alt1 = bcm::FSEL_ALT1,
    Alt2 = bcm::FSEL_ALT2,
    Alt3 = bcm::FSEL_ALT3,
    Alt4 = bcm::FSEL_ALT4,
    Alt5 = bcm::FSEL_ALT5,
}

impl Function {
    pub const ALL: [Function; 8] = [
        Function::Input,
        Function::Output,
        Function::Alt0,
        Function::Alt1,
        Function::Alt2,
        Function::Alt3,
        Function::Alt4,
        Function::Alt5,
    ];

    pub fn bits(self) -> u32 {
        self as u32
    }

    pub fn from_bits(bits: u32) -> Result<Self, Error> {
        Function::ALL
            .into_iter()
            .find(|f| f.bits() == bits)
            .ok_or(Error::InvalidFunction(bits))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Input => "input",
            Function::Output => "output",
            Function::Alt0 => "alt0",
            Function::Alt1 => "alt1",
            Function::Alt2 => "alt2",
            Function::Alt3 => "alt3",
            Function::Alt4 => "alt4",
            Function::Alt5 => "alt5",
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical pin level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.is_high() as u8
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Function select word and bit shift for `pin`.
pub(crate) fn fsel_position(pin: u32) -> (usize, u32) {
    (
        (pin / bcm::PINS_PER_FSEL_WORD) as usize,
        (pin % bcm::PINS_PER_FSEL_WORD) * bcm::FSEL_BITS,
    )
}

/// Set/clear/level word and bit for `pin`.
pub(crate) fn bank_position(pin: u32) -> (usize, u32) {
    (if pin < 32 { 0 } else { 1 }, pin % 32)
}

/// Pin mode, output and input over a GPIO register block.
///
/// Every call touches live hardware. Output goes through the write-only set
/// and clear registers, so writing never disturbs other pins.
#[derive(Debug)]
pub struct GpioController<R: RegisterFile> {
    registers: R,
}

impl<R: RegisterFile> GpioController<R> {
    pub fn new(registers: R) -> Self {
        GpioController { registers }
    }

    pub fn registers(&self) -> &R {
        &self.registers
    }

    pub fn into_inner(self) -> R {
        self.registers
    }

    /// Select the function of `pin`, leaving the other pins sharing the
    /// function select word untouched.
    pub fn set_mode(&mut self, pin: Pin, function: Function) -> Result<(), Error> {
        let (word, shift) = fsel_position(pin.number());
        let offset = Bank::FunctionSelect.offset(word)?;

        let mut value = self.registers.read_word(offset)?;
        value &= !(0b111 << shift);
        value |= function.bits() << shift;
        self.registers.write_word(offset, value)?;

        log::trace!("{} -> {}", pin, function);
        Ok(())
    }

    /// Current function of `pin`.
    pub fn mode(&self, pin: Pin) -> Result<Function, Error> {
        let (word, shift) = fsel_position(pin.number());
        let value = self.registers.read_word(Bank::FunctionSelect.offset(word)?)?;
        Function::from_bits((value >> shift) & 0b111)
    }

    /// Drive `pin` high through GPSET or low through GPCLR.
    pub fn write(&mut self, pin: Pin, level: Level) -> Result<(), Error> {
        let (word, bit) = bank_position(pin.number());
        let bank = match level {
            Level::High => Bank::Set,
            Level::Low => Bank::Clear,
        };
        self.registers.write_word(bank.offset(word)?, 1 << bit)
    }

    /// Sample the level of `pin`.
    ///
    /// For a pin configured as output this reflects the pad state, which on
    /// this hardware tracks the last written value.
    pub fn read(&self, pin: Pin) -> Result<Level, Error> {
        let (word, bit) = bank_position(pin.number());
        let value = self.registers.read_word(Bank::Level.offset(word)?)?;
        Ok(Level::from(value & (1 << bit) != 0))
    }
}
