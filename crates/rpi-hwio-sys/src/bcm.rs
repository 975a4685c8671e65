// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! BCM283x GPIO register layout.
//!
//! Offsets are in 32-bit words from the start of the GPIO block. On
//! Raspberry Pi OS the block is exposed at offset 0 of `/dev/gpiomem`, which
//! does not require root; `/dev/mem` needs the physical base instead.

/// BCM2837 (Pi 3) peripheral base address.
pub const BCM2837_PERIPHERAL_BASE: u64 = 0x3F00_0000;

/// Physical address of the GPIO block on BCM2837.
pub const GPIO_BASE: u64 = BCM2837_PERIPHERAL_BASE + 0x20_0000;

/// Offset of the GPIO block within `/dev/gpiomem`.
pub const GPIOMEM_BASE: u64 = 0;

/// Default register device node.
pub const GPIOMEM_PATH: &str = "/dev/gpiomem";

/// Size of the mapped register block in bytes.
pub const BLOCK_SIZE: usize = 4 * 1024;

/// Function select registers GPFSEL0..GPFSEL5.
pub const GPFSEL: usize = 0;
pub const GPFSEL_WORDS: usize = 6;

/// Output set registers GPSET0..GPSET1 (write-only).
pub const GPSET: usize = 7;

/// Output clear registers GPCLR0..GPCLR1 (write-only).
pub const GPCLR: usize = 10;

/// Pin level registers GPLEV0..GPLEV1 (read-only).
pub const GPLEV: usize = 13;

/// Words in each of the set, clear and level banks.
pub const BANK_WORDS: usize = 2;

/// Width in bits of one pin's function select field.
pub const FSEL_BITS: u32 = 3;

/// Pins covered by one function select word.
pub const PINS_PER_FSEL_WORD: u32 = 10;

/// Function select encodings.
pub const FSEL_INPUT: u32 = 0b000;
pub const FSEL_OUTPUT: u32 = 0b001;
pub const FSEL_ALT0: u32 = 0b100;
pub const FSEL_ALT1: u32 = 0b101;
pub const FSEL_ALT2: u32 = 0b110;
pub const FSEL_ALT3: u32 = 0b111;
pub const FSEL_ALT4: u32 = 0b011;
pub const FSEL_ALT5: u32 = 0b010;
