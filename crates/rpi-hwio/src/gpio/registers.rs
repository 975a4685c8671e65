// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::Error;
use rpi_hwio_sys::{bcm, libc};
use std::{
    fs::OpenOptions,
    io,
    os::unix::{fs::OpenOptionsExt, io::AsRawFd},
    path::Path,
    ptr::{self, NonNull},
};

/// Number of 32-bit words in the GPIO block.
const BLOCK_WORDS: usize = bcm::BLOCK_SIZE / std::mem::size_of::<u32>();

/// Word-addressed access to a block of 32-bit peripheral registers.
///
/// Offsets are in words from the start of the block. Implementations reject
/// offsets at or beyond [`word_count`](Self::word_count).
pub trait RegisterFile {
    fn word_count(&self) -> usize;

    fn read_word(&self, offset: usize) -> Result<u32, Error>;

    fn write_word(&mut self, offset: usize, value: u32) -> Result<(), Error>;

    /// Release the underlying block. Further access fails with
    /// [`Error::RegisterUnavailable`]. Calling it twice is a no-op.
    fn close(&mut self) {}
}

/// Named register banks of the GPIO block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    /// GPFSEL0..5, three bits per pin
    FunctionSelect,
    /// GPSET0..1, write-only
    Set,
    /// GPCLR0..1, write-only
    Clear,
    /// GPLEV0..1, read-only
    Level,
}

impl Bank {
    /// First word of the bank.
    pub const fn base(self) -> usize {
        match self {
            Bank::FunctionSelect => bcm::GPFSEL,
            Bank::Set => bcm::GPSET,
            Bank::Clear => bcm::GPCLR,
            Bank::Level => bcm::GPLEV,
        }
    }

    /// Number of words in the bank.
    pub const fn words(self) -> usize {
        match self {
            Bank::FunctionSelect => bcm::GPFSEL_WORDS,
            Bank::Set | Bank::Clear | Bank::Level => bcm::BANK_WORDS,
        }
    }

    /// Block offset of word `index` within the bank.
    pub fn offset(self, index: usize) -> Result<usize, Error> {
        if index >= self.words() {
            return Err(Error::RegisterOutOfRange {
                offset: self.base() + index,
                words: self.words(),
            });
        }
        Ok(self.base() + index)
    }
}

fn check_offset(offset: usize, words: usize) -> Result<(), Error> {
    if offset >= words {
        return Err(Error::RegisterOutOfRange { offset, words });
    }
    Ok(())
}

/// Mapping of the GPIO register block into process memory.
///
/// The block is mapped once by [`open`](Self::open) and unmapped once, either
/// by [`close`](RegisterFile::close) or on drop. All access is volatile.
#[derive(Debug)]
pub struct RegisterMap {
    base: Option<NonNull<u32>>,
    words: usize,
}

// SAFETY: the mapping is owned exclusively by this value and all access goes
// through &self/&mut self, so moving it to another thread is sound.
unsafe impl Send for RegisterMap {}

impl RegisterMap {
    /// Map the GPIO block through `/dev/gpiomem`.
    pub fn open() -> Result<Self, Error> {
        Self::open_path(bcm::GPIOMEM_PATH, bcm::GPIOMEM_BASE)
    }

    /// Map [`BLOCK_SIZE`](bcm::BLOCK_SIZE) bytes of `path` starting at byte
    /// offset `base`, e.g. `/dev/mem` at [`bcm::GPIO_BASE`].
    pub fn open_path<P: AsRef<Path>>(path: P, base: u64) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
            .map_err(Error::Map)?;

        let offset = libc::off_t::try_from(base)
            .map_err(|_| Error::Map(io::Error::from(io::ErrorKind::InvalidInput)))?;

        // SAFETY: fresh shared mapping of a device node, checked against
        // MAP_FAILED below. The descriptor may be closed once mapped.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                bcm::BLOCK_SIZE,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                offset,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(Error::Map(io::Error::last_os_error()));
        }

        log::debug!(
            "mapped {} bytes of {} at offset {:#x}",
            bcm::BLOCK_SIZE,
            path.display(),
            base
        );

        Ok(RegisterMap {
            base: NonNull::new(ptr.cast::<u32>()),
            words: BLOCK_WORDS,
        })
    }

    pub fn is_mapped(&self) -> bool {
        self.base.is_some()
    }

    fn word_ptr(&self, offset: usize) -> Result<*mut u32, Error> {
        let base = self.base.ok_or(Error::RegisterUnavailable)?;
        check_offset(offset, self.words)?;
        // SAFETY: offset is within the mapped block
        Ok(unsafe { base.as_ptr().add(offset) })
    }
}

impl RegisterFile for RegisterMap {
    fn word_count(&self) -> usize {
        self.words
    }

    fn read_word(&self, offset: usize) -> Result<u32, Error> {
        let ptr = self.word_ptr(offset)?;
        // SAFETY: ptr is aligned and inside the live mapping
        Ok(unsafe { ptr::read_volatile(ptr) })
    }

    fn write_word(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        let ptr = self.word_ptr(offset)?;
        // SAFETY: ptr is aligned and inside the live mapping
        unsafe { ptr::write_volatile(ptr, value) };
        Ok(())
    }

    fn close(&mut self) {
        if let Some(base) = self.base.take() {
            // SAFETY: base came from mmap with the same length and is unmapped
            // only here, after which it is no longer reachable.
            let ret = unsafe { libc::munmap(base.as_ptr().cast(), bcm::BLOCK_SIZE) };
            if ret != 0 {
                log::warn!(
                    "GPIO register unmap failed: {}",
                    io::Error::last_os_error()
                );
            } else {
                log::debug!("unmapped GPIO register block");
            }
        }
    }
}

impl Drop for RegisterMap {
    fn drop(&mut self) {
        self.close();
    }
}

/// Register block held in ordinary memory.
///
/// Behaves like a plain RAM block: the write-only set and clear banks keep the
/// last value stored, and the level bank only changes when written directly.
/// Useful for dry runs and for exercising [`GpioController`](super::GpioController)
/// off-target.
#[derive(Debug, Clone)]
pub struct MemoryRegisters {
    words: Vec<u32>,
    closed: bool,
}

impl MemoryRegisters {
    pub fn new() -> Self {
        MemoryRegisters {
            words: vec![0; BLOCK_WORDS],
            closed: false,
        }
    }

    /// Current contents of the block.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Default for MemoryRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile for MemoryRegisters {
    fn word_count(&self) -> usize {
        self.words.len()
    }

    fn read_word(&self, offset: usize) -> Result<u32, Error> {
        if self.closed {
            return Err(Error::RegisterUnavailable);
        }
        check_offset(offset, self.words.len())?;
        Ok(self.words[offset])
    }

    fn write_word(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        if self.closed {
            return Err(Error::RegisterUnavailable);
        }
        check_offset(offset, self.words.len())?;
        self.words[offset] = value;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
