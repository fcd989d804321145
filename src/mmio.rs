/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Masked register writes through cached physical memory mappings.
//!
//! Rockchip GRF/IOC registers carry a write-enable mask in their upper half: a data bit
//! in the lower half only changes if the matching upper bit is set in the same write.

use {
    crate::{
        devmem::{interface::PhysicalMemory, DevMem},
        sync::{interface::Mutex, ProcessLock},
    },
    log::{debug, trace},
    memmap2::MmapMut,
    snafu::{ensure, Snafu},
    static_assertions::const_assert,
    std::{
        collections::{hash_map::Entry, HashMap},
        io,
        path::PathBuf,
    },
    tock_registers::{
        interfaces::{Readable, Writeable},
        registers::ReadWrite,
    },
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Size of a single mapping window.
pub const PAGE_SIZE: usize = 4096;

const REGISTER_SIZE: usize = core::mem::size_of::<u32>();

const_assert!(PAGE_SIZE.is_power_of_two());
const_assert!(PAGE_SIZE % REGISTER_SIZE == 0);

/// Register space access errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MmioError {
    #[snafu(display("cannot open {}: {source}", path.display()))]
    DeviceOpen { path: PathBuf, source: io::Error },
    #[snafu(display("cannot map physical page {page:#010x}: {source}"))]
    Mapping { page: u32, source: io::Error },
    #[snafu(display("register at {address:#010x} does not fit into its mapped page"))]
    OutOfRange { address: u32 },
    #[snafu(display("unaligned register address {address:#010x}"))]
    Unaligned { address: u32 },
}

pub type Result<T> = ::core::result::Result<T, MmioError>;

/// 32-bit registers of physical memory, mapped a page at a time.
///
/// Pages stay mapped for the lifetime of the instance. Every access holds one lock
/// from cache lookup to the final store, so read-modify-write cycles of concurrent
/// callers never interleave.
pub struct MappedRegisterSpace<M = DevMem> {
    inner: ProcessLock<RegisterSpaceInner<M>>,
}

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

struct RegisterSpaceInner<M> {
    memory: M,
    pages: HashMap<u32, MmapMut>,
}

/// Page base and in-page offset of a register.
fn split(address: u32) -> Result<(u32, usize)> {
    let page_base = address & !(PAGE_SIZE as u32 - 1);
    let offset = (address - page_base) as usize;
    ensure!(offset + REGISTER_SIZE <= PAGE_SIZE, OutOfRangeSnafu { address });
    ensure!(offset % REGISTER_SIZE == 0, UnalignedSnafu { address });
    Ok((page_base, offset))
}

//--------------------------------------------------------------------------------------------------
// Private Code
//--------------------------------------------------------------------------------------------------

impl<M: PhysicalMemory> RegisterSpaceInner<M> {
    fn page(&mut self, page_base: u32) -> Result<&mut MmapMut> {
        match self.pages.entry(page_base) {
            Entry::Occupied(page) => Ok(page.into_mut()),
            Entry::Vacant(slot) => {
                let page = self.memory.map_page(page_base)?;
                debug!("mapped physical page {:#010x}", page_base);
                Ok(slot.insert(page))
            }
        }
    }

    /// Run `f` on the register at `address`, mapping its page if needed.
    fn with_register<R>(&mut self, address: u32, f: impl FnOnce(&ReadWrite<u32>) -> R) -> Result<R> {
        let (page_base, offset) = split(address)?;
        let page = self.page(page_base)?;
        // SAFETY: `split` keeps the 4-byte aligned register inside the page, and the page
        // is a page-aligned mapping that stays alive while `f` runs.
        let register = unsafe { &*(page.as_mut_ptr().add(offset) as *const ReadWrite<u32>) };
        Ok(f(register))
    }
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl MappedRegisterSpace<DevMem> {
    /// Register space backed by `/dev/mem`. The device is opened on the first access.
    pub fn new() -> Self {
        Self::with_memory(DevMem::new())
    }
}

impl Default for MappedRegisterSpace<DevMem> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: PhysicalMemory> MappedRegisterSpace<M> {
    pub fn with_memory(memory: M) -> Self {
        Self {
            inner: ProcessLock::new(RegisterSpaceInner {
                memory,
                pages: HashMap::new(),
            }),
        }
    }

    /// Masked write to the 32-bit register at physical `address`.
    ///
    /// Bits set in `mask` take their value from `data`, all other lower-half bits keep
    /// the value read back from the register. The stored word is
    /// `(mask << 16) | new_lower`, so the hardware applies exactly the masked bits.
    /// Only the lower 16 bits of `data` and `mask` are used.
    pub fn write(&self, address: u32, data: u32, mask: u32) -> Result<()> {
        let mask = mask & 0xffff;
        self.inner.lock(|inner| {
            inner.with_register(address, |register| {
                let old = register.get();
                let lower = ((old & 0xffff) & !mask) | (data & mask);
                let new = (mask << 16) | lower;
                register.set(new);
                trace!("{address:#010x}: {old:#010x} -> {new:#010x}");
            })
        })
    }

    /// Read the 32-bit register at physical `address`.
    pub fn read(&self, address: u32) -> Result<u32> {
        self.inner
            .lock(|inner| inner.with_register(address, |register| register.get()))
    }

    /// Number of pages mapped so far.
    pub fn mapped_pages(&self) -> usize {
        self.inner.lock(|inner| inner.pages.len())
    }

    /// Run `f` with exclusive access to the underlying memory provider.
    pub fn with_memory_provider<R>(&self, f: impl FnOnce(&mut M) -> R) -> R {
        self.inner.lock(|inner| f(&mut inner.memory))
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::devmem::AnonymousMemory,
        std::{sync::Arc, thread},
    };

    const REG: u32 = 0xfd5f_0024;

    fn space() -> MappedRegisterSpace<AnonymousMemory> {
        MappedRegisterSpace::with_memory(AnonymousMemory::new())
    }

    #[test]
    fn masked_write_sets_mask_and_data() {
        let regs = space();
        regs.write(REG, 0b11, 0b11).unwrap();
        assert_eq!(regs.read(REG).unwrap(), (0b11 << 16) | 0b11);
    }

    #[test]
    fn bits_outside_mask_are_preserved() {
        let regs = space();
        regs.write(REG, 0xffff, 0xffff).unwrap();
        regs.write(REG, 0, 0b1100).unwrap();

        assert_eq!(regs.read(REG).unwrap(), (0b1100 << 16) | 0xfff3);
    }

    #[test]
    fn data_outside_mask_is_ignored() {
        let regs = space();
        regs.write(REG, 0xffff, 0b1).unwrap();
        assert_eq!(regs.read(REG).unwrap() & 0xffff, 0b1);
    }

    #[test]
    fn mask_is_limited_to_lower_half() {
        let regs = space();
        regs.write(REG, 0x1_0001, 0x1_0001).unwrap();
        assert_eq!(regs.read(REG).unwrap(), 0x0001_0001);
    }

    #[test]
    fn pages_are_mapped_once() {
        let regs = space();
        regs.write(0xfd5f_0020, 1, 1).unwrap();
        regs.write(0xfd5f_0024, 1, 1).unwrap();
        regs.read(0xfd5f_0ffc).unwrap();
        assert_eq!(regs.mapped_pages(), 1);
        assert_eq!(regs.with_memory_provider(|mem| mem.mapped_pages()), 1);

        regs.write(0xfd5f_4028, 1, 1).unwrap();
        assert_eq!(regs.mapped_pages(), 2);

        // different pages do not alias
        assert_eq!(regs.read(0xfd5f_0028).unwrap(), 0);
    }

    #[test]
    fn unaligned_register_is_rejected() {
        let regs = space();
        let err = regs.write(0xfd5f_0022, 1, 1).unwrap_err();
        assert!(matches!(err, MmioError::Unaligned { address: 0xfd5f_0022 }));
        assert_eq!(regs.mapped_pages(), 0);
    }

    #[test]
    fn split_keeps_register_inside_page() {
        assert_eq!(split(0xfd5f_0ffc).unwrap(), (0xfd5f_0000, 0xffc));
        assert_eq!(split(0xfd5f_1000).unwrap(), (0xfd5f_1000, 0));
        assert!(matches!(
            split(0xfd5f_0ffe),
            Err(MmioError::OutOfRange {
                address: 0xfd5f_0ffe
            })
        ));
        assert!(matches!(
            split(0xfd5f_0fff),
            Err(MmioError::OutOfRange { .. })
        ));
        assert!(matches!(
            split(0xfd5f_0022),
            Err(MmioError::Unaligned {
                address: 0xfd5f_0022
            })
        ));
    }

    #[test]
    fn register_crossing_page_end_is_out_of_range() {
        let regs = space();
        let err = regs.write(0xfd5f_0ffe, 1, 1).unwrap_err();
        assert!(matches!(err, MmioError::OutOfRange { address: 0xfd5f_0ffe }), "{err}");
        assert!(regs.read(0xfd5f_0ffd).is_err());
        assert_eq!(regs.mapped_pages(), 0);
    }

    #[test]
    fn concurrent_writers_do_not_lose_updates() {
        let regs = Arc::new(space());

        let workers: Vec<_> = (0..8u32)
            .map(|bit| {
                let regs = Arc::clone(&regs);
                thread::spawn(move || {
                    for round in 0..500u32 {
                        regs.write(REG, (round & 1) << bit, 1 << bit).unwrap();
                    }
                    regs.write(REG, 1 << bit, 1 << bit).unwrap();
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(regs.read(REG).unwrap() & 0xffff, 0xff);
    }
}
