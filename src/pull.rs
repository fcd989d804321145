/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

use {
    crate::{
        devmem::{interface::PhysicalMemory, DevMem},
        encoding::{self, PullMode},
        ioc::{PinCoordinate, MAX_PIN},
        mmio::{MappedRegisterSpace, MmioError},
    },
    log::debug,
    snafu::{ensure, OptionExt, Snafu},
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Snafu)]
pub enum PullError {
    #[snafu(display("pin {pin} out of range 0-7"))]
    InvalidPin { pin: u8 },
    #[snafu(display("invalid bank/port combination GPIO{bank} port {port:?}"))]
    InvalidLocation { bank: u8, port: char },
    #[snafu(context(false), display("{source}"))]
    Mmio { source: MmioError },
}

pub type Result<T> = ::core::result::Result<T, PullError>;

/// Pull resistor control for all GPIO pins.
///
/// Construct one per process and share it by reference.
pub struct PullController<M = DevMem> {
    registers: MappedRegisterSpace<M>,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl PullError {
    /// The request itself was bad, as opposed to a device or permission problem.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            PullError::InvalidPin { .. } | PullError::InvalidLocation { .. }
        )
    }
}

impl PullController<DevMem> {
    /// Controller writing through `/dev/mem`.
    pub fn new() -> Self {
        Self::with_registers(MappedRegisterSpace::new())
    }
}

impl Default for PullController<DevMem> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: PhysicalMemory> PullController<M> {
    pub fn with_memory(memory: M) -> Self {
        Self::with_registers(MappedRegisterSpace::with_memory(memory))
    }

    pub fn with_registers(registers: MappedRegisterSpace<M>) -> Self {
        Self { registers }
    }

    pub fn registers(&self) -> &MappedRegisterSpace<M> {
        &self.registers
    }

    /// Set the pull resistor of GPIO`bank`_`port``pin`.
    ///
    /// `port` is a letter A-D in either case. GPIO0 port B and GPIO4 port D are routed
    /// to their special IOC blocks automatically.
    pub fn set_pull(&self, bank: u8, port: char, pin: u8, mode: PullMode) -> Result<()> {
        let coord = Self::locate(bank, port, pin)?;
        self.set_pull_at(coord, mode)
    }

    pub fn set_pull_at(&self, coord: PinCoordinate, mode: PullMode) -> Result<()> {
        let register = coord.pull_register();
        let bits = encoding::encode(coord.pin(), mode);
        debug!(
            "{coord}: pull {mode} via {}+{:#06x}",
            register.block, register.offset
        );
        self.registers
            .write(register.address(), bits.data, bits.data_mask())?;
        Ok(())
    }

    /// Read back the pull resistor setup of GPIO`bank`_`port``pin`.
    pub fn pull(&self, bank: u8, port: char, pin: u8) -> Result<PullMode> {
        let coord = Self::locate(bank, port, pin)?;
        self.pull_at(coord)
    }

    pub fn pull_at(&self, coord: PinCoordinate) -> Result<PullMode> {
        let value = self.registers.read(coord.pull_register().address())?;
        // the coordinate already holds a valid pin
        Ok(encoding::decode(coord.pin(), value).unwrap_or(PullMode::Floating))
    }

    fn locate(bank: u8, port: char, pin: u8) -> Result<PinCoordinate> {
        ensure!(pin <= MAX_PIN, InvalidPinSnafu { pin });
        PinCoordinate::new(bank, port, pin).context(InvalidLocationSnafu { bank, port })
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{devmem::AnonymousMemory, ioc},
        std::{sync::Arc, thread},
    };

    fn controller() -> PullController<AnonymousMemory> {
        PullController::with_memory(AnonymousMemory::new())
    }

    fn lower(ctl: &PullController<AnonymousMemory>, bank: u8, port: char, pin: u8) -> u32 {
        let address = ioc::resolve(bank, port, pin).unwrap().address();
        ctl.registers().read(address).unwrap() & 0xffff
    }

    #[test]
    fn pull_up_sets_both_bits() {
        let ctl = controller();
        ctl.set_pull(0, 'A', 0, PullMode::PullUp).unwrap();

        let value = ctl.registers().read(0xfd5f_0020).unwrap();
        assert_eq!(value, (0b11 << 16) | 0b11);
        assert_eq!(ctl.pull(0, 'A', 0).unwrap(), PullMode::PullUp);
    }

    #[test]
    fn invalid_pin_is_rejected_before_resolving() {
        let ctl = controller();
        let err = ctl.set_pull(9, 'Z', 8, PullMode::PullUp).unwrap_err();
        assert!(matches!(err, PullError::InvalidPin { pin: 8 }));
        assert!(err.is_invalid_argument());
        assert_eq!(ctl.registers().mapped_pages(), 0);
    }

    #[test]
    fn invalid_bank_or_port_is_rejected() {
        let ctl = controller();
        for (bank, port) in [(5, 'A'), (0, 'E'), (0, ' ')] {
            let err = ctl.set_pull(bank, port, 0, PullMode::PullDown).unwrap_err();
            assert!(matches!(err, PullError::InvalidLocation { .. }), "{err}");
            assert!(err.is_invalid_argument());
        }
    }

    #[test]
    fn lowercase_port_is_accepted() {
        let ctl = controller();
        ctl.set_pull(4, 'd', 2, PullMode::PullDown).unwrap();
        assert_eq!(ctl.pull(4, 'D', 2).unwrap(), PullMode::PullDown);
        // VCCIO2_IOC + 0x14c
        assert_eq!(ctl.registers().read(0xfd5f_b14c).unwrap() & 0xffff, 0b01 << 4);
    }

    #[test]
    fn device_errors_are_not_invalid_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = PullController::with_memory(DevMem::with_path(dir.path().join("mem")));

        let err = ctl.set_pull(1, 'A', 0, PullMode::PullUp).unwrap_err();
        assert!(matches!(
            err,
            PullError::Mmio {
                source: MmioError::DeviceOpen { .. }
            }
        ));
        assert!(!err.is_invalid_argument());
    }

    #[test]
    fn repeated_set_is_idempotent() {
        let ctl = controller();
        ctl.set_pull(2, 'B', 5, PullMode::PullDown).unwrap();
        let once = ctl.registers().read(0xfd5f_a124).unwrap();
        ctl.set_pull(2, 'B', 5, PullMode::PullDown).unwrap();
        assert_eq!(ctl.registers().read(0xfd5f_a124).unwrap(), once);
    }

    #[test]
    fn changing_mode_touches_only_that_pin() {
        let ctl = controller();
        for pin in 0..=7 {
            ctl.set_pull(3, 'C', pin, PullMode::PullUp).unwrap();
        }
        assert_eq!(lower(&ctl, 3, 'C', 0), 0xffff);

        ctl.set_pull(3, 'C', 5, PullMode::PullDown).unwrap();
        assert_eq!(lower(&ctl, 3, 'C', 0), 0xffff & !(1 << 11));

        ctl.set_pull(3, 'C', 5, PullMode::Floating).unwrap();
        assert_eq!(lower(&ctl, 3, 'C', 0), 0xffff & !(0b11 << 10));

        for pin in (0..=7).filter(|&pin| pin != 5) {
            assert_eq!(ctl.pull(3, 'C', pin).unwrap(), PullMode::PullUp);
        }
        assert_eq!(ctl.pull(3, 'C', 5).unwrap(), PullMode::Floating);
    }

    #[test]
    fn split_port_writes_two_registers() {
        let ctl = controller();
        ctl.set_pull(0, 'B', 1, PullMode::PullUp).unwrap();
        ctl.set_pull(0, 'B', 6, PullMode::PullDown).unwrap();

        // PMU1_IOC + 0x24 and PMU2_IOC + 0x28
        assert_eq!(ctl.registers().read(0xfd5f_0024).unwrap() & 0xffff, 0b11 << 2);
        assert_eq!(ctl.registers().read(0xfd5f_4028).unwrap() & 0xffff, 0b01 << 12);
        assert_eq!(ctl.registers().mapped_pages(), 2);
    }

    #[test]
    fn pins_of_one_register_set_concurrently() {
        let ctl = Arc::new(controller());

        let workers: Vec<_> = (0..=7u8)
            .map(|pin| {
                let ctl = Arc::clone(&ctl);
                thread::spawn(move || {
                    for _ in 0..200 {
                        ctl.set_pull(1, 'B', pin, PullMode::Floating).unwrap();
                        ctl.set_pull(1, 'B', pin, PullMode::PullUp).unwrap();
                    }
                    let last = if pin % 2 == 0 {
                        PullMode::PullDown
                    } else {
                        PullMode::PullUp
                    };
                    ctl.set_pull(1, 'B', pin, last).unwrap();
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        for pin in 0..=7u8 {
            let expected = if pin % 2 == 0 {
                PullMode::PullDown
            } else {
                PullMode::PullUp
            };
            assert_eq!(ctl.pull(1, 'B', pin).unwrap(), expected);
        }
    }
}
