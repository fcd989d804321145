/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! RK3588 I/O controller (IOC) pull register map.
//!
//! GPIO pull configuration does not live in the GPIO blocks but in the IOC blocks of the
//! power domain each port is wired to. Descriptions taken from the RK3588 TRM, part 1,
//! chapter "GRF", sections PMU1_IOC, PMU2_IOC, VCCIO*_IOC and EMMC_IOC.
//!
//! Two ports do not follow the per-bank pattern:
//!
//! - GPIO0 port B is split between PMU1_IOC (pins 0-3) and PMU2_IOC (pins 4-7).
//! - GPIO4 port D sits in VCCIO2_IOC while the rest of GPIO4 is in VCCIO6_IOC.

use {
    core::{fmt, ops::RangeInclusive},
    map::*,
    offset::*,
    IocBlock::{Emmc, Pmu1, Pmu2, Vccio1_4, Vccio2, Vccio3_5, Vccio6},
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Physical base addresses of the IOC blocks.
pub mod map {
    pub const PMU1_IOC: u32 = 0xfd5f_0000;
    pub const PMU2_IOC: u32 = 0xfd5f_4000;
    pub const VCCIO1_4_IOC: u32 = 0xfd5f_9000;
    pub const VCCIO3_5_IOC: u32 = 0xfd5f_a000;
    pub const VCCIO2_IOC: u32 = 0xfd5f_b000;
    pub const VCCIO6_IOC: u32 = 0xfd5f_c000;
    pub const EMMC_IOC: u32 = 0xfd5f_d000;
}

/// Pull register offsets inside an IOC block.
pub mod offset {
    pub const GPIO0A_P: u32 = 0x0020;
    /// Pins 0-3, PMU1_IOC.
    pub const GPIO0B_P: u32 = 0x0024;
    /// Pins 4-7, PMU2_IOC.
    pub const GPIO0B_P_HIGH: u32 = 0x0028;
    pub const GPIO0C_P: u32 = 0x002c;
    pub const GPIO0D_P: u32 = 0x0030;
    pub const GPIO1A_P: u32 = 0x0110;
    pub const GPIO1B_P: u32 = 0x0114;
    pub const GPIO1C_P: u32 = 0x0118;
    pub const GPIO1D_P: u32 = 0x011c;
    pub const GPIO2A_P: u32 = 0x0120;
    pub const GPIO2B_P: u32 = 0x0124;
    pub const GPIO2C_P: u32 = 0x0128;
    pub const GPIO2D_P: u32 = 0x012c;
    pub const GPIO3A_P: u32 = 0x0130;
    pub const GPIO3B_P: u32 = 0x0134;
    pub const GPIO3C_P: u32 = 0x0138;
    pub const GPIO3D_P: u32 = 0x013c;
    pub const GPIO4A_P: u32 = 0x0140;
    pub const GPIO4B_P: u32 = 0x0144;
    pub const GPIO4C_P: u32 = 0x0148;
    /// VCCIO2_IOC, not VCCIO6_IOC.
    pub const GPIO4D_P: u32 = 0x014c;
}

/// Highest GPIO bank number.
pub const MAX_BANK: u8 = 4;

/// Highest pin number within a port.
pub const MAX_PIN: u8 = 7;

/// An IOC block holding pull registers.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IocBlock {
    Pmu1,
    Pmu2,
    Vccio1_4,
    Vccio3_5,
    Vccio2,
    Vccio6,
    Emmc,
}

/// A GPIO port within a bank.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Port {
    A,
    B,
    C,
    D,
}

/// Bank/port/pin coordinate of a GPIO pin, validated on construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PinCoordinate {
    bank: u8,
    port: Port,
    pin: u8,
}

/// Where a pin's pull register lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterLocation {
    pub block: IocBlock,
    pub offset: u32,
}

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

const fn loc(block: IocBlock, offset: u32) -> RegisterLocation {
    RegisterLocation { block, offset }
}

/// Per-bank pull registers, indexed by `[bank][port]`.
const PULL_REGISTERS: [[RegisterLocation; 4]; 5] = [
    [
        loc(Pmu1, GPIO0A_P),
        loc(Pmu1, GPIO0B_P),
        loc(Pmu2, GPIO0C_P),
        loc(Pmu2, GPIO0D_P),
    ],
    [
        loc(Vccio1_4, GPIO1A_P),
        loc(Vccio1_4, GPIO1B_P),
        loc(Vccio1_4, GPIO1C_P),
        loc(Vccio1_4, GPIO1D_P),
    ],
    [
        loc(Emmc, GPIO2A_P),
        loc(Vccio3_5, GPIO2B_P),
        loc(Vccio3_5, GPIO2C_P),
        loc(Emmc, GPIO2D_P),
    ],
    [
        loc(Vccio3_5, GPIO3A_P),
        loc(Vccio3_5, GPIO3B_P),
        loc(Vccio3_5, GPIO3C_P),
        loc(Vccio3_5, GPIO3D_P),
    ],
    [
        loc(Vccio6, GPIO4A_P),
        loc(Vccio6, GPIO4B_P),
        loc(Vccio6, GPIO4C_P),
        loc(Vccio6, GPIO4D_P),
    ],
];

/// Replaces the table entry for the pins of `bank`/`port` falling into `pins`.
struct Override {
    bank: u8,
    port: Port,
    pins: RangeInclusive<u8>,
    location: RegisterLocation,
}

/// Applied in order after the table lookup, first match wins.
const OVERRIDES: [Override; 2] = [
    Override {
        bank: 0,
        port: Port::B,
        pins: 4..=7,
        location: loc(Pmu2, GPIO0B_P_HIGH),
    },
    Override {
        bank: 4,
        port: Port::D,
        pins: 0..=7,
        location: loc(Vccio2, GPIO4D_P),
    },
];

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl IocBlock {
    pub const fn base_address(self) -> u32 {
        match self {
            Pmu1 => PMU1_IOC,
            Pmu2 => PMU2_IOC,
            Vccio1_4 => VCCIO1_4_IOC,
            Vccio3_5 => VCCIO3_5_IOC,
            Vccio2 => VCCIO2_IOC,
            Vccio6 => VCCIO6_IOC,
            Emmc => EMMC_IOC,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Pmu1 => "PMU1_IOC",
            Pmu2 => "PMU2_IOC",
            Vccio1_4 => "VCCIO1_4_IOC",
            Vccio3_5 => "VCCIO3_5_IOC",
            Vccio2 => "VCCIO2_IOC",
            Vccio6 => "VCCIO6_IOC",
            Emmc => "EMMC_IOC",
        }
    }
}

impl fmt::Display for IocBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Port {
    /// Parse a port letter, either case.
    pub const fn from_char(c: char) -> Option<Port> {
        match c {
            'A' | 'a' => Some(Port::A),
            'B' | 'b' => Some(Port::B),
            'C' | 'c' => Some(Port::C),
            'D' | 'd' => Some(Port::D),
            _ => None,
        }
    }

    pub const fn from_index(index: u8) -> Option<Port> {
        match index {
            0 => Some(Port::A),
            1 => Some(Port::B),
            2 => Some(Port::C),
            3 => Some(Port::D),
            _ => None,
        }
    }

    /// A=0, B=1, C=2, D=3.
    pub const fn index(self) -> u8 {
        self as u8
    }
}

impl TryFrom<char> for Port {
    type Error = char;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        Port::from_char(c).ok_or(c)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", (b'A' + self.index()) as char)
    }
}

impl PinCoordinate {
    /// Returns `None` if any of the coordinates is out of range.
    pub fn new(bank: u8, port: char, pin: u8) -> Option<Self> {
        let port = Port::from_char(port)?;
        (bank <= MAX_BANK && pin <= MAX_PIN).then_some(Self { bank, port, pin })
    }

    pub const fn bank(&self) -> u8 {
        self.bank
    }

    pub const fn port(&self) -> Port {
        self.port
    }

    pub const fn pin(&self) -> u8 {
        self.pin
    }

    /// Pull register serving this pin.
    pub fn pull_register(&self) -> RegisterLocation {
        OVERRIDES
            .iter()
            .find(|o| o.bank == self.bank && o.port == self.port && o.pins.contains(&self.pin))
            .map(|o| o.location)
            .unwrap_or(PULL_REGISTERS[usize::from(self.bank)][usize::from(self.port.index())])
    }
}

impl fmt::Display for PinCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "GPIO{}_{}{}", self.bank, self.port, self.pin)
    }
}

impl RegisterLocation {
    pub const fn base_address(&self) -> u32 {
        self.block.base_address()
    }

    /// Physical address of the register.
    pub const fn address(&self) -> u32 {
        self.block.base_address() + self.offset
    }
}

/// Find the pull register for `bank`/`port`/`pin`.
///
/// Returns `None` for a bank outside 0..=4, a port other than A-D (either case) or
/// a pin outside 0..=7.
pub fn resolve(bank: u8, port: char, pin: u8) -> Option<RegisterLocation> {
    PinCoordinate::new(bank, port, pin).map(|coord| coord.pull_register())
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------
