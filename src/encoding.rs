/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Pull configuration bits inside an IOC pull register.
//!
//! Each pull register serves eight pins. Pin `n` owns two bits of the data half:
//!
//! +------+-----------------+-----------------+
//! | pin  | PE (pull enable)| PS (pull select)|
//! +------+-----------------+-----------------+
//! | n    | bit 2n          | bit 2n+1        |
//! +------+-----------------+-----------------+
//!
//! The upper half of the register is a write-enable mask: bit `2n+16` unlocks PE,
//! bit `2n+17` unlocks PS.

use {
    core::{fmt, str::FromStr},
    snafu::Snafu,
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Number of pins served by a single pull register.
pub const PINS_PER_REGISTER: u8 = 8;

/// Pull resistor setup.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PullMode {
    /// PE=1, PS=1.
    PullUp,
    /// PE=1, PS=0.
    PullDown,
    /// PE=0, no bias resistor engaged.
    Floating,
}

/// Data and write-enable mask for one pin's pull bits.
///
/// `mask` is positioned in the upper half, the way the hardware expects it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PullBits {
    pub data: u32,
    pub mask: u32,
}

#[derive(Debug, Snafu)]
#[snafu(display("unknown pull mode {input:?}, expected up, down or float"))]
pub struct ParsePullModeError {
    input: String,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl PullBits {
    /// Write-enable bits moved down to line up with the data half.
    pub const fn data_mask(self) -> u32 {
        self.mask >> 16
    }

    /// A zero mask touches nothing.
    pub const fn is_noop(self) -> bool {
        self.mask == 0
    }
}

/// Compute the pull register data and mask for `pin`.
///
/// Pins outside 0..=7 produce an all-zero word, which writes nothing.
pub const fn encode(pin: u8, mode: PullMode) -> PullBits {
    if pin >= PINS_PER_REGISTER {
        return PullBits { data: 0, mask: 0 };
    }
    let pe = 1u32 << (2 * pin);
    let ps = 1u32 << (2 * pin + 1);

    let data = match mode {
        PullMode::PullUp => pe | ps,
        PullMode::PullDown => pe,
        PullMode::Floating => 0,
    };

    PullBits {
        data,
        mask: (pe | ps) << 16,
    }
}

/// Recover the pull mode of `pin` from a register value, looking only at the data half.
pub const fn decode(pin: u8, register: u32) -> Option<PullMode> {
    if pin >= PINS_PER_REGISTER {
        return None;
    }
    let enabled = register & (1 << (2 * pin)) != 0;
    let select = register & (1 << (2 * pin + 1)) != 0;

    Some(match (enabled, select) {
        (false, _) => PullMode::Floating,
        (true, true) => PullMode::PullUp,
        (true, false) => PullMode::PullDown,
    })
}

impl fmt::Display for PullMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            PullMode::PullUp => "up",
            PullMode::PullDown => "down",
            PullMode::Floating => "float",
        })
    }
}

impl FromStr for PullMode {
    type Err = ParsePullModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "pull-up" | "pullup" => Ok(PullMode::PullUp),
            "down" | "pull-down" | "pulldown" => Ok(PullMode::PullDown),
            "float" | "floating" | "none" => Ok(PullMode::Floating),
            _ => ParsePullModeSnafu { input: s }.fail(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------
