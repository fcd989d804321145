/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! GPIO pull-resistor control for RK3588 boards (ROCK 5 and friends).
//!
//! Pull-up, pull-down and floating are configured by writing the I/O controller (IOC)
//! registers directly through `/dev/mem`, bypassing the pinctrl driver. Pins are named
//! by bank (0-4), port (A-D) and pin (0-7).
//!
//! ```no_run
//! use rkpull::{PullController, PullMode};
//!
//! let pulls = PullController::new();
//! pulls.set_pull(1, 'B', 3, PullMode::PullUp)?;
//! # Ok::<(), rkpull::PullError>(())
//! ```
//!
//! Writes need root or `CAP_SYS_RAWIO`. Separate processes writing the same register
//! are not coordinated.

#![warn(clippy::undocumented_unsafe_blocks)]

pub mod devmem;
pub mod encoding;
pub mod ioc;
pub mod mmio;
pub mod pull;
mod sync;
pub mod sysfs;

pub use {
    devmem::{AnonymousMemory, DevMem},
    encoding::PullMode,
    ioc::{PinCoordinate, Port, RegisterLocation},
    mmio::{MappedRegisterSpace, MmioError},
    pull::{PullController, PullError},
};
