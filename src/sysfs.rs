/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! GPIO line values through the legacy `/sys/class/gpio` interface.
//!
//! Independent of the pull register path: nothing here touches physical memory.

use {
    crate::ioc::{Port, MAX_BANK, MAX_PIN},
    log::warn,
    snafu::{ensure, ResultExt, Snafu},
    std::{
        fs::{self, OpenOptions},
        io::{self, Write},
        path::{Path, PathBuf},
    },
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Default sysfs GPIO class directory.
pub const SYSFS_GPIO: &str = "/sys/class/gpio";

#[derive(Debug, Snafu)]
pub enum SysfsError {
    #[snafu(display("invalid GPIO coordinate bank {bank} port {port} pin {pin}"))]
    InvalidCoordinate { bank: u8, port: u8, pin: u8 },
    #[snafu(display("invalid GPIO value {value:?}, expected 0, 1, low or high"))]
    InvalidValue { value: String },
    #[snafu(display("{}: {source}", path.display()))]
    Io { path: PathBuf, source: io::Error },
}

pub type Result<T> = ::core::result::Result<T, SysfsError>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// An exported GPIO line.
///
/// Unexported on `close()` or when dropped.
#[derive(Debug)]
pub struct SysfsGpio {
    line: u32,
    root: PathBuf,
    exported: bool,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

/// Linux GPIO line number of `bank`/`port`/`pin`, with port A=0 .. D=3.
pub const fn line_number(bank: u8, port: u8, pin: u8) -> u32 {
    bank as u32 * 32 + port as u32 * 8 + pin as u32
}

impl Direction {
    const fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl Level {
    const fn as_str(self) -> &'static str {
        match self {
            Level::Low => "0",
            Level::High => "1",
        }
    }
}

impl SysfsGpio {
    /// Export the line for `bank`/`port`/`pin` under `/sys/class/gpio`.
    ///
    /// A line that is already exported is reused.
    pub fn open(bank: u8, port: u8, pin: u8) -> Result<Self> {
        Self::open_in(SYSFS_GPIO, bank, port, pin)
    }

    /// Same as `open()` with a different sysfs GPIO class directory.
    pub fn open_in(root: impl AsRef<Path>, bank: u8, port: u8, pin: u8) -> Result<Self> {
        ensure!(
            bank <= MAX_BANK && Port::from_index(port).is_some() && pin <= MAX_PIN,
            InvalidCoordinateSnafu { bank, port, pin }
        );
        let mut gpio = Self {
            line: line_number(bank, port, pin),
            root: root.as_ref().to_path_buf(),
            exported: false,
        };
        match write_line(&gpio.root.join("export"), gpio.line) {
            Err(SysfsError::Io { ref source, .. }) if already_exported(source) => {}
            other => other?,
        }
        gpio.exported = true;
        Ok(gpio)
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn value_path(&self) -> PathBuf {
        self.line_dir().join("value")
    }

    pub fn direction_path(&self) -> PathBuf {
        self.line_dir().join("direction")
    }

    pub fn set_direction(&self, direction: Direction) -> Result<()> {
        let path = self.direction_path();
        fs::write(&path, direction.as_str()).context(IoSnafu { path })
    }

    /// `"0"` reads as low, anything else as high.
    pub fn read(&self) -> Result<Level> {
        let path = self.value_path();
        let value = fs::read_to_string(&path).context(IoSnafu { path })?;
        Ok(match value.trim() {
            "0" => Level::Low,
            _ => Level::High,
        })
    }

    /// Write `0`, `1`, `low` or `high`, in any case and surrounded by any whitespace.
    pub fn write(&self, value: &str) -> Result<()> {
        let level = match value.trim().to_ascii_lowercase().as_str() {
            "0" | "low" => Level::Low,
            "1" | "high" => Level::High,
            _ => return InvalidValueSnafu { value }.fail(),
        };
        self.set_level(level)
    }

    pub fn set_level(&self, level: Level) -> Result<()> {
        let path = self.value_path();
        fs::write(&path, level.as_str()).context(IoSnafu { path })
    }

    /// Unexport the line. Calling it again does nothing.
    pub fn close(&mut self) -> Result<()> {
        if !self.exported {
            return Ok(());
        }
        write_line(&self.root.join("unexport"), self.line)?;
        self.exported = false;
        Ok(())
    }

    fn line_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.line))
    }
}

impl Drop for SysfsGpio {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("GPIO line {} left exported: {e}", self.line);
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Private Code
//--------------------------------------------------------------------------------------------------

fn write_line(path: &Path, line: u32) -> Result<()> {
    OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|mut file| file.write_all(line.to_string().as_bytes()))
        .context(IoSnafu { path })
}

fn already_exported(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EBUSY) || e.kind() == io::ErrorKind::AlreadyExists
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------
