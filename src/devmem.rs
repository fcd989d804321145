/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Sources of page-sized windows onto physical memory.

use {
    crate::mmio::{DeviceOpenSnafu, MappingSnafu, MmioError, PAGE_SIZE},
    log::debug,
    memmap2::{MmapMut, MmapOptions},
    snafu::ResultExt,
    std::{
        fs::{File, OpenOptions},
        os::unix::fs::OpenOptionsExt,
        path::{Path, PathBuf},
    },
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Physical memory device path.
pub const DEV_MEM: &str = "/dev/mem";

pub mod interface {
    use {super::*, crate::mmio::Result};

    /// A provider of mappings onto physical memory.
    pub trait PhysicalMemory {
        /// Map `PAGE_SIZE` bytes of physical memory starting at `page_base`.
        ///
        /// `page_base` is always page aligned.
        fn map_page(&mut self, page_base: u32) -> Result<MmapMut>;
    }
}

/// The `/dev/mem` device, opened on first use.
///
/// Opening requires root or `CAP_SYS_RAWIO`.
pub struct DevMem {
    path: PathBuf,
    file: Option<File>,
}

/// Zero-filled anonymous pages standing in for physical memory.
///
/// Needs no privileges; every page requested gets its own fresh window.
#[derive(Default)]
pub struct AnonymousMemory {
    mapped: usize,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl DevMem {
    pub fn new() -> Self {
        Self::with_path(DEV_MEM)
    }

    /// Use a different device node, e.g. a `/dev/gpiomem`-like restricted view.
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn file(&mut self) -> Result<&File, MmioError> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .custom_flags(libc::O_SYNC)
                    .open(&self.path)
                    .context(DeviceOpenSnafu { path: &self.path })?;
                debug!("opened {}", self.path.display());
                file
            }
        };
        Ok(self.file.insert(file))
    }
}

impl Default for DevMem {
    fn default() -> Self {
        Self::new()
    }
}

impl AnonymousMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many pages were handed out so far.
    pub fn mapped_pages(&self) -> usize {
        self.mapped
    }
}

//------------------------------------------------------------------------------
// OS Interface Code
//------------------------------------------------------------------------------

impl interface::PhysicalMemory for DevMem {
    fn map_page(&mut self, page_base: u32) -> Result<MmapMut, MmioError> {
        let file = self.file()?;
        // SAFETY: the mapping aliases device registers, nothing else in the process
        // holds a Rust reference into it.
        let page = unsafe {
            MmapOptions::new()
                .offset(u64::from(page_base))
                .len(PAGE_SIZE)
                .map_mut(file)
        }
        .context(MappingSnafu { page: page_base })?;
        Ok(page)
    }
}

impl interface::PhysicalMemory for AnonymousMemory {
    fn map_page(&mut self, page_base: u32) -> Result<MmapMut, MmioError> {
        let page = MmapMut::map_anon(PAGE_SIZE).context(MappingSnafu { page: page_base })?;
        self.mapped += 1;
        Ok(page)
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------
