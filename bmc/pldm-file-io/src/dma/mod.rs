// Licensed under the Apache-2.0 license

pub mod emulated;
pub mod engine;

use crate::event_loop::EventSource;
use std::fs::File;
use std::rc::Rc;
use thiserror::Error;

/// Largest single DMA transfer the host bridge accepts.
pub const DEFAULT_MAX_DMA_CHUNK_SIZE: u32 = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// File contents are copied into host memory.
    ToHost,
    /// Host memory is copied into the file.
    FromHost,
}

/// One bounded transfer between a file region and host memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaChunk {
    pub offset: u32,
    pub length: u32,
    pub address: u64,
}

#[derive(Error, Debug)]
pub enum DmaError {
    #[error("DMA resources exhausted")]
    ResourceExhausted,
    #[error("DMA transfer failed with rc {0}")]
    Transfer(i32),
    #[error("Host address {0:#x} outside the DMA window")]
    BadAddress(u64),
    #[error("DMA channel already released")]
    Released,
    #[error("I/O error during DMA")]
    Io(#[from] std::io::Error),
}

/// A DMA channel opened for one transfer.
pub trait DmaChannel {
    /// Readiness source the engine registers with the event loop. The
    /// channel reports readable or writable once it can accept transfers.
    fn notifier(&self) -> Rc<dyn EventSource>;

    /// Moves `chunk.length` bytes between `file` at `chunk.offset` and host
    /// memory at `chunk.address`. Returns the number of bytes moved.
    fn transfer(
        &mut self,
        file: &mut File,
        chunk: DmaChunk,
        direction: Direction,
    ) -> Result<u32, DmaError>;

    /// Returns the channel's resources. Further transfers fail.
    fn release(&mut self);
}

pub trait DmaProvider {
    /// Opens a channel sized for a transfer of `length` bytes.
    fn open(&self, length: u32) -> Result<Box<dyn DmaChannel>, DmaError>;
}
