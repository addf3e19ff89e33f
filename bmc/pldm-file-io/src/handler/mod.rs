// Licensed under the Apache-2.0 license

//! The per-file-type handler contract and the helpers its variants share.

pub mod cert;
pub mod chap;
pub mod dump;
pub mod keyword;
pub mod license;
pub mod lid;
pub mod pcie;
pub mod pel;
pub mod progress;

use crate::config::FileIoConfig;
use crate::dma::engine::{DmaTransferEngine, InFlightTransfers, TransferRequest};
use crate::dma::{DmaProvider, Direction};
use crate::event_loop::EventLoop;
use crate::response::ResponseContext;
use log::{debug, error};
use pldm_common::protocol::file_io::FileIoCompletionCode;
use std::cell::RefCell;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

pub type HandlerResult<T> = Result<T, FileIoCompletionCode>;

/// Handler shared between the dispatcher and an in-flight transfer, which
/// calls back into it once the data has moved.
pub type SharedFileHandler = Rc<RefCell<dyn FileHandler>>;

/// Operations the host may invoke on a typed file.
///
/// Every verb defaults to `UnsupportedPldmCmd`; variants override the ones
/// that make sense for their file type.
pub trait FileHandler {
    fn file_handle(&self) -> u32;

    /// Reads up to `length` bytes at `offset` into `out`, returning the
    /// number of bytes read.
    fn read(&mut self, _offset: u32, _length: u32, _out: &mut Vec<u8>) -> HandlerResult<u32> {
        Err(FileIoCompletionCode::UnsupportedPldmCmd)
    }

    fn write(&mut self, _data: &[u8], _offset: u32) -> HandlerResult<u32> {
        Err(FileIoCompletionCode::UnsupportedPldmCmd)
    }

    /// Starts copying file data into host memory. An `Ok` return means the
    /// transfer was submitted through `ctx`; its outcome is reported later.
    fn read_into_memory(
        &mut self,
        _offset: u32,
        _length: u32,
        _address: u64,
        _ctx: &mut TransferContext<'_>,
    ) -> HandlerResult<()> {
        Err(FileIoCompletionCode::UnsupportedPldmCmd)
    }

    fn write_from_memory(
        &mut self,
        _offset: u32,
        _length: u32,
        _address: u64,
        _ctx: &mut TransferContext<'_>,
    ) -> HandlerResult<()> {
        Err(FileIoCompletionCode::UnsupportedPldmCmd)
    }

    fn file_ack(&mut self, _file_status: u8) -> HandlerResult<()> {
        Err(FileIoCompletionCode::UnsupportedPldmCmd)
    }

    fn file_ack_with_meta_data(&mut self, _file_status: u8, _meta_data: [u32; 4]) -> HandlerResult<()> {
        Err(FileIoCompletionCode::UnsupportedPldmCmd)
    }

    fn new_file_available(&mut self, _length: u64) -> HandlerResult<()> {
        Err(FileIoCompletionCode::UnsupportedPldmCmd)
    }

    fn new_file_available_with_meta_data(
        &mut self,
        _length: u64,
        _meta_data: [u32; 4],
    ) -> HandlerResult<()> {
        Err(FileIoCompletionCode::UnsupportedPldmCmd)
    }

    /// Runs after a DMA verb completed successfully.
    fn post_data_transfer_callback(&mut self, _is_write: bool) {}
}

/// Resources a DMA verb needs to submit its transfer. At most one transfer
/// can be submitted per context.
pub struct TransferContext<'a> {
    event_loop: &'a EventLoop,
    provider: &'a dyn DmaProvider,
    in_flight: &'a Rc<InFlightTransfers>,
    config: &'a FileIoConfig,
    response: Option<ResponseContext>,
    submitted: bool,
}

impl<'a> TransferContext<'a> {
    pub fn new(
        event_loop: &'a EventLoop,
        provider: &'a dyn DmaProvider,
        in_flight: &'a Rc<InFlightTransfers>,
        config: &'a FileIoConfig,
        response: ResponseContext,
    ) -> Self {
        Self {
            event_loop,
            provider,
            in_flight,
            config,
            response: Some(response),
            submitted: false,
        }
    }

    /// True once a transfer owns the response. The caller must not answer
    /// the request itself after that.
    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Validates the request against `path`, opens the file and hands it to
    /// a new transfer engine. Returns the length that will be transferred,
    /// which for reads is clamped to the end of the file.
    pub fn transfer_file(
        &mut self,
        path: &Path,
        direction: Direction,
        offset: u32,
        length: u32,
        address: u64,
    ) -> HandlerResult<u32> {
        if length == 0 {
            error!("Zero length transfer requested for {}", path.display());
            return Err(FileIoCompletionCode::InvalidLength);
        }
        check_region(path, offset, length)?;
        if address.checked_add(length as u64).is_none() {
            error!("Host address {:#x} + {} wraps", address, length);
            return Err(FileIoCompletionCode::DataOutOfRange);
        }

        let (file, length) = match direction {
            Direction::ToHost => {
                let length = clamp_to_file(path, offset, length)?;
                let file = File::open(path).map_err(|e| {
                    error!("Failed to open {}: {}", path.display(), e);
                    FileIoCompletionCode::Error
                })?;
                (file, length)
            }
            Direction::FromHost => {
                check_write_offset(path, offset)?;
                (open_for_write(path)?, length)
            }
        };

        let Some(response) = self.response.take() else {
            error!("Transfer already submitted for this request");
            return Err(FileIoCompletionCode::Error);
        };

        let request = TransferRequest {
            file,
            direction,
            offset,
            length,
            address,
            max_chunk: self.config.max_dma_chunk_size,
            timeout: self.config.dma_timeout(),
        };
        DmaTransferEngine::start(request, self.provider, self.event_loop, self.in_flight, response)
            .map_err(|e| {
                error!("Failed to start DMA transfer for {}: {}", path.display(), e);
                FileIoCompletionCode::Error
            })?;
        self.submitted = true;
        Ok(length)
    }
}

/// Rejects a region whose end does not fit in a 32-bit file offset.
fn check_region(path: &Path, offset: u32, length: u32) -> HandlerResult<()> {
    if offset.checked_add(length).is_none() {
        error!(
            "Region of {} bytes at offset {} of {} exceeds the file offset range",
            length,
            offset,
            path.display()
        );
        return Err(FileIoCompletionCode::DataOutOfRange);
    }
    Ok(())
}

/// Writes may extend a file but never start past its current end, so no
/// write leaves a hole.
fn check_write_offset(path: &Path, offset: u32) -> HandlerResult<()> {
    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if offset as u64 > size {
        error!(
            "Write offset {} past end of {} ({} bytes)",
            offset,
            path.display(),
            size
        );
        return Err(FileIoCompletionCode::DataOutOfRange);
    }
    Ok(())
}

/// Checks that `offset` lies inside the file and clamps `length` to the
/// bytes that remain after it.
fn clamp_to_file(path: &Path, offset: u32, length: u32) -> HandlerResult<u32> {
    let size = fs::metadata(path)
        .map_err(|_| {
            error!("File {} does not exist", path.display());
            FileIoCompletionCode::InvalidFileHandle
        })?
        .len();
    if offset as u64 >= size {
        error!(
            "Offset {} exceeds size {} of {}",
            offset,
            size,
            path.display()
        );
        return Err(FileIoCompletionCode::DataOutOfRange);
    }
    let remaining = size - offset as u64;
    if length as u64 > remaining {
        debug!("Clamping read of {} bytes to {}", length, remaining);
        return Ok(remaining as u32);
    }
    Ok(length)
}

/// Opens `path` for writing without truncating, creating it and its parent
/// directory when missing.
fn open_for_write(path: &Path) -> HandlerResult<File> {
    let result = if path.exists() {
        OpenOptions::new().read(true).write(true).open(path)
    } else {
        ensure_parent_dir(path)?;
        OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
    };
    result.map_err(|e| {
        error!("Failed to open {} for writing: {}", path.display(), e);
        FileIoCompletionCode::Error
    })
}

pub(crate) fn ensure_parent_dir(path: &Path) -> HandlerResult<()> {
    match path.parent() {
        Some(dir) => fs::create_dir_all(dir).map_err(|e| {
            error!("Failed to create {}: {}", dir.display(), e);
            FileIoCompletionCode::Error
        }),
        None => Ok(()),
    }
}

/// Synchronous read of a file region, clamped to the end of the file.
pub fn read_file(path: &Path, offset: u32, length: u32, out: &mut Vec<u8>) -> HandlerResult<u32> {
    let length = clamp_to_file(path, offset, length)?;
    let io_error = |e: std::io::Error| {
        error!("Failed to read {}: {}", path.display(), e);
        FileIoCompletionCode::Error
    };
    let mut file = File::open(path).map_err(io_error)?;
    file.seek(SeekFrom::Start(offset as u64)).map_err(io_error)?;
    let start = out.len();
    out.resize(start + length as usize, 0);
    file.read_exact(&mut out[start..]).map_err(io_error)?;
    Ok(length)
}

/// Synchronous write at `offset`, under the same rules as a DMA write.
pub fn write_file(path: &Path, data: &[u8], offset: u32) -> HandlerResult<u32> {
    let length = u32::try_from(data.len()).map_err(|_| FileIoCompletionCode::InvalidLength)?;
    check_region(path, offset, length)?;
    check_write_offset(path, offset)?;
    let io_error = |e: std::io::Error| {
        error!("Failed to write {}: {}", path.display(), e);
        FileIoCompletionCode::Error
    };
    let mut file = open_for_write(path)?;
    file.seek(SeekFrom::Start(offset as u64)).map_err(io_error)?;
    file.write_all(data).map_err(io_error)?;
    Ok(length)
}

/// Removes `path`, treating an already missing file as success.
pub(crate) fn remove_file(path: &Path) -> HandlerResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            error!("Failed to remove {}: {}", path.display(), e);
            Err(FileIoCompletionCode::Error)
        }
    }
}
