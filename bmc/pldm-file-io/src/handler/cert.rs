// Licensed under the Apache-2.0 license

use super::{read_file, write_file, FileHandler, HandlerResult, TransferContext};
use crate::config::FileIoConfig;
use crate::dma::Direction;
use log::info;
use pldm_common::protocol::file_io::{FileIoCompletionCode, FileType};
use std::path::PathBuf;

/// Certificate signing requests read by the host, and the signed and root
/// certificates it sends back.
pub struct CertHandler {
    file_handle: u32,
    file_type: FileType,
    path: PathBuf,
}

impl CertHandler {
    pub fn new(file_handle: u32, file_type: FileType, config: &FileIoConfig) -> Self {
        let dir = match file_type {
            FileType::CertSigningRequest => "csr",
            FileType::RootCert => "root",
            _ => "signed",
        };
        Self {
            file_handle,
            file_type,
            path: config
                .root
                .join("cert")
                .join(dir)
                .join(format!("{file_handle:08X}")),
        }
    }

    fn is_csr(&self) -> bool {
        self.file_type == FileType::CertSigningRequest
    }
}

impl FileHandler for CertHandler {
    fn file_handle(&self) -> u32 {
        self.file_handle
    }

    fn read(&mut self, offset: u32, length: u32, out: &mut Vec<u8>) -> HandlerResult<u32> {
        if !self.is_csr() {
            return Err(FileIoCompletionCode::UnsupportedPldmCmd);
        }
        read_file(&self.path, offset, length, out)
    }

    fn write(&mut self, data: &[u8], offset: u32) -> HandlerResult<u32> {
        if self.is_csr() {
            return Err(FileIoCompletionCode::UnsupportedPldmCmd);
        }
        write_file(&self.path, data, offset)
    }

    fn read_into_memory(
        &mut self,
        offset: u32,
        length: u32,
        address: u64,
        ctx: &mut TransferContext<'_>,
    ) -> HandlerResult<()> {
        if !self.is_csr() {
            return Err(FileIoCompletionCode::UnsupportedPldmCmd);
        }
        ctx.transfer_file(&self.path, Direction::ToHost, offset, length, address)
            .map(|_| ())
    }

    fn write_from_memory(
        &mut self,
        offset: u32,
        length: u32,
        address: u64,
        ctx: &mut TransferContext<'_>,
    ) -> HandlerResult<()> {
        if self.is_csr() {
            return Err(FileIoCompletionCode::UnsupportedPldmCmd);
        }
        ctx.transfer_file(&self.path, Direction::FromHost, offset, length, address)
            .map(|_| ())
    }

    // Notification only; the certificate follows in a write.
    fn new_file_available(&mut self, length: u64) -> HandlerResult<()> {
        info!(
            "Host announced {:?} {:#x} of {} bytes",
            self.file_type, self.file_handle, length
        );
        Ok(())
    }

    fn post_data_transfer_callback(&mut self, is_write: bool) {
        if is_write {
            info!("Received {:?} {:#x}", self.file_type, self.file_handle);
        }
    }
}
