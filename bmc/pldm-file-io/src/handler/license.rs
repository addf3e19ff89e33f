// Licensed under the Apache-2.0 license

use super::{read_file, write_file, FileHandler, HandlerResult, TransferContext};
use crate::config::FileIoConfig;
use crate::dma::Direction;
use log::info;
use pldm_common::protocol::file_io::{FileIoCompletionCode, FileType};
use std::path::PathBuf;

/// Capacity-on-demand license keys (host to BMC) and the licensed resource
/// list (BMC to host).
pub struct LicenseHandler {
    file_handle: u32,
    is_key: bool,
    path: PathBuf,
}

impl LicenseHandler {
    pub fn new(file_handle: u32, file_type: FileType, config: &FileIoConfig) -> Self {
        let is_key = file_type == FileType::CodLicenseKey;
        let name = if is_key { "key" } else { "resources" };
        Self {
            file_handle,
            is_key,
            path: config.root.join("license").join(name),
        }
    }
}

impl FileHandler for LicenseHandler {
    fn file_handle(&self) -> u32 {
        self.file_handle
    }

    fn read(&mut self, offset: u32, length: u32, out: &mut Vec<u8>) -> HandlerResult<u32> {
        if self.is_key {
            return Err(FileIoCompletionCode::UnsupportedPldmCmd);
        }
        read_file(&self.path, offset, length, out)
    }

    fn write(&mut self, data: &[u8], offset: u32) -> HandlerResult<u32> {
        if !self.is_key {
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
        if self.is_key {
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
        if !self.is_key {
            return Err(FileIoCompletionCode::UnsupportedPldmCmd);
        }
        ctx.transfer_file(&self.path, Direction::FromHost, offset, length, address)
            .map(|_| ())
    }

    fn file_ack(&mut self, file_status: u8) -> HandlerResult<()> {
        info!("License file acknowledged with status {}", file_status);
        Ok(())
    }

    fn post_data_transfer_callback(&mut self, is_write: bool) {
        if is_write {
            info!("License key received from host");
        }
    }
}
