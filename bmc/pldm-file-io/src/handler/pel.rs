// Licensed under the Apache-2.0 license

use super::{read_file, remove_file, write_file, FileHandler, HandlerResult, TransferContext};
use crate::config::FileIoConfig;
use crate::dma::Direction;
use log::info;
use std::path::PathBuf;

/// Platform event logs exchanged with the host.
pub struct PelHandler {
    file_handle: u32,
    path: PathBuf,
}

impl PelHandler {
    pub fn new(file_handle: u32, config: &FileIoConfig) -> Self {
        Self {
            file_handle,
            path: config.root.join("pel").join(format!("{file_handle:08X}")),
        }
    }
}

impl FileHandler for PelHandler {
    fn file_handle(&self) -> u32 {
        self.file_handle
    }

    fn read(&mut self, offset: u32, length: u32, out: &mut Vec<u8>) -> HandlerResult<u32> {
        read_file(&self.path, offset, length, out)
    }

    fn write(&mut self, data: &[u8], offset: u32) -> HandlerResult<u32> {
        write_file(&self.path, data, offset)
    }

    fn read_into_memory(
        &mut self,
        offset: u32,
        length: u32,
        address: u64,
        ctx: &mut TransferContext<'_>,
    ) -> HandlerResult<()> {
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
        ctx.transfer_file(&self.path, Direction::FromHost, offset, length, address)
            .map(|_| ())
    }

    fn file_ack(&mut self, file_status: u8) -> HandlerResult<()> {
        info!(
            "Host acknowledged PEL {:#x} with status {}",
            self.file_handle, file_status
        );
        remove_file(&self.path)
    }

    fn post_data_transfer_callback(&mut self, is_write: bool) {
        if is_write {
            info!("Received PEL {:#x} from host", self.file_handle);
        }
    }
}
