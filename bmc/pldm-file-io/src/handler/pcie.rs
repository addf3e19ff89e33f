// Licensed under the Apache-2.0 license

use super::{write_file, FileHandler, HandlerResult, TransferContext};
use crate::config::FileIoConfig;
use crate::dma::Direction;
use log::info;
use pldm_common::protocol::file_io::FileType;
use std::path::PathBuf;

/// PCIe topology and cable information pushed by the host.
pub struct PcieInfoHandler {
    file_handle: u32,
    file_type: FileType,
    path: PathBuf,
}

impl PcieInfoHandler {
    pub fn new(file_handle: u32, file_type: FileType, config: &FileIoConfig) -> Self {
        let name = if file_type == FileType::CableInfo {
            "cable_info"
        } else {
            "topology"
        };
        Self {
            file_handle,
            file_type,
            path: config.root.join("pcie").join(name),
        }
    }
}

impl FileHandler for PcieInfoHandler {
    fn file_handle(&self) -> u32 {
        self.file_handle
    }

    fn write(&mut self, data: &[u8], offset: u32) -> HandlerResult<u32> {
        write_file(&self.path, data, offset)
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

    fn file_ack(&mut self, _file_status: u8) -> HandlerResult<()> {
        Ok(())
    }

    // Notification only; the data follows in a write.
    fn new_file_available(&mut self, length: u64) -> HandlerResult<()> {
        info!("Host announced {:?} of {} bytes", self.file_type, length);
        Ok(())
    }

    fn new_file_available_with_meta_data(
        &mut self,
        length: u64,
        _meta_data: [u32; 4],
    ) -> HandlerResult<()> {
        self.new_file_available(length)
    }

    fn post_data_transfer_callback(&mut self, is_write: bool) {
        if is_write {
            info!("Received {:?} from host", self.file_type);
        }
    }
}
