// Licensed under the Apache-2.0 license

use super::{remove_file, FileHandler, HandlerResult, TransferContext};
use crate::config::FileIoConfig;
use crate::dma::Direction;
use log::{info, warn};
use pldm_common::protocol::file_io::{FileIoCompletionCode, FileType};
use std::path::PathBuf;

fn dump_dir(file_type: FileType) -> &'static str {
    match file_type {
        FileType::ResourceDumpParms => "resource_parms",
        FileType::ResourceDump => "resource",
        FileType::BmcDump => "bmc",
        FileType::SbeDump => "sbe",
        FileType::HostbootDump => "hostboot",
        FileType::HardwareDump => "hardware",
        _ => "system",
    }
}

/// Dumps offloaded by the host, and the parameters of resource dumps the
/// host reads back.
pub struct DumpHandler {
    file_handle: u32,
    file_type: FileType,
    path: PathBuf,
}

impl DumpHandler {
    pub fn new(file_handle: u32, file_type: FileType, config: &FileIoConfig) -> Self {
        Self {
            file_handle,
            file_type,
            path: config
                .root
                .join("dump")
                .join(dump_dir(file_type))
                .join(format!("{file_handle:08X}")),
        }
    }

    /// Notification only; the dump arrives through a later DMA write.
    fn announce(&self, length: u64) -> HandlerResult<()> {
        info!(
            "Host announced {:?} {:#x} of {} bytes",
            self.file_type, self.file_handle, length
        );
        Ok(())
    }

    fn acknowledge(&mut self, file_status: u8) -> HandlerResult<()> {
        if file_status != 0 {
            warn!(
                "Host reported status {} for {:?} {:#x}",
                file_status, self.file_type, self.file_handle
            );
        }
        remove_file(&self.path)
    }
}

impl FileHandler for DumpHandler {
    fn file_handle(&self) -> u32 {
        self.file_handle
    }

    fn read_into_memory(
        &mut self,
        offset: u32,
        length: u32,
        address: u64,
        ctx: &mut TransferContext<'_>,
    ) -> HandlerResult<()> {
        if self.file_type != FileType::ResourceDumpParms {
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
        ctx.transfer_file(&self.path, Direction::FromHost, offset, length, address)
            .map(|_| ())
    }

    fn file_ack(&mut self, file_status: u8) -> HandlerResult<()> {
        self.acknowledge(file_status)
    }

    fn file_ack_with_meta_data(&mut self, file_status: u8, _meta_data: [u32; 4]) -> HandlerResult<()> {
        self.acknowledge(file_status)
    }

    fn new_file_available(&mut self, length: u64) -> HandlerResult<()> {
        self.announce(length)
    }

    fn new_file_available_with_meta_data(
        &mut self,
        length: u64,
        meta_data: [u32; 4],
    ) -> HandlerResult<()> {
        info!("Dump metadata {:x?}", meta_data);
        self.announce(length)
    }

    fn post_data_transfer_callback(&mut self, is_write: bool) {
        if is_write {
            info!("Stored {:?} {:#x}", self.file_type, self.file_handle);
        }
    }
}
