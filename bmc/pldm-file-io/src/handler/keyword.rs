// Licensed under the Apache-2.0 license

use super::{read_file, FileHandler, HandlerResult, TransferContext};
use crate::config::FileIoConfig;
use crate::dma::Direction;
use std::path::PathBuf;

/// VPD keyword data the host reads.
pub struct KeywordHandler {
    file_handle: u32,
    path: PathBuf,
}

impl KeywordHandler {
    pub fn new(file_handle: u32, config: &FileIoConfig) -> Self {
        Self {
            file_handle,
            path: config
                .root
                .join("vpd")
                .join("keyword")
                .join(format!("{file_handle:08X}")),
        }
    }
}

impl FileHandler for KeywordHandler {
    fn file_handle(&self) -> u32 {
        self.file_handle
    }

    fn read(&mut self, offset: u32, length: u32, out: &mut Vec<u8>) -> HandlerResult<u32> {
        read_file(&self.path, offset, length, out)
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
}
