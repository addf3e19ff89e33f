// Licensed under the Apache-2.0 license

use super::{write_file, FileHandler, HandlerResult};
use crate::config::FileIoConfig;
use log::debug;
use std::path::PathBuf;

/// Boot progress codes posted by the host with WriteFileByType.
pub struct ProgressCodeHandler {
    file_handle: u32,
    path: PathBuf,
}

impl ProgressCodeHandler {
    pub fn new(file_handle: u32, config: &FileIoConfig) -> Self {
        Self {
            file_handle,
            path: config
                .root
                .join("progress_src")
                .join(format!("{file_handle:08X}")),
        }
    }
}

impl FileHandler for ProgressCodeHandler {
    fn file_handle(&self) -> u32 {
        self.file_handle
    }

    fn write(&mut self, data: &[u8], offset: u32) -> HandlerResult<u32> {
        debug!("Progress code {:x?}", data);
        write_file(&self.path, data, offset)
    }
}
