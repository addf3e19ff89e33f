// Licensed under the Apache-2.0 license

use super::{read_file, remove_file, FileHandler, HandlerResult, TransferContext};
use crate::config::FileIoConfig;
use crate::dma::Direction;
use crate::error::FileIoResult;
use log::{error, info};
use pldm_common::protocol::file_io::FileIoCompletionCode;
use std::fs;
use std::path::{Path, PathBuf};

const CHAP_DIR: &str = "chap";
const CHAP_SECRET_FILE: &str = "chapsecret";

fn chap_dir(config: &FileIoConfig) -> PathBuf {
    config.root.join(CHAP_DIR)
}

/// Writes the CHAP secret for the host to fetch. Nothing is written unless
/// both `name` and `secret` are non-empty. Returns whether the file was
/// written.
pub fn store_chap_data(config: &FileIoConfig, name: &str, secret: &str) -> FileIoResult<bool> {
    if name.is_empty() || secret.is_empty() {
        return Ok(false);
    }
    let dir = chap_dir(config);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(CHAP_SECRET_FILE), secret.as_bytes())?;
    info!("CHAP secret for {} available to host", name);
    Ok(true)
}

/// One-shot CHAP secret: the host reads it once and the file is gone.
pub struct ChapHandler {
    file_handle: u32,
    dir: PathBuf,
    path: PathBuf,
}

impl ChapHandler {
    pub fn new(file_handle: u32, config: &FileIoConfig) -> Self {
        let dir = chap_dir(config);
        Self {
            file_handle,
            path: dir.join(CHAP_SECRET_FILE),
            dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn discard_secret(&self) -> HandlerResult<()> {
        remove_file(&self.path).map_err(|_| FileIoCompletionCode::Error)
    }

    fn check_dir(&self) -> HandlerResult<()> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            error!("CHAP directory {} does not exist", self.dir.display());
            Err(FileIoCompletionCode::Error)
        }
    }
}

impl FileHandler for ChapHandler {
    fn file_handle(&self) -> u32 {
        self.file_handle
    }

    fn read(&mut self, offset: u32, length: u32, out: &mut Vec<u8>) -> HandlerResult<u32> {
        self.check_dir()?;
        let result = read_file(&self.path, offset, length, out);
        // The secret is handed out at most once, whether or not the read worked.
        self.discard_secret()?;
        result.map_err(|rc| {
            error!("Failed to read CHAP secret: {:?}", rc);
            FileIoCompletionCode::Error
        })
    }

    fn read_into_memory(
        &mut self,
        offset: u32,
        length: u32,
        address: u64,
        ctx: &mut TransferContext<'_>,
    ) -> HandlerResult<()> {
        self.check_dir()?;
        let result = ctx.transfer_file(&self.path, Direction::ToHost, offset, length, address);
        // A submitted engine already holds an open descriptor.
        self.discard_secret()?;
        result.map(|_| ()).map_err(|rc| {
            error!("Failed to transfer CHAP secret: {:?}", rc);
            FileIoCompletionCode::Error
        })
    }

    fn file_ack_with_meta_data(&mut self, _file_status: u8, _meta_data: [u32; 4]) -> HandlerResult<()> {
        Ok(())
    }
}
