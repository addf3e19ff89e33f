// Licensed under the Apache-2.0 license

use super::{read_file, write_file, FileHandler, HandlerResult, TransferContext};
use crate::config::FileIoConfig;
use crate::dma::Direction;
use log::info;
use pldm_common::protocol::file_io::{FileIoCompletionCode, FileType};
use std::path::PathBuf;

/// Which image store a LID lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LidKind {
    Perm,
    Temp,
    Marker,
    Running,
}

impl LidKind {
    fn dir(&self) -> &'static str {
        match self {
            LidKind::Perm => "perm",
            LidKind::Temp => "temp",
            LidKind::Marker => "marker",
            LidKind::Running => "running",
        }
    }

    fn is_writable(&self) -> bool {
        matches!(self, LidKind::Temp | LidKind::Marker)
    }

    fn is_readable(&self) -> bool {
        !matches!(self, LidKind::Marker)
    }
}

/// Host firmware load identifiers.
pub struct LidHandler {
    file_handle: u32,
    kind: LidKind,
    path: PathBuf,
}

impl LidHandler {
    /// `file_type` must be one of the LID codes; anything else is treated as
    /// the permanent side.
    pub fn new(file_handle: u32, file_type: FileType, config: &FileIoConfig) -> Self {
        let kind = match file_type {
            FileType::LidTemp => LidKind::Temp,
            FileType::LidMarker => LidKind::Marker,
            FileType::LidRunning => LidKind::Running,
            _ => LidKind::Perm,
        };
        Self {
            file_handle,
            kind,
            path: config
                .root
                .join("lid")
                .join(kind.dir())
                .join(format!("{file_handle:08X}.lid")),
        }
    }

    pub fn kind(&self) -> LidKind {
        self.kind
    }

    fn require(&self, allowed: bool) -> HandlerResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(FileIoCompletionCode::UnsupportedPldmCmd)
        }
    }
}

impl FileHandler for LidHandler {
    fn file_handle(&self) -> u32 {
        self.file_handle
    }

    fn read(&mut self, offset: u32, length: u32, out: &mut Vec<u8>) -> HandlerResult<u32> {
        self.require(self.kind.is_readable())?;
        read_file(&self.path, offset, length, out)
    }

    fn write(&mut self, data: &[u8], offset: u32) -> HandlerResult<u32> {
        self.require(self.kind.is_writable())?;
        write_file(&self.path, data, offset)
    }

    fn read_into_memory(
        &mut self,
        offset: u32,
        length: u32,
        address: u64,
        ctx: &mut TransferContext<'_>,
    ) -> HandlerResult<()> {
        self.require(self.kind.is_readable())?;
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
        self.require(self.kind.is_writable())?;
        ctx.transfer_file(&self.path, Direction::FromHost, offset, length, address)
            .map(|_| ())
    }

    fn post_data_transfer_callback(&mut self, is_write: bool) {
        if is_write && self.kind == LidKind::Marker {
            info!("LID marker {:08X} written by host", self.file_handle);
        }
    }
}
