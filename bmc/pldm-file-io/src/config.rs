// Licensed under the Apache-2.0 license

use crate::dma::DEFAULT_MAX_DMA_CHUNK_SIZE;
use crate::error::ConfigError;
use crate::transport::MAX_PLDM_PAYLOAD_SIZE;
use pldm_common::message::file_io::rw_file_by_type::ReadWriteFileByTypeResponseFixed;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_FILE_IO_ROOT: &str = "/var/lib/pldm";
pub const DEFAULT_DMA_TIMEOUT_MS: u64 = 10_000;

/// Largest ReadFileByType payload that still fits a single transport packet.
pub const DEFAULT_MAX_READ_PAYLOAD: u32 =
    (MAX_PLDM_PAYLOAD_SIZE - core::mem::size_of::<ReadWriteFileByTypeResponseFixed>()) as u32;

/// Runtime options of the file I/O responder.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// root = "/tmp/pldm"
/// dma_timeout_ms = 2000
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FileIoConfig {
    /// Directory under which every file type keeps its files.
    pub root: PathBuf,
    /// Deadline for one DMA verb, from submission to the last chunk.
    pub dma_timeout_ms: u64,
    /// Largest single DMA transfer the platform accepts.
    pub max_dma_chunk_size: u32,
    /// Cap applied to the length of a ReadFileByType request.
    pub max_read_payload: u32,
}

impl Default for FileIoConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_FILE_IO_ROOT),
            dma_timeout_ms: DEFAULT_DMA_TIMEOUT_MS,
            max_dma_chunk_size: DEFAULT_MAX_DMA_CHUNK_SIZE,
            max_read_payload: DEFAULT_MAX_READ_PAYLOAD,
        }
    }
}

impl FileIoConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: FileIoConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_dma_chunk_size == 0 {
            return Err(ConfigError::Invalid("max_dma_chunk_size must be non-zero"));
        }
        if self.dma_timeout_ms == 0 {
            return Err(ConfigError::Invalid("dma_timeout_ms must be non-zero"));
        }
        if self.max_read_payload == 0 || self.max_read_payload > DEFAULT_MAX_READ_PAYLOAD {
            return Err(ConfigError::Invalid("max_read_payload out of range"));
        }
        Ok(())
    }

    pub fn dma_timeout(&self) -> Duration {
        Duration::from_millis(self.dma_timeout_ms)
    }
}
