// Licensed under the Apache-2.0 license

use crate::transport::PldmTransportError;
use pldm_common::codec::PldmCodecError;
use thiserror::Error;

pub type FileIoResult<T> = Result<T, FileIoError>;

/// Non-protocol failures of the responder. Protocol outcomes are reported to
/// the requester as completion codes and never surface here.
#[derive(Error, Debug)]
pub enum FileIoError {
    #[error("Unrecognized file type {0:#06x}")]
    UnrecognizedFileType(u16),
    #[error("Codec error: {0:?}")]
    Codec(PldmCodecError),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse configuration")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Transport error: {0:?}")]
    Transport(PldmTransportError),
}
