// Licensed under the Apache-2.0 license

use crate::error::PldmError;
use core::convert::TryFrom;

/// OEM file I/O commands carried under `PldmSupportedType::Oem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileIoCmd {
    ReadFileByTypeIntoMemory = 0x08,
    WriteFileByTypeFromMemory = 0x09,
    NewFileAvailable = 0x0A,
    ReadFileByType = 0x0B,
    WriteFileByType = 0x0C,
    FileAck = 0x0D,
    NewFileAvailableWithMetaData = 0x0E,
    FileAckWithMetaData = 0x0F,
}

impl TryFrom<u8> for FileIoCmd {
    type Error = PldmError;

    fn try_from(value: u8) -> Result<Self, PldmError> {
        match value {
            0x08 => Ok(FileIoCmd::ReadFileByTypeIntoMemory),
            0x09 => Ok(FileIoCmd::WriteFileByTypeFromMemory),
            0x0A => Ok(FileIoCmd::NewFileAvailable),
            0x0B => Ok(FileIoCmd::ReadFileByType),
            0x0C => Ok(FileIoCmd::WriteFileByType),
            0x0D => Ok(FileIoCmd::FileAck),
            0x0E => Ok(FileIoCmd::NewFileAvailableWithMetaData),
            0x0F => Ok(FileIoCmd::FileAckWithMetaData),
            _ => Err(PldmError::UnsupportedCmd),
        }
    }
}

/// Completion codes surfaced by the file I/O responder. The low values are
/// shared with the base completion codes, the 0x8x range is file I/O specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileIoCompletionCode {
    Success = 0x00,
    Error = 0x01,
    InvalidData = 0x02,
    InvalidLength = 0x03,
    UnsupportedPldmCmd = 0x05,
    InvalidPldmType = 0x20,
    InvalidFileHandle = 0x86,
    DataOutOfRange = 0x87,
    InvalidFileType = 0x89,
}

impl TryFrom<u8> for FileIoCompletionCode {
    type Error = PldmError;

    fn try_from(value: u8) -> Result<Self, PldmError> {
        match value {
            0x00 => Ok(FileIoCompletionCode::Success),
            0x01 => Ok(FileIoCompletionCode::Error),
            0x02 => Ok(FileIoCompletionCode::InvalidData),
            0x03 => Ok(FileIoCompletionCode::InvalidLength),
            0x05 => Ok(FileIoCompletionCode::UnsupportedPldmCmd),
            0x20 => Ok(FileIoCompletionCode::InvalidPldmType),
            0x86 => Ok(FileIoCompletionCode::InvalidFileHandle),
            0x87 => Ok(FileIoCompletionCode::DataOutOfRange),
            0x89 => Ok(FileIoCompletionCode::InvalidFileType),
            _ => Err(PldmError::InvalidCompletionCode),
        }
    }
}

/// Numeric file-type codes understood by the responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FileType {
    Pel = 0x00,
    LidPerm = 0x01,
    LidTemp = 0x02,
    Dump = 0x03,
    CertSigningRequest = 0x04,
    SignedCert = 0x05,
    RootCert = 0x06,
    LidMarker = 0x07,
    ResourceDumpParms = 0x08,
    ResourceDump = 0x09,
    ProgressSrc = 0x0A,
    CodLicenseKey = 0x0D,
    CodLicensedResources = 0x0E,
    BmcDump = 0x0F,
    SbeDump = 0x10,
    HostbootDump = 0x11,
    HardwareDump = 0x12,
    LidRunning = 0x13,
    PcieTopology = 0x14,
    CableInfo = 0x15,
    PspdVpdPddKeyword = 0x16,
    ChapData = 0x17,
}

impl TryFrom<u16> for FileType {
    type Error = PldmError;

    fn try_from(value: u16) -> Result<Self, PldmError> {
        match value {
            0x00 => Ok(FileType::Pel),
            0x01 => Ok(FileType::LidPerm),
            0x02 => Ok(FileType::LidTemp),
            0x03 => Ok(FileType::Dump),
            0x04 => Ok(FileType::CertSigningRequest),
            0x05 => Ok(FileType::SignedCert),
            0x06 => Ok(FileType::RootCert),
            0x07 => Ok(FileType::LidMarker),
            0x08 => Ok(FileType::ResourceDumpParms),
            0x09 => Ok(FileType::ResourceDump),
            0x0A => Ok(FileType::ProgressSrc),
            0x0D => Ok(FileType::CodLicenseKey),
            0x0E => Ok(FileType::CodLicensedResources),
            0x0F => Ok(FileType::BmcDump),
            0x10 => Ok(FileType::SbeDump),
            0x11 => Ok(FileType::HostbootDump),
            0x12 => Ok(FileType::HardwareDump),
            0x13 => Ok(FileType::LidRunning),
            0x14 => Ok(FileType::PcieTopology),
            0x15 => Ok(FileType::CableInfo),
            0x16 => Ok(FileType::PspdVpdPddKeyword),
            0x17 => Ok(FileType::ChapData),
            _ => Err(PldmError::InvalidFileType),
        }
    }
}
