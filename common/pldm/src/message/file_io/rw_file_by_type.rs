// Licensed under the Apache-2.0 license

use crate::codec::{PldmCodec, PldmCodecError};
use crate::protocol::base::{
    InstanceId, PldmMsgHeader, PldmMsgType, PldmSupportedType, PLDM_MSG_HEADER_LEN,
};
use crate::protocol::file_io::FileIoCmd;
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// Fixed part of ReadFileByType / WriteFileByType requests. A WriteFileByType
/// request carries `length` bytes of file data right after this structure.
#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct ReadWriteFileByTypeRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub file_type: u16,
    pub file_handle: u32,
    pub offset: u32,
    pub length: u32,
}

impl ReadWriteFileByTypeRequest {
    pub fn new(
        instance_id: InstanceId,
        msg_type: PldmMsgType,
        cmd: FileIoCmd,
        file_type: u16,
        file_handle: u32,
        offset: u32,
        length: u32,
    ) -> Self {
        ReadWriteFileByTypeRequest {
            hdr: PldmMsgHeader::new(instance_id, msg_type, PldmSupportedType::Oem, cmd as u8),
            file_type,
            file_handle,
            offset,
            length,
        }
    }
}

/// Splits a WriteFileByType request into its fixed part and the file data.
/// The data slice is checked against the `length` field.
pub fn decode_write_file_by_type(
    buffer: &[u8],
) -> Result<(ReadWriteFileByTypeRequest, &[u8]), PldmCodecError> {
    let fixed = ReadWriteFileByTypeRequest::decode(buffer)?;
    let start = core::mem::size_of::<ReadWriteFileByTypeRequest>();
    let end = start + fixed.length as usize;
    if buffer.len() < end {
        return Err(PldmCodecError::BufferTooShort);
    }
    Ok((fixed, &buffer[start..end]))
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct ReadWriteFileByTypeResponseFixed {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub length: u32,
}

impl ReadWriteFileByTypeResponseFixed {
    pub fn new(instance_id: InstanceId, cmd: FileIoCmd, completion_code: u8, length: u32) -> Self {
        ReadWriteFileByTypeResponseFixed {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmSupportedType::Oem,
                cmd as u8,
            ),
            completion_code,
            length,
        }
    }
}

/// ReadFileByType response: fixed part followed by the file data read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadFileByTypeResponse<'a> {
    pub fixed: ReadWriteFileByTypeResponseFixed,
    pub data: &'a [u8],
}

impl<'a> ReadFileByTypeResponse<'a> {
    pub fn new(instance_id: InstanceId, completion_code: u8, data: &'a [u8]) -> Self {
        ReadFileByTypeResponse {
            fixed: ReadWriteFileByTypeResponseFixed::new(
                instance_id,
                FileIoCmd::ReadFileByType,
                completion_code,
                data.len() as u32,
            ),
            data,
        }
    }

    pub fn codec_size_in_bytes(&self) -> usize {
        core::mem::size_of::<ReadWriteFileByTypeResponseFixed>() + self.data.len()
    }
}

impl PldmCodec for ReadFileByTypeResponse<'_> {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, PldmCodecError> {
        if buffer.len() < self.codec_size_in_bytes() {
            return Err(PldmCodecError::BufferTooShort);
        }
        let bytes = core::mem::size_of::<ReadWriteFileByTypeResponseFixed>();
        self.fixed
            .write_to(&mut buffer[..bytes])
            .map_err(|_| PldmCodecError::BufferTooShort)?;
        buffer[bytes..bytes + self.data.len()].copy_from_slice(self.data);
        Ok(bytes + self.data.len())
    }

    // The data borrows from the caller's buffer; use the fixed part's decode and slice the data directly.
    fn decode(_buffer: &[u8]) -> Result<Self, PldmCodecError> {
        Err(PldmCodecError::Unsupported)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_write_request_with_data() {
        let request = ReadWriteFileByTypeRequest::new(
            1,
            PldmMsgType::Request,
            FileIoCmd::WriteFileByType,
            0x0A,
            7,
            0,
            4,
        );
        let mut buffer = [0u8; 64];
        let bytes = request.encode(&mut buffer).unwrap();
        buffer[bytes..bytes + 4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let (fixed, data) = decode_write_file_by_type(&buffer[..bytes + 4]).unwrap();
        assert_eq!(fixed, request);
        assert_eq!(data, &[0xDE, 0xAD, 0xBE, 0xEF]);

        // Declared length larger than the carried data
        assert_eq!(
            decode_write_file_by_type(&buffer[..bytes + 2]),
            Err(PldmCodecError::BufferTooShort)
        );
    }

    #[test]
    fn test_read_response_encode() {
        let data = [1u8, 2, 3];
        let response = ReadFileByTypeResponse::new(9, 0, &data);
        let mut buffer = [0u8; 16];
        let bytes = response.encode(&mut buffer).unwrap();
        assert_eq!(bytes, 11);
        let fixed = ReadWriteFileByTypeResponseFixed::decode(&buffer[..bytes]).unwrap();
        assert_eq!({ fixed.length }, 3);
        assert_eq!(&buffer[8..11], &data);

        let mut small = [0u8; 10];
        assert!(response.encode(&mut small).is_err());
        assert!(ReadFileByTypeResponse::decode(&buffer).is_err());
    }
}
