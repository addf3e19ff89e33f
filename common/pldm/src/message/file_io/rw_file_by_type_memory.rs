// Licensed under the Apache-2.0 license

use crate::protocol::base::{
    InstanceId, PldmMsgHeader, PldmMsgType, PldmSupportedType, PLDM_MSG_HEADER_LEN,
};
use crate::protocol::file_io::FileIoCmd;
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// ReadFileByTypeIntoMemory / WriteFileByTypeFromMemory request. Both commands
/// share the same layout; the command code in the header selects the direction.
#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct ReadWriteFileByTypeMemoryRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub file_type: u16,
    pub file_handle: u32,
    pub offset: u32,
    pub length: u32,
    pub address: u64,
}

impl ReadWriteFileByTypeMemoryRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instance_id: InstanceId,
        msg_type: PldmMsgType,
        cmd: FileIoCmd,
        file_type: u16,
        file_handle: u32,
        offset: u32,
        length: u32,
        address: u64,
    ) -> Self {
        ReadWriteFileByTypeMemoryRequest {
            hdr: PldmMsgHeader::new(instance_id, msg_type, PldmSupportedType::Oem, cmd as u8),
            file_type,
            file_handle,
            offset,
            length,
            address,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct ReadWriteFileByTypeMemoryResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub length: u32,
}

impl ReadWriteFileByTypeMemoryResponse {
    pub fn new(instance_id: InstanceId, cmd: FileIoCmd, completion_code: u8, length: u32) -> Self {
        ReadWriteFileByTypeMemoryResponse {
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
