// Licensed under the Apache-2.0 license

pub mod file_ack;
pub mod new_file;
pub mod rw_file_by_type;
pub mod rw_file_by_type_memory;

use crate::protocol::base::{
    InstanceId, PldmMsgHeader, PldmMsgType, PldmSupportedType, PLDM_MSG_HEADER_LEN,
};
use crate::protocol::file_io::FileIoCmd;
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// Response carrying only a completion code. Used by FileAck, NewFileAvailable
/// and their metadata variants.
#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct FileIoCompletionResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
}

impl FileIoCompletionResponse {
    pub fn new(instance_id: InstanceId, cmd: FileIoCmd, completion_code: u8) -> Self {
        FileIoCompletionResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmSupportedType::Oem,
                cmd as u8,
            ),
            completion_code,
        }
    }
}
