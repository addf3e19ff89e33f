// Licensed under the Apache-2.0 license

use crate::protocol::base::{
    InstanceId, PldmMsgHeader, PldmMsgType, PldmSupportedType, PLDM_MSG_HEADER_LEN,
};
use crate::protocol::file_io::FileIoCmd;
use zerocopy::{FromBytes, Immutable, IntoBytes};

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct NewFileAvailableRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub file_type: u16,
    pub file_handle: u32,
    pub length: u64,
}

impl NewFileAvailableRequest {
    pub fn new(
        instance_id: InstanceId,
        msg_type: PldmMsgType,
        file_type: u16,
        file_handle: u32,
        length: u64,
    ) -> Self {
        NewFileAvailableRequest {
            hdr: PldmMsgHeader::new(
                instance_id,
                msg_type,
                PldmSupportedType::Oem,
                FileIoCmd::NewFileAvailable as u8,
            ),
            file_type,
            file_handle,
            length,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct NewFileAvailableWithMetaDataRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub file_type: u16,
    pub file_handle: u32,
    pub length: u64,
    pub meta_data_value1: u32,
    pub meta_data_value2: u32,
    pub meta_data_value3: u32,
    pub meta_data_value4: u32,
}

impl NewFileAvailableWithMetaDataRequest {
    pub fn new(
        instance_id: InstanceId,
        msg_type: PldmMsgType,
        file_type: u16,
        file_handle: u32,
        length: u64,
        meta_data: [u32; 4],
    ) -> Self {
        NewFileAvailableWithMetaDataRequest {
            hdr: PldmMsgHeader::new(
                instance_id,
                msg_type,
                PldmSupportedType::Oem,
                FileIoCmd::NewFileAvailableWithMetaData as u8,
            ),
            file_type,
            file_handle,
            length,
            meta_data_value1: meta_data[0],
            meta_data_value2: meta_data[1],
            meta_data_value3: meta_data[2],
            meta_data_value4: meta_data[3],
        }
    }

    pub fn meta_data(&self) -> [u32; 4] {
        [
            self.meta_data_value1,
            self.meta_data_value2,
            self.meta_data_value3,
            self.meta_data_value4,
        ]
    }
}
