// Licensed under the Apache-2.0 license

use crate::config::FileIoConfig;
use crate::dma::engine::InFlightTransfers;
use crate::dma::DmaProvider;
use crate::error::{FileIoError, FileIoResult};
use crate::event_loop::EventLoop;
use crate::handler::{FileHandler, TransferContext};
use crate::registry::FileTypeRegistry;
use crate::response::{encode_memory_response, ResponseContext, ResponseKey, ResponseSender};
use crate::transport::{EndpointId, MAX_PLDM_PAYLOAD_SIZE};
use log::{debug, error, warn};
use pldm_common::codec::{PldmCodec, PldmCodecError};
use pldm_common::message::file_io::file_ack::{FileAckRequest, FileAckWithMetaDataRequest};
use pldm_common::message::file_io::new_file::{
    NewFileAvailableRequest, NewFileAvailableWithMetaDataRequest,
};
use pldm_common::message::file_io::rw_file_by_type::{
    decode_write_file_by_type, ReadFileByTypeResponse, ReadWriteFileByTypeRequest,
    ReadWriteFileByTypeResponseFixed,
};
use pldm_common::message::file_io::rw_file_by_type_memory::ReadWriteFileByTypeMemoryRequest;
use pldm_common::message::file_io::FileIoCompletionResponse;
use pldm_common::protocol::base::{
    InstanceId, PldmFailureResponse, PldmMsgHeader, PldmSupportedType, PLDM_MSG_HEADER_LEN,
};
use pldm_common::protocol::file_io::{FileIoCmd, FileIoCompletionCode};
use std::rc::Rc;

type Header = PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>;

fn encode_to_vec<P: PldmCodec>(message: &P) -> FileIoResult<Vec<u8>> {
    let mut buffer = [0u8; MAX_PLDM_PAYLOAD_SIZE];
    let size = message.encode(&mut buffer).map_err(FileIoError::Codec)?;
    Ok(buffer[..size].to_vec())
}

fn generate_failure_response(
    header: &Header,
    completion_code: FileIoCompletionCode,
) -> FileIoResult<Vec<u8>> {
    encode_to_vec(&PldmFailureResponse::for_request(header, completion_code as u8))
}

fn completion_response(
    instance_id: InstanceId,
    cmd: FileIoCmd,
    result: Result<(), FileIoCompletionCode>,
) -> FileIoResult<Vec<u8>> {
    let completion_code = match result {
        Ok(()) => FileIoCompletionCode::Success,
        Err(rc) => rc,
    };
    encode_to_vec(&FileIoCompletionResponse::new(
        instance_id,
        cmd,
        completion_code as u8,
    ))
}

/// Dispatches OEM file I/O requests to file handlers.
pub struct FileIoResponder {
    registry: FileTypeRegistry,
    config: Rc<FileIoConfig>,
    event_loop: EventLoop,
    dma: Rc<dyn DmaProvider>,
    sender: Option<Rc<dyn ResponseSender>>,
    in_flight: Rc<InFlightTransfers>,
}

impl FileIoResponder {
    /// `sender` carries the responses of DMA verbs, which finish after
    /// `handle_request` has returned. Without one they are dropped.
    pub fn new(
        config: FileIoConfig,
        event_loop: EventLoop,
        dma: Rc<dyn DmaProvider>,
        sender: Option<Rc<dyn ResponseSender>>,
    ) -> Self {
        let config = Rc::new(config);
        Self {
            registry: FileTypeRegistry::new(config.clone()),
            config,
            event_loop,
            dma,
            sender,
            in_flight: InFlightTransfers::new(),
        }
    }

    pub fn registry(&self) -> &FileTypeRegistry {
        &self.registry
    }

    pub fn in_flight(&self) -> &Rc<InFlightTransfers> {
        &self.in_flight
    }

    /// Handles one request. Returns the response to send now, or `None` when
    /// the response will be sent once a DMA transfer finishes.
    ///
    /// Only a request too short to carry a PLDM header is an error.
    pub fn handle_request(
        &self,
        requester: EndpointId,
        request: &[u8],
    ) -> FileIoResult<Option<Vec<u8>>> {
        let header = Header::decode(request).map_err(FileIoError::Codec)?;

        if !(header.is_request() && header.datagram() == 0 && header.is_hdr_ver_valid()) {
            error!("Invalid request header from {:?}", requester);
            return generate_failure_response(&header, FileIoCompletionCode::InvalidData).map(Some);
        }
        if header.pldm_type() != PldmSupportedType::Oem as u8 {
            return generate_failure_response(&header, FileIoCompletionCode::InvalidPldmType)
                .map(Some);
        }
        let Ok(cmd) = FileIoCmd::try_from(header.cmd_code()) else {
            return generate_failure_response(&header, FileIoCompletionCode::UnsupportedPldmCmd)
                .map(Some);
        };
        debug!("Handling {:?} from {:?}", cmd, requester);

        let key = ResponseKey {
            requester,
            instance_id: header.instance_id(),
        };
        let response = match cmd {
            FileIoCmd::ReadFileByTypeIntoMemory | FileIoCmd::WriteFileByTypeFromMemory => {
                return self.process_memory_cmd(key, cmd, request);
            }
            FileIoCmd::ReadFileByType => self.process_read(key.instance_id, request),
            FileIoCmd::WriteFileByType => self.process_write(key.instance_id, request),
            FileIoCmd::FileAck => self.process_file_ack(key.instance_id, request),
            FileIoCmd::FileAckWithMetaData => {
                self.process_file_ack_with_meta_data(key.instance_id, request)
            }
            FileIoCmd::NewFileAvailable => self.process_new_file(key.instance_id, request),
            FileIoCmd::NewFileAvailableWithMetaData => {
                self.process_new_file_with_meta_data(key.instance_id, request)
            }
        };
        response.map(Some)
    }

    fn process_memory_cmd(
        &self,
        key: ResponseKey,
        cmd: FileIoCmd,
        request: &[u8],
    ) -> FileIoResult<Option<Vec<u8>>> {
        let sync_response = |rc: FileIoCompletionCode| -> FileIoResult<Option<Vec<u8>>> {
            Ok(Some(encode_memory_response(key.instance_id, cmd, rc, 0)))
        };

        let req = match ReadWriteFileByTypeMemoryRequest::decode(request) {
            Ok(req) => req,
            Err(PldmCodecError::BufferTooShort) => {
                return sync_response(FileIoCompletionCode::InvalidLength)
            }
            Err(_) => return sync_response(FileIoCompletionCode::InvalidData),
        };
        let (file_type, file_handle) = (req.file_type, req.file_handle);
        let (offset, length, address) = (req.offset, req.length, req.address);

        let handler = match self.registry.resolve_shared(file_type, file_handle) {
            Ok(handler) => handler,
            Err(_) => return sync_response(FileIoCompletionCode::InvalidFileType),
        };

        let response = ResponseContext::new(key, cmd, self.sender.clone(), Some(handler.clone()));
        let mut ctx = TransferContext::new(
            &self.event_loop,
            self.dma.as_ref(),
            &self.in_flight,
            &self.config,
            response,
        );
        let result = {
            let mut handler = handler.borrow_mut();
            if cmd == FileIoCmd::ReadFileByTypeIntoMemory {
                handler.read_into_memory(offset, length, address, &mut ctx)
            } else {
                handler.write_from_memory(offset, length, address, &mut ctx)
            }
        };

        if ctx.is_submitted() {
            if let Err(rc) = result {
                warn!(
                    "{:?} on file type {:#x} reported {:?} after submitting its transfer",
                    cmd, file_type, rc
                );
            }
            return Ok(None);
        }
        match result {
            Ok(()) => Ok(Some(encode_memory_response(
                key.instance_id,
                cmd,
                FileIoCompletionCode::Success,
                length,
            ))),
            Err(rc) => sync_response(rc),
        }
    }

    fn process_read(&self, instance_id: InstanceId, request: &[u8]) -> FileIoResult<Vec<u8>> {
        let fail = |rc: FileIoCompletionCode| {
            encode_to_vec(&ReadWriteFileByTypeResponseFixed::new(
                instance_id,
                FileIoCmd::ReadFileByType,
                rc as u8,
                0,
            ))
        };

        let Ok(req) = ReadWriteFileByTypeRequest::decode(request) else {
            return fail(FileIoCompletionCode::InvalidLength);
        };
        let mut handler = match self.registry.resolve(req.file_type, req.file_handle) {
            Ok(handler) => handler,
            Err(_) => return fail(FileIoCompletionCode::InvalidFileType),
        };

        let length = req.length.min(self.config.max_read_payload);
        let mut data = Vec::with_capacity(length as usize);
        match handler.read(req.offset, length, &mut data) {
            Ok(_) => encode_to_vec(&ReadFileByTypeResponse::new(
                instance_id,
                FileIoCompletionCode::Success as u8,
                &data,
            )),
            Err(rc) => fail(rc),
        }
    }

    fn process_write(&self, instance_id: InstanceId, request: &[u8]) -> FileIoResult<Vec<u8>> {
        let respond = |rc: FileIoCompletionCode, length: u32| {
            encode_to_vec(&ReadWriteFileByTypeResponseFixed::new(
                instance_id,
                FileIoCmd::WriteFileByType,
                rc as u8,
                length,
            ))
        };

        let Ok((req, data)) = decode_write_file_by_type(request) else {
            return respond(FileIoCompletionCode::InvalidLength, 0);
        };
        let mut handler = match self.registry.resolve(req.file_type, req.file_handle) {
            Ok(handler) => handler,
            Err(_) => return respond(FileIoCompletionCode::InvalidFileType, 0),
        };

        match handler.write(data, req.offset) {
            Ok(written) => respond(FileIoCompletionCode::Success, written),
            Err(rc) => respond(rc, 0),
        }
    }

    fn process_file_ack(&self, instance_id: InstanceId, request: &[u8]) -> FileIoResult<Vec<u8>> {
        let cmd = FileIoCmd::FileAck;
        let Ok(req) = FileAckRequest::decode(request) else {
            return completion_response(instance_id, cmd, Err(FileIoCompletionCode::InvalidLength));
        };
        let result = self
            .resolve_for_ack(req.file_type, req.file_handle)
            .and_then(|mut handler| handler.file_ack(req.file_status));
        completion_response(instance_id, cmd, result)
    }

    fn process_file_ack_with_meta_data(
        &self,
        instance_id: InstanceId,
        request: &[u8],
    ) -> FileIoResult<Vec<u8>> {
        let cmd = FileIoCmd::FileAckWithMetaData;
        let Ok(req) = FileAckWithMetaDataRequest::decode(request) else {
            return completion_response(instance_id, cmd, Err(FileIoCompletionCode::InvalidLength));
        };
        let result = self
            .resolve_for_ack(req.file_type, req.file_handle)
            .and_then(|mut handler| handler.file_ack_with_meta_data(req.file_status, req.meta_data()));
        completion_response(instance_id, cmd, result)
    }

    fn process_new_file(&self, instance_id: InstanceId, request: &[u8]) -> FileIoResult<Vec<u8>> {
        let cmd = FileIoCmd::NewFileAvailable;
        let Ok(req) = NewFileAvailableRequest::decode(request) else {
            return completion_response(instance_id, cmd, Err(FileIoCompletionCode::InvalidLength));
        };
        let length = req.length;
        let result = self
            .resolve_for_ack(req.file_type, req.file_handle)
            .and_then(|mut handler| handler.new_file_available(length));
        completion_response(instance_id, cmd, result)
    }

    fn process_new_file_with_meta_data(
        &self,
        instance_id: InstanceId,
        request: &[u8],
    ) -> FileIoResult<Vec<u8>> {
        let cmd = FileIoCmd::NewFileAvailableWithMetaData;
        let Ok(req) = NewFileAvailableWithMetaDataRequest::decode(request) else {
            return completion_response(instance_id, cmd, Err(FileIoCompletionCode::InvalidLength));
        };
        let length = req.length;
        let result = self
            .resolve_for_ack(req.file_type, req.file_handle)
            .and_then(|mut handler| {
                handler.new_file_available_with_meta_data(length, req.meta_data())
            });
        completion_response(instance_id, cmd, result)
    }

    fn resolve_for_ack(
        &self,
        file_type: u16,
        file_handle: u32,
    ) -> Result<Box<dyn FileHandler>, FileIoCompletionCode> {
        self.registry
            .resolve(file_type, file_handle)
            .map_err(|_| FileIoCompletionCode::InvalidFileType)
    }
}
