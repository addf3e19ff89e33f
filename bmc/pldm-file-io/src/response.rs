// Licensed under the Apache-2.0 license

use crate::handler::SharedFileHandler;
use crate::transport::{EndpointId, PldmSocket, PldmTransportError, MAX_PLDM_PAYLOAD_SIZE};
use log::{debug, error};
use pldm_common::codec::PldmCodec;
use pldm_common::message::file_io::rw_file_by_type_memory::ReadWriteFileByTypeMemoryResponse;
use pldm_common::protocol::base::InstanceId;
use pldm_common::protocol::file_io::{FileIoCmd, FileIoCompletionCode};
use std::rc::Rc;

/// Identifies the request a response answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseKey {
    pub requester: EndpointId,
    pub instance_id: InstanceId,
}

/// Path back to the requester for responses produced after dispatch returned.
pub trait ResponseSender {
    fn send_response(&self, key: ResponseKey, response: &[u8]) -> Result<(), PldmTransportError>;
}

/// Sends on a socket bound to a single peer. The requester in the key is
/// only used for logging; every response goes to that peer.
pub struct SocketResponseSender<S: PldmSocket> {
    socket: S,
}

impl<S: PldmSocket> SocketResponseSender<S> {
    pub fn new(socket: S) -> Self {
        Self { socket }
    }
}

impl<S: PldmSocket> ResponseSender for SocketResponseSender<S> {
    fn send_response(&self, key: ResponseKey, response: &[u8]) -> Result<(), PldmTransportError> {
        debug!("Sending deferred response to {:?}", key);
        self.socket.send(response)
    }
}

/// Encodes the response shared by both DMA verbs.
pub fn encode_memory_response(
    instance_id: InstanceId,
    cmd: FileIoCmd,
    completion_code: FileIoCompletionCode,
    length: u32,
) -> Vec<u8> {
    let response =
        ReadWriteFileByTypeMemoryResponse::new(instance_id, cmd, completion_code as u8, length);
    let mut buffer = [0u8; MAX_PLDM_PAYLOAD_SIZE];
    // The fixed-size response always fits the payload buffer.
    let size = response.encode(&mut buffer).unwrap_or(0);
    buffer[..size].to_vec()
}

/// Everything needed to answer a DMA verb once its transfer finishes.
///
/// Consumed by [`ResponseContext::complete`]; dropping it unsent is how a
/// caller that answers synchronously gives it back.
pub struct ResponseContext {
    key: ResponseKey,
    command: FileIoCmd,
    sender: Option<Rc<dyn ResponseSender>>,
    handler: Option<SharedFileHandler>,
}

impl ResponseContext {
    pub fn new(
        key: ResponseKey,
        command: FileIoCmd,
        sender: Option<Rc<dyn ResponseSender>>,
        handler: Option<SharedFileHandler>,
    ) -> Self {
        Self {
            key,
            command,
            sender,
            handler,
        }
    }

    pub fn key(&self) -> ResponseKey {
        self.key
    }

    pub fn command(&self) -> FileIoCmd {
        self.command
    }

    pub fn is_write(&self) -> bool {
        self.command == FileIoCmd::WriteFileByTypeFromMemory
    }

    /// Sends the terminal response. On success the handler's post-transfer
    /// hook runs after the response is on its way.
    pub fn complete(self, completion_code: FileIoCompletionCode, length: u32) {
        let length = if completion_code == FileIoCompletionCode::Success {
            length
        } else {
            0
        };
        let response =
            encode_memory_response(self.key.instance_id, self.command, completion_code, length);

        match &self.sender {
            Some(sender) => {
                if let Err(e) = sender.send_response(self.key, &response) {
                    error!("Failed to send response to {:?}: {:?}", self.key, e);
                }
            }
            None => debug!("No response channel for {:?}, dropping response", self.key),
        }

        if completion_code != FileIoCompletionCode::Success {
            return;
        }
        if let Some(handler) = &self.handler {
            match handler.try_borrow_mut() {
                Ok(mut handler) => handler.post_data_transfer_callback(self.is_write()),
                Err(_) => error!("File handler busy, skipping post-transfer hook"),
            }
        }
    }
}
