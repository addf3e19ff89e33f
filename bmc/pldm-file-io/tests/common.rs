// Licensed under the Apache-2.0 license
#![allow(dead_code)]

use core::time::Duration;
use log::LevelFilter;
use pldm_common::codec::PldmCodec;
use pldm_common::message::file_io::rw_file_by_type_memory::{
    ReadWriteFileByTypeMemoryRequest, ReadWriteFileByTypeMemoryResponse,
};
use pldm_common::protocol::base::PldmMsgType;
use pldm_common::protocol::file_io::{FileIoCmd, FileIoCompletionCode, FileType};
use pldm_file_io::config::FileIoConfig;
use pldm_file_io::dma::emulated::{EmulatedDma, EmulatedHostMemory};
use pldm_file_io::dma::DmaProvider;
use pldm_file_io::event_loop::EventLoop;
use pldm_file_io::responder::FileIoResponder;
use pldm_file_io::response::{ResponseKey, ResponseSender};
use pldm_file_io::transport::{
    EndpointId, Payload, PldmSocket, PldmTransport, PldmTransportError, RxPacket, TxPacket,
    MAX_PLDM_PAYLOAD_SIZE,
};
use simple_logger::SimpleLogger;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const HOST_EID: EndpointId = EndpointId(0x08);
pub const BMC_EID: EndpointId = EndpointId(0x09);
pub const INSTANCE_ID: u8 = 0x03;
pub const HOST_MEMORY_BASE: u64 = 0x8000_0000;
pub const HOST_MEMORY_SIZE: usize = 1 << 20;

pub fn setup_logging() {
    // Initialize log level to debug (only once)
    let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
}

pub struct MockPldmSocket {
    source: EndpointId,
    dest: EndpointId,
    senders: Arc<Mutex<HashMap<EndpointId, Sender<TxPacket>>>>,
    receiver: Arc<Mutex<Option<Receiver<TxPacket>>>>,
}

impl PldmSocket for MockPldmSocket {
    fn send(&self, payload: &[u8]) -> Result<(), PldmTransportError> {
        let pkt = TxPacket {
            src: self.source,
            dest: self.dest,
            payload: Payload::from_slice(payload)?,
        };
        if let Some(tx) = self.senders.lock().unwrap().get(&pkt.dest) {
            let _ = tx.send(pkt);
        }
        Ok(())
    }

    fn receive(&self, timeout: Option<Duration>) -> Result<RxPacket, PldmTransportError> {
        let guard = self.receiver.lock().unwrap();
        let Some(receiver) = guard.as_ref() else {
            return Err(PldmTransportError::NotInitialized);
        };
        let pkt = match timeout {
            Some(timeout) => receiver.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => PldmTransportError::Timeout,
                RecvTimeoutError::Disconnected => PldmTransportError::Disconnected,
            })?,
            None => receiver
                .recv()
                .map_err(|_| PldmTransportError::Disconnected)?,
        };
        if pkt.payload.len == 0 {
            return Err(PldmTransportError::Underflow);
        }
        Ok(RxPacket {
            src: pkt.src,
            payload: pkt.payload,
        })
    }

    fn disconnect(&self) {
        // An empty packet tells every peer the link is gone
        for (id, sender) in self.senders.lock().unwrap().iter() {
            let pkt = TxPacket {
                src: self.source,
                dest: *id,
                payload: Payload::default(),
            };
            let _ = sender.send(pkt);
        }
    }

    fn connect(&self) -> Result<(), PldmTransportError> {
        Ok(())
    }

    fn clone(&self) -> Self {
        MockPldmSocket {
            source: self.source,
            dest: self.dest,
            senders: Arc::clone(&self.senders),
            receiver: Arc::clone(&self.receiver),
        }
    }
}

#[derive(Clone, Default)]
pub struct MockTransport {
    senders: Arc<Mutex<HashMap<EndpointId, Sender<TxPacket>>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PldmTransport<MockPldmSocket> for MockTransport {
    fn create_socket(
        &self,
        source: EndpointId,
        dest: EndpointId,
    ) -> Result<MockPldmSocket, PldmTransportError> {
        let (tx, rx) = mpsc::channel();
        self.senders.lock().unwrap().insert(source, tx);
        Ok(MockPldmSocket {
            source,
            dest,
            senders: Arc::clone(&self.senders),
            receiver: Arc::new(Mutex::new(Some(rx))),
        })
    }
}

/// Captures responses sent after dispatch returned.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: RefCell<Vec<(ResponseKey, Vec<u8>)>>,
}

impl ResponseSender for RecordingSender {
    fn send_response(&self, key: ResponseKey, response: &[u8]) -> Result<(), PldmTransportError> {
        self.sent.borrow_mut().push((key, response.to_vec()));
        Ok(())
    }
}

pub fn encode<P: PldmCodec>(message: &P) -> Vec<u8> {
    let mut buffer = [0u8; MAX_PLDM_PAYLOAD_SIZE];
    let size = message.encode(&mut buffer).unwrap();
    buffer[..size].to_vec()
}

pub fn memory_request(
    cmd: FileIoCmd,
    file_type: FileType,
    file_handle: u32,
    offset: u32,
    length: u32,
    address: u64,
) -> Vec<u8> {
    encode(&ReadWriteFileByTypeMemoryRequest::new(
        INSTANCE_ID,
        PldmMsgType::Request,
        cmd,
        file_type as u16,
        file_handle,
        offset,
        length,
        address,
    ))
}

/// Completion code and length of a DMA verb response.
pub fn memory_response(bytes: &[u8]) -> (FileIoCompletionCode, u32) {
    let response = ReadWriteFileByTypeMemoryResponse::decode(bytes).unwrap();
    let length = response.length;
    (
        FileIoCompletionCode::try_from(response.completion_code).unwrap(),
        length,
    )
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

/// Responder wired to emulated host memory and a recording response sender,
/// with its files under a temporary directory.
pub struct TestBed {
    pub dir: TempDir,
    pub config: FileIoConfig,
    pub event_loop: EventLoop,
    pub dma: Rc<EmulatedDma>,
    pub memory: Rc<EmulatedHostMemory>,
    pub sender: Rc<RecordingSender>,
    pub responder: FileIoResponder,
}

impl TestBed {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut FileIoConfig)) -> Self {
        setup_logging();
        let dir = tempfile::tempdir().unwrap();
        let mut config = FileIoConfig::with_root(dir.path());
        adjust(&mut config);

        let event_loop = EventLoop::new();
        let memory = EmulatedHostMemory::new(HOST_MEMORY_BASE, HOST_MEMORY_SIZE);
        let dma = Rc::new(EmulatedDma::new(memory.clone()));
        let sender = Rc::new(RecordingSender::default());
        let provider: Rc<dyn DmaProvider> = dma.clone();
        let response_sender: Rc<dyn ResponseSender> = sender.clone();
        let responder = FileIoResponder::new(
            config.clone(),
            event_loop.clone(),
            provider,
            Some(response_sender),
        );

        Self {
            dir,
            config,
            event_loop,
            dma,
            memory,
            sender,
            responder,
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn create_file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn request(&self, bytes: &[u8]) -> Option<Vec<u8>> {
        self.responder.handle_request(HOST_EID, bytes).unwrap()
    }

    pub fn run_until_idle(&self) {
        assert!(
            self.event_loop.run_until_idle(Duration::from_secs(5)),
            "Event loop did not go idle"
        );
    }

    /// Responses delivered through the sender so far.
    pub fn deferred_responses(&self) -> Vec<(FileIoCompletionCode, u32)> {
        self.sender
            .sent
            .borrow()
            .iter()
            .map(|(_, bytes)| memory_response(bytes))
            .collect()
    }
}
