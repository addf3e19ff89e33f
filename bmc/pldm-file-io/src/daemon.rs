// Licensed under the Apache-2.0 license

use crate::config::FileIoConfig;
use crate::dma::DmaProvider;
use crate::error::DaemonError;
use crate::event_loop::EventLoop;
use crate::responder::FileIoResponder;
use crate::response::{ResponseSender, SocketResponseSender};
use crate::transport::{PldmSocket, PldmTransportError, RxPacket};
use log::{debug, error, info};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// `FileIoDaemon` serves file I/O requests arriving on one PLDM socket.
///
/// Everything runs on the calling thread: receiving a request, dispatching
/// it, and stepping the event loop that drives outstanding DMA transfers.
pub struct FileIoDaemon<S: PldmSocket> {
    socket: S,
    event_loop: EventLoop,
    responder: FileIoResponder,
}

impl<S: PldmSocket + 'static> FileIoDaemon<S> {
    pub fn new(socket: S, config: FileIoConfig, dma: Rc<dyn DmaProvider>) -> Self {
        info!("FileIoDaemon serving files under {}", config.root.display());
        let event_loop = EventLoop::new();
        let sender: Rc<dyn ResponseSender> = Rc::new(SocketResponseSender::new(socket.clone()));
        let responder = FileIoResponder::new(config, event_loop.clone(), dma, Some(sender));
        Self {
            socket,
            event_loop,
            responder,
        }
    }

    pub fn responder(&self) -> &FileIoResponder {
        &self.responder
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// Waits up to `wait` for one request and handles it, then lets the
    /// event loop run whatever became ready.
    pub fn poll(&mut self, wait: Duration) -> Result<(), DaemonError> {
        match self.socket.receive(Some(wait)) {
            Ok(packet) => self.handle_packet(&packet)?,
            Err(PldmTransportError::Timeout) => {}
            Err(e) => {
                error!("Error receiving packet: {:?}", e);
                return Err(DaemonError::Transport(e));
            }
        }
        self.event_loop.run_once(Duration::ZERO);
        Ok(())
    }

    /// Polls until `stop` is set.
    pub fn serve(&mut self, stop: &AtomicBool) -> Result<(), DaemonError> {
        while !stop.load(Ordering::SeqCst) {
            self.poll(DEFAULT_POLL_INTERVAL)?;
        }
        info!("FileIoDaemon stopped");
        Ok(())
    }

    fn handle_packet(&mut self, packet: &RxPacket) -> Result<(), DaemonError> {
        debug!("Handling packet: {}", packet);
        match self
            .responder
            .handle_request(packet.src, packet.payload.as_bytes())
        {
            Ok(Some(response)) => self.socket.send(&response).map_err(DaemonError::Transport),
            Ok(None) => Ok(()),
            Err(e) => {
                error!("Dropping request from {:?}: {}", packet.src, e);
                Ok(())
            }
        }
    }
}
