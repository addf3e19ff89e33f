// Licensed under the Apache-2.0 license

//! Chunked, event-driven DMA transfer of one file region.
//!
//! An engine is owned by [`InFlightTransfers`] from submission until teardown.
//! The timeout timer and the DMA readiness watch only hold weak references,
//! so whichever of them finishes the transfer first tears it down and the
//! other one finds nothing left to act on.

use super::{DmaChannel, DmaChunk, DmaError, DmaProvider, Direction};
use crate::event_loop::{EventLoop, Interest, WatchId};
use crate::response::ResponseContext;
use crate::timer::TimerId;
use log::{debug, error, warn};
use pldm_common::protocol::file_io::FileIoCompletionCode;
use smlang::statemachine;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs::File;
use std::rc::{Rc, Weak};
use std::time::Duration;

statemachine! {
    derive_states: [Debug, Clone],
    derive_events: [Clone, Debug],
    transitions: {
        *Armed + TransferDone / on_transfer_done = Completed,
        Armed + TransferFailed / on_transfer_failed = Failed,
        Armed + DeadlineExpired / on_deadline_expired = TimedOut,

        Completed + Release / on_release = Released,
        Failed + Release / on_release = Released,
        TimedOut + Release / on_release = Released
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(u64);

/// Progress through the file region being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkState {
    pub remaining: u32,
    pub offset: u32,
    pub address: u64,
    pub complete: bool,
}

impl ChunkState {
    pub fn new(offset: u32, length: u32, address: u64) -> Self {
        Self {
            remaining: length,
            offset,
            address,
            complete: length == 0,
        }
    }

    /// Next transfer of at most `max_chunk` bytes.
    pub fn next_chunk(&self, max_chunk: u32) -> DmaChunk {
        DmaChunk {
            offset: self.offset,
            length: self.remaining.min(max_chunk),
            address: self.address,
        }
    }

    /// Records `moved` bytes as done. Returns false, leaving the state
    /// untouched, when the file offset or host address would wrap.
    pub fn advance(&mut self, moved: u32) -> bool {
        let moved = moved.min(self.remaining);
        let (Some(offset), Some(address)) = (
            self.offset.checked_add(moved),
            self.address.checked_add(moved as u64),
        ) else {
            return false;
        };
        self.remaining -= moved;
        self.offset = offset;
        self.address = address;
        if self.remaining == 0 {
            self.complete = true;
        }
        true
    }
}

/// Parameters of one submitted transfer.
#[derive(Debug)]
pub struct TransferRequest {
    pub file: File,
    pub direction: Direction,
    pub offset: u32,
    pub length: u32,
    pub address: u64,
    pub max_chunk: u32,
    pub timeout: Duration,
}

pub struct EngineContext {
    id: TransferId,
    event_loop: EventLoop,
    in_flight: Weak<InFlightTransfers>,
    direction: Direction,
    max_chunk: u32,
    orig_length: u32,
    chunk: ChunkState,
    file: Option<File>,
    channel: Option<Box<dyn DmaChannel>>,
    response: Option<ResponseContext>,
    timer: Option<TimerId>,
    watch: Option<WatchId>,
}

impl EngineContext {
    pub fn chunk(&self) -> &ChunkState {
        &self.chunk
    }

    /// Pushes every full chunk, then the remainder. Any failed transfer, or
    /// a final transfer that moves fewer bytes than remain, fails the whole
    /// request.
    fn run_chunks(&mut self) -> Events {
        let (Some(channel), Some(file)) = (self.channel.as_mut(), self.file.as_mut()) else {
            return Events::TransferFailed;
        };

        while self.chunk.remaining > self.max_chunk {
            let chunk = self.chunk.next_chunk(self.max_chunk);
            if let Err(e) = channel.transfer(file, chunk, self.direction) {
                error!("DMA transfer {:?} failed at offset {}: {}", self.id, chunk.offset, e);
                return Events::TransferFailed;
            }
            if !self.chunk.advance(self.max_chunk) {
                error!("DMA transfer {:?} ran past offset {}", self.id, chunk.offset);
                return Events::TransferFailed;
            }
        }

        let chunk = self.chunk.next_chunk(self.max_chunk);
        match channel.transfer(file, chunk, self.direction) {
            Ok(moved) if moved == chunk.length => {
                if self.chunk.advance(moved) {
                    Events::TransferDone
                } else {
                    error!("DMA transfer {:?} ran past offset {}", self.id, chunk.offset);
                    Events::TransferFailed
                }
            }
            Ok(moved) => {
                error!(
                    "DMA transfer {:?} moved {} of {} bytes in final chunk",
                    self.id, moved, chunk.length
                );
                Events::TransferFailed
            }
            Err(e) => {
                error!("DMA transfer {:?} failed at offset {}: {}", self.id, chunk.offset, e);
                Events::TransferFailed
            }
        }
    }

    fn finish(&mut self, completion_code: FileIoCompletionCode, length: u32) {
        if let Some(response) = self.response.take() {
            response.complete(completion_code, length);
        }
    }
}

impl StateMachineContext for EngineContext {
    fn on_transfer_done(&mut self) -> Result<(), ()> {
        debug!("DMA transfer {:?} completed, {} bytes", self.id, self.orig_length);
        self.finish(FileIoCompletionCode::Success, self.orig_length);
        Ok(())
    }

    fn on_transfer_failed(&mut self) -> Result<(), ()> {
        self.finish(FileIoCompletionCode::Error, 0);
        Ok(())
    }

    fn on_deadline_expired(&mut self) -> Result<(), ()> {
        warn!(
            "DMA transfer {:?} timed out with {} bytes outstanding",
            self.id, self.chunk.remaining
        );
        self.finish(FileIoCompletionCode::Error, 0);
        Ok(())
    }

    fn on_release(&mut self) -> Result<(), ()> {
        if let Some(timer) = self.timer.take() {
            self.event_loop.cancel_timer(timer);
        }
        if let Some(watch) = self.watch.take() {
            self.event_loop.remove_io(watch);
        }
        if let Some(mut channel) = self.channel.take() {
            channel.release();
        }
        self.file = None;
        self.response = None;
        if let Some(in_flight) = self.in_flight.upgrade() {
            in_flight.remove(self.id);
        }
        debug!("DMA transfer {:?} released", self.id);
        Ok(())
    }
}

type SharedStateMachine = Rc<RefCell<StateMachine<EngineContext>>>;

/// Drives a terminal event and then tears the engine down.
fn conclude(
    engine: &Weak<RefCell<StateMachine<EngineContext>>>,
    event: impl FnOnce(&mut EngineContext) -> Option<Events>,
) {
    let Some(engine) = engine.upgrade() else {
        return;
    };
    let mut sm = engine.borrow_mut();
    if *sm.state() != States::Armed {
        return;
    }
    let Some(event) = event(sm.context_mut()) else {
        return;
    };
    if sm.process_event(event).is_ok() && sm.process_event(Events::Release).is_err() {
        error!("DMA transfer teardown rejected in state {:?}", sm.state());
    }
}

/// One in-flight chunked transfer between a file and host memory.
#[derive(Clone)]
pub struct DmaTransferEngine {
    sm: SharedStateMachine,
}

impl DmaTransferEngine {
    /// Opens a DMA channel, arms the timeout and registers for readiness.
    ///
    /// On error nothing stays registered and `response` is dropped unsent;
    /// the caller answers the request itself.
    pub fn start(
        request: TransferRequest,
        provider: &dyn DmaProvider,
        event_loop: &EventLoop,
        in_flight: &Rc<InFlightTransfers>,
        response: ResponseContext,
    ) -> Result<TransferId, DmaError> {
        let channel = provider.open(request.length)?;
        let notifier = channel.notifier();
        let id = in_flight.next_id();

        let sm: SharedStateMachine = Rc::new(RefCell::new(StateMachine::new(EngineContext {
            id,
            event_loop: event_loop.clone(),
            in_flight: Rc::downgrade(in_flight),
            direction: request.direction,
            max_chunk: request.max_chunk,
            orig_length: request.length,
            chunk: ChunkState::new(request.offset, request.length, request.address),
            file: Some(request.file),
            channel: Some(channel),
            response: Some(response),
            timer: None,
            watch: None,
        })));

        let weak = Rc::downgrade(&sm);
        let timer = event_loop.add_timer(request.timeout, move || {
            conclude(&weak, |_| Some(Events::DeadlineExpired));
        });

        let weak = Rc::downgrade(&sm);
        let watch = event_loop.add_io(
            notifier,
            Interest::READABLE | Interest::WRITABLE,
            move |revents| {
                if revents.is_empty() {
                    return;
                }
                conclude(&weak, |ctx| Some(ctx.run_chunks()));
            },
        );

        {
            let mut engine = sm.borrow_mut();
            let ctx = engine.context_mut();
            ctx.timer = Some(timer);
            ctx.watch = Some(watch);
        }

        debug!(
            "DMA transfer {:?} armed: {:?} {} bytes at offset {} address {:#x}",
            id, request.direction, request.length, request.offset, request.address
        );
        in_flight.insert(id, DmaTransferEngine { sm });
        Ok(id)
    }

    pub fn state(&self) -> States {
        self.sm.borrow().state().clone()
    }

    pub fn chunk(&self) -> ChunkState {
        *self.sm.borrow().context().chunk()
    }
}

/// Sole owner of every engine between submission and teardown.
#[derive(Default)]
pub struct InFlightTransfers {
    next_id: Cell<u64>,
    engines: RefCell<BTreeMap<TransferId, DmaTransferEngine>>,
}

impl InFlightTransfers {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    fn next_id(&self) -> TransferId {
        let id = TransferId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        id
    }

    fn insert(&self, id: TransferId, engine: DmaTransferEngine) {
        self.engines.borrow_mut().insert(id, engine);
    }

    fn remove(&self, id: TransferId) {
        // Dropped outside the borrow; the engine may still be on the stack.
        let engine = self.engines.borrow_mut().remove(&id);
        drop(engine);
    }

    pub fn get(&self, id: TransferId) -> Option<DmaTransferEngine> {
        self.engines.borrow().get(&id).cloned()
    }

    pub fn ids(&self) -> Vec<TransferId> {
        self.engines.borrow().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.engines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.borrow().is_empty()
    }
}
