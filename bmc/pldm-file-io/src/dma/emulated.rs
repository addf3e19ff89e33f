// Licensed under the Apache-2.0 license

//! In-process stand-in for the host DMA bridge.
//!
//! Host memory is a flat byte window starting at a base address. Faults can be
//! injected to exercise the failure paths of the transfer engine.

use super::{DmaChannel, DmaChunk, DmaError, DmaProvider, Direction};
use crate::event_loop::{EventSource, Interest};
use log::debug;
use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::rc::Rc;

const EIO: i32 = -5;

pub struct EmulatedHostMemory {
    base: u64,
    data: RefCell<Vec<u8>>,
}

impl EmulatedHostMemory {
    pub fn new(base: u64, size: usize) -> Rc<Self> {
        Rc::new(Self {
            base,
            data: RefCell::new(vec![0; size]),
        })
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    fn range(&self, address: u64, len: usize) -> Result<std::ops::Range<usize>, DmaError> {
        let start = address
            .checked_sub(self.base)
            .ok_or(DmaError::BadAddress(address))? as usize;
        let end = start
            .checked_add(len)
            .ok_or(DmaError::BadAddress(address))?;
        if end > self.data.borrow().len() {
            return Err(DmaError::BadAddress(address));
        }
        Ok(start..end)
    }

    pub fn read(&self, address: u64, len: usize) -> Result<Vec<u8>, DmaError> {
        let range = self.range(address, len)?;
        Ok(self.data.borrow()[range].to_vec())
    }

    pub fn write(&self, address: u64, bytes: &[u8]) -> Result<(), DmaError> {
        let range = self.range(address, bytes.len())?;
        self.data.borrow_mut()[range].copy_from_slice(bytes);
        Ok(())
    }
}

/// Readiness shared by every channel of one [`EmulatedDma`].
#[derive(Default)]
pub struct DmaNotifier {
    ready: Cell<bool>,
}

impl EventSource for DmaNotifier {
    fn readiness(&self) -> Interest {
        if self.ready.get() {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::empty()
        }
    }
}

/// Counters kept across all channels of one [`EmulatedDma`].
#[derive(Default, Debug)]
pub struct DmaStats {
    pub opened: Cell<usize>,
    pub released: Cell<usize>,
    /// Requested length of every transfer call, in call order.
    pub transfers: RefCell<Vec<u32>>,
}

impl DmaStats {
    pub fn transfer_calls(&self) -> usize {
        self.transfers.borrow().len()
    }

    pub fn live_channels(&self) -> usize {
        self.opened.get() - self.released.get()
    }
}

pub struct EmulatedDma {
    memory: Rc<EmulatedHostMemory>,
    notifier: Rc<DmaNotifier>,
    stats: Rc<DmaStats>,
    fail_open: Cell<bool>,
    fail_at_call: Cell<Option<usize>>,
    short_transfers: Cell<bool>,
}

impl EmulatedDma {
    /// Channels start out ready.
    pub fn new(memory: Rc<EmulatedHostMemory>) -> Self {
        let notifier = Rc::new(DmaNotifier::default());
        notifier.ready.set(true);
        Self {
            memory,
            notifier,
            stats: Rc::new(DmaStats::default()),
            fail_open: Cell::new(false),
            fail_at_call: Cell::new(None),
            short_transfers: Cell::new(false),
        }
    }

    pub fn memory(&self) -> Rc<EmulatedHostMemory> {
        self.memory.clone()
    }

    pub fn stats(&self) -> Rc<DmaStats> {
        self.stats.clone()
    }

    pub fn set_ready(&self, ready: bool) {
        self.notifier.ready.set(ready);
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.set(fail);
    }

    /// Makes the transfer call with zero-based index `call` fail.
    pub fn fail_transfer_call(&self, call: Option<usize>) {
        self.fail_at_call.set(call);
    }

    /// Makes every transfer move one byte less than requested.
    pub fn short_transfers(&self, short: bool) {
        self.short_transfers.set(short);
    }
}

impl DmaProvider for EmulatedDma {
    fn open(&self, length: u32) -> Result<Box<dyn DmaChannel>, DmaError> {
        if self.fail_open.get() {
            return Err(DmaError::ResourceExhausted);
        }
        self.stats.opened.set(self.stats.opened.get() + 1);
        debug!("Opened emulated DMA channel for {} bytes", length);
        Ok(Box::new(EmulatedChannel {
            memory: self.memory.clone(),
            notifier: self.notifier.clone(),
            stats: self.stats.clone(),
            fail_at_call: self.fail_at_call.get(),
            short_transfers: self.short_transfers.get(),
            released: false,
        }))
    }
}

struct EmulatedChannel {
    memory: Rc<EmulatedHostMemory>,
    notifier: Rc<DmaNotifier>,
    stats: Rc<DmaStats>,
    fail_at_call: Option<usize>,
    short_transfers: bool,
    released: bool,
}

impl EmulatedChannel {
    fn copy(&self, file: &mut File, chunk: DmaChunk, direction: Direction) -> Result<u32, DmaError> {
        let len = if self.short_transfers {
            chunk.length.saturating_sub(1)
        } else {
            chunk.length
        };
        file.seek(SeekFrom::Start(chunk.offset as u64))?;
        match direction {
            Direction::ToHost => {
                let mut buf = Vec::with_capacity(len as usize);
                file.take(len as u64).read_to_end(&mut buf)?;
                self.memory.write(chunk.address, &buf)?;
                Ok(buf.len() as u32)
            }
            Direction::FromHost => {
                let buf = self.memory.read(chunk.address, len as usize)?;
                file.write_all(&buf)?;
                Ok(len)
            }
        }
    }
}

impl DmaChannel for EmulatedChannel {
    fn notifier(&self) -> Rc<dyn EventSource> {
        self.notifier.clone()
    }

    fn transfer(
        &mut self,
        file: &mut File,
        chunk: DmaChunk,
        direction: Direction,
    ) -> Result<u32, DmaError> {
        if self.released {
            return Err(DmaError::Released);
        }
        let call = {
            let mut transfers = self.stats.transfers.borrow_mut();
            transfers.push(chunk.length);
            transfers.len() - 1
        };
        if self.fail_at_call == Some(call) {
            return Err(DmaError::Transfer(EIO));
        }
        self.copy(file, chunk, direction)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.stats.released.set(self.stats.released.get() + 1);
        }
    }
}

impl Drop for EmulatedChannel {
    fn drop(&mut self) {
        self.release();
    }
}
