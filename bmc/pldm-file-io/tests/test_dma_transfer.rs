// Licensed under the Apache-2.0 license

#[cfg(test)]
mod common;

use common::*;
use pldm_common::protocol::file_io::{FileIoCmd, FileIoCompletionCode, FileType};
use pldm_file_io::dma::engine::{InFlightTransfers, States, TransferId};
use pldm_file_io::dma::Direction;
use pldm_file_io::handler::{FileHandler, SharedFileHandler, TransferContext};
use pldm_file_io::response::{ResponseContext, ResponseKey};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

const PEL_HANDLE: u32 = 0x0A;

fn read_into_memory(handle: u32, offset: u32, length: u32, address: u64) -> Vec<u8> {
    memory_request(
        FileIoCmd::ReadFileByTypeIntoMemory,
        FileType::Pel,
        handle,
        offset,
        length,
        address,
    )
}

fn write_from_memory(handle: u32, offset: u32, length: u32, address: u64) -> Vec<u8> {
    memory_request(
        FileIoCmd::WriteFileByTypeFromMemory,
        FileType::Pel,
        handle,
        offset,
        length,
        address,
    )
}

#[test]
fn test_large_read_is_chunked() {
    let bed = TestBed::new();
    let contents = pattern(300_000);
    bed.create_file("pel/0000000A", &contents);

    assert!(bed
        .request(&read_into_memory(PEL_HANDLE, 0, 300_000, HOST_MEMORY_BASE))
        .is_none());
    assert_eq!(bed.responder.in_flight().len(), 1);
    bed.run_until_idle();

    assert_eq!(
        bed.deferred_responses(),
        vec![(FileIoCompletionCode::Success, 300_000)]
    );
    let stats = bed.dma.stats();
    let transfers = stats.transfers.borrow().clone();
    assert_eq!(transfers.len(), 19);
    assert!(transfers[..18].iter().all(|&len| len == 16_384));
    assert_eq!(transfers[18], 300_000 - 18 * 16_384);
    assert_eq!(bed.memory.read(HOST_MEMORY_BASE, 300_000).unwrap(), contents);
    assert_eq!(stats.released.get(), 1);
    assert!(bed.responder.in_flight().is_empty());
}

#[test]
fn test_exact_chunk_multiple() {
    let bed = TestBed::new();
    bed.create_file("pel/0000000A", &pattern(2 * 16_384));

    bed.request(&read_into_memory(PEL_HANDLE, 0, 2 * 16_384, HOST_MEMORY_BASE));
    bed.run_until_idle();

    assert_eq!(*bed.dma.stats().transfers.borrow(), vec![16_384, 16_384]);
    assert_eq!(
        bed.deferred_responses(),
        vec![(FileIoCompletionCode::Success, 2 * 16_384)]
    );
}

#[test]
fn test_transfer_failure_aborts_remaining_chunks() {
    let bed = TestBed::new();
    bed.create_file("pel/0000000A", &pattern(300_000));
    bed.dma.fail_transfer_call(Some(3));

    bed.request(&read_into_memory(PEL_HANDLE, 0, 300_000, HOST_MEMORY_BASE));
    bed.run_until_idle();

    assert_eq!(
        bed.deferred_responses(),
        vec![(FileIoCompletionCode::Error, 0)]
    );
    let stats = bed.dma.stats();
    assert_eq!(stats.transfer_calls(), 4);
    assert_eq!(stats.opened.get(), 1);
    assert_eq!(stats.released.get(), 1);
    assert!(bed.responder.in_flight().is_empty());
}

#[test]
fn test_short_final_transfer_fails() {
    let bed = TestBed::new();
    bed.create_file("pel/0000000A", &pattern(100));
    bed.dma.short_transfers(true);

    bed.request(&read_into_memory(PEL_HANDLE, 0, 100, HOST_MEMORY_BASE));
    bed.run_until_idle();

    assert_eq!(
        bed.deferred_responses(),
        vec![(FileIoCompletionCode::Error, 0)]
    );
    assert_eq!(bed.dma.stats().live_channels(), 0);
}

#[test]
fn test_timeout_then_late_readiness() {
    let bed = TestBed::with_config(|config| config.dma_timeout_ms = 50);
    bed.create_file("pel/0000000A", &pattern(4096));
    bed.dma.set_ready(false);

    bed.request(&read_into_memory(PEL_HANDLE, 0, 4096, HOST_MEMORY_BASE));
    bed.run_until_idle();

    assert_eq!(
        bed.deferred_responses(),
        vec![(FileIoCompletionCode::Error, 0)]
    );
    assert_eq!(bed.dma.stats().released.get(), 1);

    // Readiness arriving after teardown must find nothing to drive
    bed.dma.set_ready(true);
    for _ in 0..3 {
        assert_eq!(bed.event_loop.run_once(Duration::ZERO), 0);
    }
    assert_eq!(bed.dma.stats().transfer_calls(), 0);
    assert_eq!(bed.sender.sent.borrow().len(), 1);
    assert_eq!(bed.dma.stats().released.get(), 1);
}

#[test]
fn test_readiness_and_deadline_in_same_step() {
    let bed = TestBed::with_config(|config| config.dma_timeout_ms = 20);
    bed.create_file("pel/0000000A", &pattern(64));
    bed.dma.set_ready(false);

    bed.request(&read_into_memory(PEL_HANDLE, 0, 64, HOST_MEMORY_BASE));
    std::thread::sleep(Duration::from_millis(40));
    bed.dma.set_ready(true);
    bed.run_until_idle();

    // Only the first of the two callbacks acts
    assert_eq!(
        bed.deferred_responses(),
        vec![(FileIoCompletionCode::Success, 64)]
    );
    assert_eq!(bed.dma.stats().released.get(), 1);
}

#[test]
fn test_open_failure_answers_synchronously() {
    let bed = TestBed::new();
    bed.create_file("pel/0000000A", &pattern(64));
    bed.dma.fail_open(true);

    let response = bed
        .request(&read_into_memory(PEL_HANDLE, 0, 64, HOST_MEMORY_BASE))
        .expect("synchronous response");
    assert_eq!(memory_response(&response), (FileIoCompletionCode::Error, 0));
    assert!(bed.event_loop.is_idle());
    assert!(bed.sender.sent.borrow().is_empty());
    assert!(bed.responder.in_flight().is_empty());
}

#[test]
fn test_validation_failures_acquire_nothing() {
    let bed = TestBed::new();
    bed.create_file("pel/0000000A", &pattern(100));

    let cases = [
        (
            read_into_memory(PEL_HANDLE, 100, 10, HOST_MEMORY_BASE),
            FileIoCompletionCode::DataOutOfRange,
        ),
        (
            read_into_memory(0x0B, 0, 10, HOST_MEMORY_BASE),
            FileIoCompletionCode::InvalidFileHandle,
        ),
        (
            read_into_memory(PEL_HANDLE, 0, 0, HOST_MEMORY_BASE),
            FileIoCompletionCode::InvalidLength,
        ),
    ];
    for (request, expected) in cases {
        let response = bed.request(&request).expect("synchronous response");
        assert_eq!(memory_response(&response), (expected, 0));
    }

    assert_eq!(bed.dma.stats().opened.get(), 0);
    assert!(bed.event_loop.is_idle());
    assert!(bed.sender.sent.borrow().is_empty());
}

#[test]
fn test_write_region_past_offset_range_rejected() {
    let bed = TestBed::new();
    bed.memory.write(HOST_MEMORY_BASE, &pattern(32)).unwrap();

    let response = bed
        .request(&write_from_memory(PEL_HANDLE, u32::MAX - 15, 32, HOST_MEMORY_BASE))
        .expect("synchronous response");
    assert_eq!(
        memory_response(&response),
        (FileIoCompletionCode::DataOutOfRange, 0)
    );
    assert_eq!(bed.dma.stats().opened.get(), 0);
    assert!(bed.event_loop.is_idle());
    assert!(!bed.path("pel/0000000A").exists());

    // The loop keeps serving other transfers
    bed.request(&write_from_memory(PEL_HANDLE, 0, 32, HOST_MEMORY_BASE));
    bed.run_until_idle();
    assert_eq!(
        bed.deferred_responses(),
        vec![(FileIoCompletionCode::Success, 32)]
    );
}

#[test]
fn test_host_address_wrap_rejected() {
    let bed = TestBed::new();
    bed.create_file("pel/0000000A", &pattern(100));
    let response = bed
        .request(&read_into_memory(PEL_HANDLE, 0, 32, u64::MAX - 7))
        .expect("synchronous response");
    assert_eq!(
        memory_response(&response),
        (FileIoCompletionCode::DataOutOfRange, 0)
    );
    assert_eq!(bed.dma.stats().opened.get(), 0);
}

#[test]
fn test_write_never_leaves_hole() {
    let bed = TestBed::new();
    let pel = bed.create_file("pel/0000000A", &pattern(100));

    let response = bed
        .request(&write_from_memory(PEL_HANDLE, 101, 16, HOST_MEMORY_BASE))
        .expect("synchronous response");
    assert_eq!(
        memory_response(&response),
        (FileIoCompletionCode::DataOutOfRange, 0)
    );
    assert_eq!(bed.dma.stats().opened.get(), 0);

    // Appending at the current end is allowed
    bed.memory.write(HOST_MEMORY_BASE, &pattern(16)).unwrap();
    bed.request(&write_from_memory(PEL_HANDLE, 100, 16, HOST_MEMORY_BASE));
    bed.run_until_idle();
    assert_eq!(
        bed.deferred_responses(),
        vec![(FileIoCompletionCode::Success, 16)]
    );
    assert_eq!(std::fs::metadata(&pel).unwrap().len(), 116);
}

#[test]
fn test_read_is_clamped_to_file_end() {
    let bed = TestBed::new();
    let contents = pattern(100);
    bed.create_file("pel/0000000A", &contents);

    bed.request(&read_into_memory(PEL_HANDLE, 50, 100, HOST_MEMORY_BASE));
    bed.run_until_idle();

    assert_eq!(
        bed.deferred_responses(),
        vec![(FileIoCompletionCode::Success, 50)]
    );
    assert_eq!(*bed.dma.stats().transfers.borrow(), vec![50]);
    assert_eq!(
        bed.memory.read(HOST_MEMORY_BASE, 50).unwrap(),
        contents[50..].to_vec()
    );
}

#[test]
fn test_write_then_read_back() {
    let bed = TestBed::new();
    let contents = pattern(40_000);
    bed.memory.write(HOST_MEMORY_BASE, &contents).unwrap();

    bed.request(&write_from_memory(1, 0, 40_000, HOST_MEMORY_BASE));
    bed.run_until_idle();
    assert_eq!(
        bed.deferred_responses(),
        vec![(FileIoCompletionCode::Success, 40_000)]
    );
    assert_eq!(std::fs::read(bed.path("pel/00000001")).unwrap(), contents);

    let readback = HOST_MEMORY_BASE + 0x8_0000;
    bed.request(&read_into_memory(1, 0, 40_000, readback));
    bed.run_until_idle();
    assert_eq!(bed.memory.read(readback, 40_000).unwrap(), contents);
    assert_eq!(bed.dma.stats().released.get(), 2);
}

#[test]
fn test_concurrent_transfers_keep_separate_progress() {
    let bed = TestBed::new();
    let first = pattern(50_000);
    let second: Vec<u8> = pattern(30_000).iter().map(|b| !b).collect();
    bed.create_file("pel/00000001", &first);
    bed.create_file("pel/00000002", &second);

    let second_address = HOST_MEMORY_BASE + 0x4_0000;
    assert!(bed
        .request(&read_into_memory(1, 0, 50_000, HOST_MEMORY_BASE))
        .is_none());
    assert!(bed
        .request(&read_into_memory(2, 0, 30_000, second_address))
        .is_none());
    assert_eq!(bed.responder.in_flight().len(), 2);

    bed.run_until_idle();

    let mut responses = bed.deferred_responses();
    responses.sort_by_key(|(_, len)| *len);
    assert_eq!(
        responses,
        vec![
            (FileIoCompletionCode::Success, 30_000),
            (FileIoCompletionCode::Success, 50_000)
        ]
    );
    assert_eq!(bed.memory.read(HOST_MEMORY_BASE, 50_000).unwrap(), first);
    assert_eq!(bed.memory.read(second_address, 30_000).unwrap(), second);
    assert!(bed.responder.in_flight().is_empty());
}

struct HookRecorder {
    calls: Rc<RefCell<Vec<bool>>>,
}

impl FileHandler for HookRecorder {
    fn file_handle(&self) -> u32 {
        0
    }

    fn post_data_transfer_callback(&mut self, is_write: bool) {
        self.calls.borrow_mut().push(is_write);
    }
}

fn submit_with_hook(
    bed: &TestBed,
    in_flight: &Rc<InFlightTransfers>,
    cmd: FileIoCmd,
) -> Rc<RefCell<Vec<bool>>> {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let handler: SharedFileHandler = Rc::new(RefCell::new(HookRecorder {
        calls: calls.clone(),
    }));
    let key = ResponseKey {
        requester: HOST_EID,
        instance_id: INSTANCE_ID,
    };
    let response = ResponseContext::new(key, cmd, Some(bed.sender.clone()), Some(handler));
    let mut ctx = TransferContext::new(
        &bed.event_loop,
        bed.dma.as_ref(),
        in_flight,
        &bed.config,
        response,
    );
    let direction = if cmd == FileIoCmd::WriteFileByTypeFromMemory {
        Direction::FromHost
    } else {
        Direction::ToHost
    };
    assert_eq!(
        ctx.transfer_file(&bed.path("hooked"), direction, 0, 16, HOST_MEMORY_BASE),
        Ok(16)
    );
    assert!(ctx.is_submitted());
    calls
}

#[test]
fn test_post_transfer_hook_runs_once_on_success() {
    let bed = TestBed::new();
    let in_flight = InFlightTransfers::new();

    let calls = submit_with_hook(&bed, &in_flight, FileIoCmd::WriteFileByTypeFromMemory);
    let engine = in_flight.get(in_flight_id(&in_flight)).unwrap();
    assert!(engine.state() == States::Armed);
    bed.run_until_idle();

    assert_eq!(*calls.borrow(), vec![true]);
    assert!(engine.state() == States::Released);
    assert!(engine.chunk().complete);
    assert!(in_flight.is_empty());
}

#[test]
fn test_post_transfer_hook_skipped_on_failure() {
    let bed = TestBed::new();
    bed.create_file("hooked", &pattern(16));
    bed.dma.fail_transfer_call(Some(0));
    let in_flight = InFlightTransfers::new();

    let calls = submit_with_hook(&bed, &in_flight, FileIoCmd::ReadFileByTypeIntoMemory);
    bed.run_until_idle();

    assert!(calls.borrow().is_empty());
    assert_eq!(
        bed.deferred_responses(),
        vec![(FileIoCompletionCode::Error, 0)]
    );
}

fn in_flight_id(in_flight: &Rc<InFlightTransfers>) -> TransferId {
    in_flight.ids().into_iter().next().unwrap()
}
