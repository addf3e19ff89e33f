// Licensed under the Apache-2.0 license

//! BMC-side responder for the OEM PLDM file I/O commands.
//!
//! Requests name a file by a numeric file type and an opaque handle. The
//! [`registry::FileTypeRegistry`] builds the matching [`handler::FileHandler`],
//! which either answers synchronously or hands the data movement to a
//! [`dma::engine::DmaTransferEngine`] running inside the single-threaded
//! [`event_loop::EventLoop`].

pub mod config;
pub mod daemon;
pub mod dma;
pub mod error;
pub mod event_loop;
pub mod handler;
pub mod registry;
pub mod responder;
pub mod response;
pub mod timer;
pub mod transport;
