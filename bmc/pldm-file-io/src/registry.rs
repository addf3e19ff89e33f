// Licensed under the Apache-2.0 license

use crate::config::FileIoConfig;
use crate::error::{FileIoError, FileIoResult};
use crate::handler::cert::CertHandler;
use crate::handler::chap::ChapHandler;
use crate::handler::dump::DumpHandler;
use crate::handler::keyword::KeywordHandler;
use crate::handler::license::LicenseHandler;
use crate::handler::lid::LidHandler;
use crate::handler::pcie::PcieInfoHandler;
use crate::handler::pel::PelHandler;
use crate::handler::progress::ProgressCodeHandler;
use crate::handler::{FileHandler, SharedFileHandler};
use log::error;
use pldm_common::protocol::file_io::FileType;
use std::cell::RefCell;
use std::rc::Rc;

/// How a freshly built handler is handed to the caller.
trait Ownership {
    type Handle;
    fn wrap<H: FileHandler + 'static>(handler: H) -> Self::Handle;
}

struct Exclusive;

impl Ownership for Exclusive {
    type Handle = Box<dyn FileHandler>;

    fn wrap<H: FileHandler + 'static>(handler: H) -> Self::Handle {
        Box::new(handler)
    }
}

struct Shared;

impl Ownership for Shared {
    type Handle = SharedFileHandler;

    fn wrap<H: FileHandler + 'static>(handler: H) -> Self::Handle {
        Rc::new(RefCell::new(handler))
    }
}

/// Maps numeric file types to handler variants.
///
/// Construction only computes paths; no file is opened until a verb runs.
#[derive(Debug, Clone)]
pub struct FileTypeRegistry {
    config: Rc<FileIoConfig>,
}

impl FileTypeRegistry {
    pub fn new(config: Rc<FileIoConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FileIoConfig {
        &self.config
    }

    /// Handler owned by the caller, for verbs that finish synchronously.
    pub fn resolve(&self, file_type: u16, file_handle: u32) -> FileIoResult<Box<dyn FileHandler>> {
        self.build::<Exclusive>(file_type, file_handle)
    }

    /// Handler that an asynchronous transfer can keep alive until it has
    /// reported completion.
    pub fn resolve_shared(&self, file_type: u16, file_handle: u32) -> FileIoResult<SharedFileHandler> {
        self.build::<Shared>(file_type, file_handle)
    }

    fn build<O: Ownership>(&self, file_type: u16, file_handle: u32) -> FileIoResult<O::Handle> {
        let config = self.config.as_ref();
        let file_type = FileType::try_from(file_type).map_err(|_| {
            error!("Unrecognized file type {:#x}", file_type);
            FileIoError::UnrecognizedFileType(file_type)
        })?;

        let handler = match file_type {
            FileType::Pel => O::wrap(PelHandler::new(file_handle, config)),
            FileType::LidPerm | FileType::LidTemp | FileType::LidMarker | FileType::LidRunning => {
                O::wrap(LidHandler::new(file_handle, file_type, config))
            }
            FileType::Dump
            | FileType::ResourceDumpParms
            | FileType::ResourceDump
            | FileType::BmcDump
            | FileType::SbeDump
            | FileType::HostbootDump
            | FileType::HardwareDump => O::wrap(DumpHandler::new(file_handle, file_type, config)),
            FileType::CertSigningRequest | FileType::SignedCert | FileType::RootCert => {
                O::wrap(CertHandler::new(file_handle, file_type, config))
            }
            FileType::CodLicenseKey | FileType::CodLicensedResources => {
                O::wrap(LicenseHandler::new(file_handle, file_type, config))
            }
            FileType::ProgressSrc => O::wrap(ProgressCodeHandler::new(file_handle, config)),
            FileType::PcieTopology | FileType::CableInfo => {
                O::wrap(PcieInfoHandler::new(file_handle, file_type, config))
            }
            FileType::PspdVpdPddKeyword => O::wrap(KeywordHandler::new(file_handle, config)),
            FileType::ChapData => O::wrap(ChapHandler::new(file_handle, config)),
        };
        Ok(handler)
    }
}
