// Licensed under the Apache-2.0 license

use core::fmt::{Display, Formatter};
use core::time::Duration;

// The responder sits on one end of a PLDM socket bound to the host firmware.
// Requests arrive through `PldmSocket::receive` and every response, whether
// produced while dispatching or later by a DMA completion, leaves through
// `PldmSocket::send` on a clone of the same socket.
//
//     Host firmware                     BMC file I/O responder
//          |                                     |
//      PldmSocket                           PldmSocket
// ------------------------------------------------------------
//                         PldmTransport
// ------------------------------------------------------------

pub trait PldmTransport<T: PldmSocket> {
    fn create_socket(&self, source: EndpointId, dest: EndpointId) -> Result<T, PldmTransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PldmTransportError {
    Timeout,
    Disconnected,
    Underflow,
    NotInitialized,
}

pub const MAX_PLDM_PAYLOAD_SIZE: usize = 1024;

pub trait PldmSocket {
    /// Sends one PLDM message to the peer the socket is bound to.
    fn send(&self, payload: &[u8]) -> Result<(), PldmTransportError>;

    /// Waits for the next PLDM message.
    ///
    /// Returns `PldmTransportError::Timeout` when nothing arrived within
    /// `timeout`. `None` blocks until a message or a disconnect.
    fn receive(&self, timeout: Option<Duration>) -> Result<RxPacket, PldmTransportError>;

    fn connect(&self) -> Result<(), PldmTransportError>;

    fn disconnect(&self);

    /// Returns another handle to the same socket.
    fn clone(&self) -> Self;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct EndpointId(pub u8);

#[derive(Debug, Clone)]
pub struct Payload {
    pub data: [u8; MAX_PLDM_PAYLOAD_SIZE],
    pub len: usize,
}

impl Payload {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PldmTransportError> {
        if bytes.len() > MAX_PLDM_PAYLOAD_SIZE {
            return Err(PldmTransportError::Underflow);
        }
        let mut payload = Payload::default();
        payload.data[..bytes.len()].copy_from_slice(bytes);
        payload.len = bytes.len();
        Ok(payload)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self {
            data: [0; MAX_PLDM_PAYLOAD_SIZE],
            len: 0,
        }
    }
}

impl Display for Payload {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "Payload {{ data: {:?}, len: {} }}", self.as_bytes(), self.len)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TxPacket {
    pub src: EndpointId,
    pub dest: EndpointId,
    pub payload: Payload,
}

#[derive(Debug, Clone, Default)]
pub struct RxPacket {
    pub src: EndpointId,
    pub payload: Payload,
}

impl Display for RxPacket {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "RxPacket {{ src: {:?}, payload: {} }}",
            self.src, self.payload
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_from_slice() {
        let payload = Payload::from_slice(&[1, 2, 3]).unwrap();
        assert_eq!(payload.as_bytes(), &[1, 2, 3]);
        assert_eq!(
            Payload::from_slice(&[0u8; MAX_PLDM_PAYLOAD_SIZE + 1]).unwrap_err(),
            PldmTransportError::Underflow
        );
    }
}
