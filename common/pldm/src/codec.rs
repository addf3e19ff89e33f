// Licensed under the Apache-2.0 license

use zerocopy::{FromBytes, Immutable, IntoBytes};

#[derive(Debug, PartialEq)]
pub enum PldmCodecError {
    BufferTooShort,
    Unsupported,
}

/// Conversion between a PLDM message and its wire bytes.
///
/// Fixed-layout messages get this for free through zerocopy. Messages with a
/// variable tail, such as a ReadFileByType response carrying file data,
/// implement it by hand.
pub trait PldmCodec: core::fmt::Debug + Sized {
    /// Writes the message to the front of `buffer` and returns the number of
    /// bytes written.
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, PldmCodecError>;

    /// Reads a message from the front of `buffer`. Trailing bytes are ignored.
    fn decode(buffer: &[u8]) -> Result<Self, PldmCodecError>;
}

impl<T> PldmCodec for T
where
    T: core::fmt::Debug + Sized + FromBytes + IntoBytes + Immutable,
{
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, PldmCodecError> {
        self.write_to_prefix(buffer)
            .map_err(|_| PldmCodecError::BufferTooShort)
            .map(|_| core::mem::size_of::<T>())
    }

    fn decode(buffer: &[u8]) -> Result<Self, PldmCodecError> {
        let (message, _rest) =
            Self::read_from_prefix(buffer).map_err(|_| PldmCodecError::BufferTooShort)?;
        Ok(message)
    }
}
