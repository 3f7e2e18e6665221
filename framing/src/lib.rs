//! Request/response framing of the Scrutiny embedded protocol.
//!
//! Every frame is a small big-endian header, an opaque payload
//! and a trailing CRC32 covering everything before it.

#![no_std]

pub mod crc;
pub mod request;
pub mod response;

pub use crc::{Crc32, CrcProvider};
pub use request::{Request, RequestHeader};
pub use response::{Response, ResponseCode, ResponseHeader};

use wire_codec::WireFormat;

/// Size of the trailing CRC.
pub const CRC_SIZE: usize = <u32 as WireFormat>::SIZE;

/// Bytes a request frame adds around its payload.
pub const REQUEST_OVERHEAD: usize = <RequestHeader as WireFormat>::SIZE + CRC_SIZE;

/// Bytes a response frame adds around its payload.
pub const RESPONSE_OVERHEAD: usize = <ResponseHeader as WireFormat>::SIZE + CRC_SIZE;

/// Set on the command byte of responses,
/// clear on requests.
pub const RESPONSE_FLAG: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    Codec(wire_codec::error::Error),
    /// The length field does not match the bytes present.
    LengthMismatch,
    /// A response was found where a request was expected, or the reverse.
    Direction,
    Crc,
}

impl From<wire_codec::error::Error> for Error {
    fn from(value: wire_codec::error::Error) -> Self {
        Self::Codec(value)
    }
}

impl From<wire_codec::error::EndOfInput> for Error {
    fn from(value: wire_codec::error::EndOfInput) -> Self {
        Self::Codec(value.into())
    }
}
