use wire_codec::{error::EndOfInput, WireFormat};

use crate::{
    crc::{CrcComputeIter, CrcProvider},
    Error, RESPONSE_FLAG, RESPONSE_OVERHEAD,
};

/// Outcome of a request, as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ResponseCode {
    Ok,
    /// The payload makes no sense for the given command.
    InvalidRequest,
    UnsupportedFeature,
    /// The response would not fit a buffer.
    Overflow,
    Busy,
    /// Generic error for all other types of failures.
    FailureToProceed,
}

/// The fixed part preceding a response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResponseHeader {
    pub command: u8,
    pub subfunction: u8,
    pub code: ResponseCode,
    pub length: u16,
}

impl ResponseHeader {
    /// Size of the whole frame announced by this header.
    #[inline]
    pub fn frame_size(&self) -> usize {
        RESPONSE_OVERHEAD + usize::from(self.length)
    }
}

/// A response sent by the device to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Response<'a> {
    /// Command id of the request, without the response flag.
    pub command: u8,
    pub subfunction: u8,
    pub code: ResponseCode,
    pub payload: &'a [u8],
}

impl<'a> Response<'a> {
    pub const fn new(command: u8, subfunction: u8, code: ResponseCode, payload: &'a [u8]) -> Self {
        Self {
            command,
            subfunction,
            code,
            payload,
        }
    }

    /// Size of the rendered frame.
    #[inline]
    pub fn size(&self) -> usize {
        RESPONSE_OVERHEAD + self.payload.len()
    }

    /// Render the response to bytes for transmission,
    /// returning the frame size.
    pub fn render<C: CrcProvider<Rep = u32>>(
        &self,
        dst: &mut [u8],
        crc_provider: &mut C,
    ) -> Result<usize, Error> {
        let length = u16::try_from(self.payload.len()).map_err(|_| Error::LengthMismatch)?;

        if dst.len() < self.size() {
            Err(EndOfInput)?
        }

        let body_size = ResponseHeader::SIZE + self.payload.len();
        dst[ResponseHeader::SIZE..body_size].copy_from_slice(self.payload);

        seal(
            dst,
            ResponseHeader {
                command: self.command,
                subfunction: self.subfunction,
                code: self.code,
                length,
            },
            crc_provider,
        )
    }

    /// Construct the response from a complete frame.
    ///
    /// The provider is left ready for the next frame
    /// whether or not construction succeeds.
    pub fn construct<C: CrcProvider<Rep = u32>>(
        src: &'a [u8],
        crc_provider: &mut C,
    ) -> Result<Self, Error> {
        let result = Self::construct_inner(src, crc_provider);

        if result.is_err() {
            crc_provider.finalize();
        }

        result
    }

    fn construct_inner<C: CrcProvider<Rep = u32>>(
        src: &'a [u8],
        crc_provider: &mut C,
    ) -> Result<Self, Error> {
        let mut iter = src.iter();

        let header = ResponseHeader::decode_iter(CrcComputeIter::new(crc_provider, &mut iter))?;

        if header.command & RESPONSE_FLAG == 0 {
            Err(Error::Direction)?
        }

        if src.len() != header.frame_size() {
            Err(Error::LengthMismatch)?
        }

        let body_size = ResponseHeader::SIZE + usize::from(header.length);
        let payload = &src[ResponseHeader::SIZE..body_size];

        crc_provider.update_slice(payload);
        let computed_crc = crc_provider.finalize();
        let read_crc = u32::decode_exact(&src[body_size..])?;

        if computed_crc != read_crc {
            Err(Error::Crc)?
        }

        Ok(Self {
            command: header.command & !RESPONSE_FLAG,
            subfunction: header.subfunction,
            code: header.code,
            payload,
        })
    }
}

/// Complete a response frame whose payload has
/// already been written in place after the header
/// slot, returning the frame size.
///
/// The response flag is set on the command byte.
pub fn seal<C: CrcProvider<Rep = u32>>(
    buf: &mut [u8],
    header: ResponseHeader,
    crc_provider: &mut C,
) -> Result<usize, Error> {
    let frame_size = header.frame_size();

    if buf.len() < frame_size {
        Err(EndOfInput)?
    }

    let header = ResponseHeader {
        command: header.command | RESPONSE_FLAG,
        ..header
    };
    let body_size = ResponseHeader::SIZE + usize::from(header.length);

    header.encode_slice(buf)?;

    crc_provider.update_slice(&buf[..body_size]);
    crc_provider.finalize().encode_slice(&mut buf[body_size..])?;

    Ok(frame_size)
}
