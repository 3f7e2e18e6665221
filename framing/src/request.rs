use wire_codec::{error::EndOfInput, WireFormat};

use crate::{
    crc::{CrcComputeIter, CrcProvider},
    Error, REQUEST_OVERHEAD, RESPONSE_FLAG,
};

/// The fixed part preceding a request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RequestHeader {
    pub command: u8,
    pub subfunction: u8,
    pub length: u16,
}

impl RequestHeader {
    /// Size of the whole frame announced by this header.
    #[inline]
    pub fn frame_size(&self) -> usize {
        REQUEST_OVERHEAD + usize::from(self.length)
    }

    /// Whether the command byte flags a response.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.command & RESPONSE_FLAG != 0
    }
}

/// A request sent by the server to the device.
///
/// The payload borrows the frame it was constructed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Request<'a> {
    pub command: u8,
    pub subfunction: u8,
    pub payload: &'a [u8],
}

impl<'a> Request<'a> {
    pub const fn new(command: u8, subfunction: u8, payload: &'a [u8]) -> Self {
        Self {
            command,
            subfunction,
            payload,
        }
    }

    /// Size of the rendered frame.
    #[inline]
    pub fn size(&self) -> usize {
        REQUEST_OVERHEAD + self.payload.len()
    }

    /// Render the request to bytes for transmission,
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

        let header = RequestHeader {
            command: self.command & !RESPONSE_FLAG,
            subfunction: self.subfunction,
            length,
        };
        let body_size = RequestHeader::SIZE + self.payload.len();

        header.encode_slice(dst)?;
        dst[RequestHeader::SIZE..body_size].copy_from_slice(self.payload);

        crc_provider.update_slice(&dst[..body_size]);
        crc_provider.finalize().encode_slice(&mut dst[body_size..])?;

        Ok(self.size())
    }

    /// Construct the request from a complete frame.
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

        let header = RequestHeader::decode_iter(CrcComputeIter::new(crc_provider, &mut iter))?;

        if header.is_response() {
            Err(Error::Direction)?
        }

        if src.len() != header.frame_size() {
            Err(Error::LengthMismatch)?
        }

        let body_size = RequestHeader::SIZE + usize::from(header.length);
        let payload = &src[RequestHeader::SIZE..body_size];

        crc_provider.update_slice(payload);
        let computed_crc = crc_provider.finalize();
        let read_crc = u32::decode_exact(&src[body_size..])?;

        if computed_crc != read_crc {
            Err(Error::Crc)?
        }

        Ok(Self {
            command: header.command,
            subfunction: header.subfunction,
            payload,
        })
    }
}
