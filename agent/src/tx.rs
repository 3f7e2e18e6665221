use scrutiny_framing::{response, Crc32, Error, ResponseHeader, CRC_SIZE, RESPONSE_OVERHEAD};
use wire_codec::WireFormat;

/// Holds one outgoing response frame in a buffer
/// lent by the firmware, and hands it out in pieces.
pub struct Transmitter<'a> {
    buf: &'a mut [u8],
    size: usize,
    cursor: usize,
}

impl<'a> Transmitter<'a> {
    /// The buffer must hold at least an empty response.
    pub fn new(buf: &'a mut [u8]) -> Self {
        debug_assert!(buf.len() >= RESPONSE_OVERHEAD);

        Self {
            buf,
            size: 0,
            cursor: 0,
        }
    }

    /// The largest payload a response can carry.
    #[inline]
    pub fn payload_capacity(&self) -> usize {
        self.buf.len() - RESPONSE_OVERHEAD
    }

    /// Where the payload of the next response is written.
    pub fn payload_area(&mut self) -> &mut [u8] {
        let end = self.buf.len() - CRC_SIZE;

        &mut self.buf[ResponseHeader::SIZE..end]
    }

    /// Frame the payload currently in place.
    pub fn seal(&mut self, header: ResponseHeader) -> Result<(), Error> {
        self.size = response::seal(self.buf, header, &mut Crc32::new())?;
        self.cursor = 0;

        Ok(())
    }

    /// Bytes of the current frame not yet popped.
    #[inline]
    pub fn pending(&self) -> usize {
        self.size - self.cursor
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Copy as many pending bytes as fit in `dst`.
    pub fn pop(&mut self, dst: &mut [u8]) -> usize {
        let count = self.pending().min(dst.len());

        dst[..count].copy_from_slice(&self.buf[self.cursor..self.cursor + count]);
        self.cursor += count;

        if self.cursor == self.size {
            self.size = 0;
            self.cursor = 0;
        }

        count
    }
}
