use crc::{Crc, Digest, CRC_32_ISO_HDLC};
use wire_codec::WireFormat;

mod iter;

pub(crate) use iter::CrcComputeIter;

/// Describes types that can provide
/// a CRC computation.
pub trait CrcProvider {
    type Rep: WireFormat + Eq + Copy;

    fn update(&mut self, byte: &u8);
    fn finalize(&mut self) -> Self::Rep;

    /// Feed a whole slice.
    fn update_slice(&mut self, bytes: &[u8]) {
        bytes.iter().for_each(|byte| self.update(byte));
    }
}

static CRC_32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// The CRC32 guarding every Scrutiny frame
/// (reflected 0xEDB88320, init and xorout 0xFFFFFFFF).
pub struct Crc32 {
    digest: Digest<'static, u32>,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    pub fn new() -> Self {
        Self {
            digest: CRC_32.digest(),
        }
    }

    /// One-shot CRC of a byte slice.
    pub fn checksum(bytes: &[u8]) -> u32 {
        CRC_32.checksum(bytes)
    }
}

impl CrcProvider for Crc32 {
    type Rep = u32;

    fn update(&mut self, byte: &u8) {
        self.digest.update(core::slice::from_ref(byte));
    }

    fn update_slice(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    /// Produce the CRC and restart the
    /// provider for the next frame.
    fn finalize(&mut self) -> Self::Rep {
        core::mem::replace(&mut self.digest, CRC_32.digest()).finalize()
    }
}
