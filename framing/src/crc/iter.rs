use super::CrcProvider;

/// An iterator wrapper that computes
/// the CRC of the bytes iterated over.
pub(crate) struct CrcComputeIter<'a, 'b, C, I>
where
    C: CrcProvider,
    I: Iterator<Item = &'b u8>,
{
    crc_provider: &'a mut C,
    iter: &'a mut I,
}

impl<'a, 'b, C, I> CrcComputeIter<'a, 'b, C, I>
where
    C: CrcProvider,
    I: Iterator<Item = &'b u8>,
{
    pub fn new(crc_provider: &'a mut C, iter: &'a mut I) -> Self {
        Self { crc_provider, iter }
    }
}

impl<'a, 'b, C, I> Iterator for CrcComputeIter<'a, 'b, C, I>
where
    C: CrcProvider,
    I: Iterator<Item = &'b u8>,
{
    type Item = &'b u8;

    fn next(&mut self) -> Option<Self::Item> {
        let byte = self.iter.next()?;

        self.crc_provider.update(byte);

        Some(byte)
    }
}
