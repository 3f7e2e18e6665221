//! A static, fixed-size, big-endian serialization framework
//! for protocol headers and payloads.

#![no_std]

pub mod big_endian;

// export proc macro
pub use wire_macros::WireFormat;

pub mod error {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct EndOfInput;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Invalid;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Error {
        EndOfInput,
        Invalid,
    }

    impl From<EndOfInput> for Error {
        fn from(_: EndOfInput) -> Self {
            Self::EndOfInput
        }
    }

    impl From<Invalid> for Error {
        fn from(_: Invalid) -> Self {
            Self::Invalid
        }
    }
}

/// Types that have a fixed-size, big-endian
/// representation on the wire.
///
/// Values are written to and read from a byte
/// medium through iterators so that wrappers
/// (e.g. a CRC computing iterator) can observe
/// every byte as it passes.
pub trait WireFormat: Sized {
    /// The exact number of bytes taken by any
    /// value of the implementer type.
    const SIZE: usize;

    /// Encode the implementer type to a
    /// medium via an iterator.
    fn encode_iter<'a>(
        &self,
        dst: impl IntoIterator<Item = &'a mut u8>,
    ) -> Result<(), error::EndOfInput>;

    /// Decode the implementer type from a
    /// medium via an iterator.
    fn decode_iter<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error>;

    /// Encode to the front of `dst`, returning
    /// the number of bytes written.
    fn encode_slice(&self, dst: &mut [u8]) -> Result<usize, error::EndOfInput> {
        self.encode_iter(dst.iter_mut())?;

        Ok(Self::SIZE)
    }

    /// Decode from a slice that must hold
    /// exactly `SIZE` bytes.
    ///
    /// Trailing or missing bytes are reported as
    /// `Invalid` and `EndOfInput` respectively.
    fn decode_exact(src: &[u8]) -> Result<Self, error::Error> {
        if src.len() > Self::SIZE {
            Err(error::Invalid)?
        }

        Self::decode_iter(src)
    }
}
