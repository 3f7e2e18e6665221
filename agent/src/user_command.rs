//! User command dispatch.
//!
//! A firmware can install exactly one handler that a remote client
//! invokes by subfunction, passing opaque bytes in and receiving
//! opaque bytes out. The handler runs synchronously inside
//! [`MainHandler::process`](crate::MainHandler::process): the agent,
//! and whatever loop calls it, is stalled for the whole call. Keep
//! handlers short on targets with real-time constraints.

pub mod error {
    /// A write would exceed the response capacity.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Overflow;

    /// Failures a handler may report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum UserCommandError {
        UnknownSubfunction,
        InvalidRequest,
        Overflow,
        Failure,
    }

    impl From<Overflow> for UserCommandError {
        fn from(_: Overflow) -> Self {
            Self::Overflow
        }
    }

    /// Reasons a dispatch produced no response bytes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum DispatchError {
        NoHandler,
        /// The handler attempted to write past the maximum length.
        Overflow,
        MalformedRequest,
        Handler(UserCommandError),
    }

    impl From<UserCommandError> for DispatchError {
        fn from(value: UserCommandError) -> Self {
            Self::Handler(value)
        }
    }
}

use error::{DispatchError, Overflow, UserCommandError};

/// A bounded output buffer lent to a handler.
///
/// Writes past the capacity are rejected whole and
/// remembered, so the response is discarded even if
/// the handler ignores the error.
pub struct ResponseBuffer<'a> {
    buf: &'a mut [u8],
    len: usize,
    overflowed: bool,
}

impl<'a> ResponseBuffer<'a> {
    /// Lend at most `u16::MAX` bytes of `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        let capacity = buf.len().min(usize::from(u16::MAX));

        Self {
            buf: &mut buf[..capacity],
            len: 0,
            overflowed: false,
        }
    }

    /// The maximum response length.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes that can still be written.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.len
    }

    /// Whether a write has been rejected.
    #[inline]
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn push(&mut self, byte: u8) -> Result<(), Overflow> {
        self.extend_from_slice(core::slice::from_ref(&byte))
    }

    /// Append all of `bytes`, or nothing.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), Overflow> {
        if bytes.len() > self.remaining() {
            self.overflowed = true;
            Err(Overflow)?
        }

        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();

        Ok(())
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Drop written bytes. A rejected write
    /// stays recorded.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

/// Signature of a plain function handler.
pub type UserCommandFn =
    fn(u8, &[u8], &mut ResponseBuffer<'_>) -> Result<(), UserCommandError>;

/// The embedded-side logic behind user commands.
pub trait UserCommandHandler {
    /// Handle one request.
    ///
    /// Unrecognized subfunctions should be reported with
    /// [`UserCommandError::UnknownSubfunction`] rather than ignored.
    fn handle(
        &mut self,
        subfunction: u8,
        request: &[u8],
        response: &mut ResponseBuffer<'_>,
    ) -> Result<(), UserCommandError>;
}

impl<F> UserCommandHandler for F
where
    F: FnMut(u8, &[u8], &mut ResponseBuffer<'_>) -> Result<(), UserCommandError>,
{
    fn handle(
        &mut self,
        subfunction: u8,
        request: &[u8],
        response: &mut ResponseBuffer<'_>,
    ) -> Result<(), UserCommandError> {
        self(subfunction, request, response)
    }
}

enum Slot<'a> {
    Function(UserCommandFn),
    Handler(&'a mut dyn UserCommandHandler),
}

/// Holds the single registered handler and invokes it.
pub struct UserCommandDispatcher<'a> {
    slot: Option<Slot<'a>>,
    max_request_length: u16,
}

impl Default for UserCommandDispatcher<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> UserCommandDispatcher<'a> {
    pub fn new() -> Self {
        Self {
            slot: None,
            max_request_length: u16::MAX,
        }
    }

    /// Reject requests longer than `length`.
    ///
    /// Defaults to `u16::MAX`.
    pub fn set_max_request_length(&mut self, length: u16) {
        self.max_request_length = length;
    }

    #[inline]
    pub fn max_request_length(&self) -> u16 {
        self.max_request_length
    }

    /// Install a stateful handler, replacing any previous one.
    pub fn register(&mut self, handler: &'a mut dyn UserCommandHandler) {
        self.slot = Some(Slot::Handler(handler));
    }

    /// Install a plain function, replacing any previous handler.
    pub fn register_fn(&mut self, callback: UserCommandFn) {
        self.slot = Some(Slot::Function(callback));
    }

    pub fn unregister(&mut self) {
        self.slot = None;
    }

    #[inline]
    pub fn is_registered(&self) -> bool {
        self.slot.is_some()
    }

    /// Invoke the handler for `subfunction`.
    ///
    /// The handler writes into `response`, limited to
    /// `max_response_length` bytes. On success the response
    /// length is returned; on error no bytes are considered
    /// written.
    pub fn dispatch(
        &mut self,
        subfunction: u8,
        request: &[u8],
        response: &mut [u8],
        max_response_length: u16,
    ) -> Result<u16, DispatchError> {
        if request.len() > usize::from(self.max_request_length) {
            Err(DispatchError::MalformedRequest)?
        }

        let slot = self.slot.as_mut().ok_or(DispatchError::NoHandler)?;

        let capacity = response.len().min(usize::from(max_response_length));
        let mut writer = ResponseBuffer::new(&mut response[..capacity]);

        let result = match slot {
            Slot::Function(callback) => (*callback)(subfunction, request, &mut writer),
            Slot::Handler(handler) => handler.handle(subfunction, request, &mut writer),
        };

        // a rejected write outranks what the handler reports
        if writer.overflowed() {
            Err(DispatchError::Overflow)?
        }

        result?;

        // capacity never exceeds `max_response_length`
        Ok(writer.len() as u16)
    }
}
