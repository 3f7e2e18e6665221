use scrutiny_framing::{RequestHeader, REQUEST_OVERHEAD};
use wire_codec::WireFormat;

use crate::timebase::{Timebase, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum State {
    /// Collecting the header, then the rest of the frame.
    Receiving,
    /// Skipping the tail of a frame that cannot fit.
    Discarding {
        header: RequestHeader,
        remaining: usize,
    },
    /// A complete frame waits in the buffer.
    Ready,
    /// A frame was too large and has been skipped.
    Overflowed(RequestHeader),
}

/// Reassembles one request frame at a time out
/// of a byte stream, in a buffer lent by the firmware.
pub struct Reassembler<'a> {
    buf: &'a mut [u8],
    size: usize,
    state: State,
    last_rx: Timestamp,
}

impl<'a> Reassembler<'a> {
    /// The buffer must hold at least an empty request.
    pub fn new(buf: &'a mut [u8]) -> Self {
        debug_assert!(buf.len() >= REQUEST_OVERHEAD);

        Self {
            buf,
            size: 0,
            state: State::Receiving,
            last_rx: Timestamp::ZERO,
        }
    }

    /// Get the capacity (maximum frame size) of the buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Ingest incoming partial request bytes, returning
    /// how many were consumed.
    ///
    /// Nothing is consumed while a complete or skipped
    /// frame waits to be handled.
    pub fn ingest<'b>(&mut self, src: impl IntoIterator<Item = &'b u8>, now: Timestamp) -> usize {
        let mut consumed = 0;

        for &byte in src {
            match self.state {
                State::Ready | State::Overflowed(_) => break,
                State::Receiving => self.push(byte),
                State::Discarding { header, remaining } => {
                    self.state = match remaining - 1 {
                        0 => State::Overflowed(header),
                        remaining => State::Discarding { header, remaining },
                    };
                }
            }

            consumed += 1;
        }

        if consumed != 0 {
            self.last_rx = now;
        }

        consumed
    }

    fn push(&mut self, byte: u8) {
        self.buf[self.size] = byte;
        self.size += 1;

        let Some(header) = self.header() else {
            return;
        };

        let frame_size = header.frame_size();

        if frame_size > self.capacity() {
            trace!("rx: frame of {} bytes cannot fit", frame_size);

            self.size = 0;
            self.state = State::Discarding {
                header,
                remaining: frame_size - RequestHeader::SIZE,
            };
        } else if self.size == frame_size {
            self.state = State::Ready;
        }
    }

    /// The header of the frame being received,
    /// once all of its bytes are in.
    fn header(&self) -> Option<RequestHeader> {
        if self.size < RequestHeader::SIZE {
            return None;
        }

        RequestHeader::decode_iter(&self.buf[..RequestHeader::SIZE]).ok()
    }

    /// The complete frame, if one is waiting.
    pub fn frame(&self) -> Option<&[u8]> {
        matches!(self.state, State::Ready).then(|| &self.buf[..self.size])
    }

    /// The header of a skipped frame, if one is waiting.
    pub fn overflowed(&self) -> Option<RequestHeader> {
        match self.state {
            State::Overflowed(header) => Some(header),
            _ => None,
        }
    }

    /// Whether new bytes would be consumed.
    #[inline]
    pub fn is_receiving(&self) -> bool {
        matches!(self.state, State::Receiving | State::Discarding { .. })
    }

    /// Whether part of a frame has been seen.
    fn in_progress(&self) -> bool {
        match self.state {
            State::Receiving => self.size != 0,
            State::Discarding { .. } => true,
            _ => false,
        }
    }

    /// Drop whatever is held and wait for a new frame.
    pub fn reset(&mut self) {
        self.size = 0;
        self.state = State::Receiving;
    }

    /// Drop a partial frame that stalled for `timeout_us`.
    ///
    /// Returns whether anything was dropped.
    pub fn expire(&mut self, timebase: &Timebase, timeout_us: u32) -> bool {
        if self.in_progress() && timebase.has_expired(self.last_rx, timeout_us) {
            self.reset();

            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrutiny_framing::{Crc32, Request};

    fn render<const N: usize>(request: Request<'_>) -> ([u8; N], usize) {
        let mut buf = [0; N];
        let size = request.render(&mut buf, &mut Crc32::new()).unwrap();

        (buf, size)
    }

    mod ingestion {
        use super::*;

        #[test]
        fn basic() {
            let mut buf = [0u8; 16];
            let mut rx = Reassembler::new(&mut buf);

            let (frame, size) = render::<16>(Request::new(2, 1, &[0xde, 0xad]));

            assert_eq!(size, rx.ingest(&frame[..size], Timestamp::ZERO));
            assert_eq!(Some(&frame[..size]), rx.frame());
            assert!(!rx.is_receiving());
        }

        #[test]
        fn split() {
            let mut buf = [0u8; 16];
            let mut rx = Reassembler::new(&mut buf);

            let (frame, size) = render::<16>(Request::new(2, 1, &[0xde, 0xad]));

            for chunk in frame[..size].chunks(3) {
                assert!(rx.frame().is_none());
                assert_eq!(chunk.len(), rx.ingest(chunk, Timestamp::ZERO));
            }

            assert_eq!(Some(&frame[..size]), rx.frame());
        }

        #[test]
        fn one_in_flight() {
            let mut buf = [0u8; 16];
            let mut rx = Reassembler::new(&mut buf);

            let (frame, size) = render::<16>(Request::new(1, 1, &[]));
            let mut stream = [0u8; 16];
            stream[..size].copy_from_slice(&frame[..size]);
            stream[size..2 * size].copy_from_slice(&frame[..size]);

            assert_eq!(size, rx.ingest(&stream[..2 * size], Timestamp::ZERO));
            assert_eq!(0, rx.ingest(&stream[size..2 * size], Timestamp::ZERO));

            rx.reset();

            assert_eq!(size, rx.ingest(&stream[size..2 * size], Timestamp::ZERO));
            assert!(rx.frame().is_some());
        }

        #[test]
        fn exact_capacity() {
            let mut buf = [0u8; 10];
            let mut rx = Reassembler::new(&mut buf);

            let (frame, size) = render::<10>(Request::new(4, 1, &[1, 2]));

            assert_eq!(10, size);
            assert_eq!(size, rx.ingest(&frame, Timestamp::ZERO));
            assert!(rx.frame().is_some());
        }
    }

    mod overflow {
        use super::*;

        #[test]
        fn skipped() {
            let mut buf = [0u8; 10];
            let mut rx = Reassembler::new(&mut buf);

            let (frame, size) = render::<16>(Request::new(4, 7, &[0; 4]));

            assert_eq!(size - 1, rx.ingest(&frame[..size - 1], Timestamp::ZERO));
            assert!(rx.is_receiving());
            assert!(rx.overflowed().is_none());

            assert_eq!(1, rx.ingest(&frame[size - 1..size], Timestamp::ZERO));

            let header = rx.overflowed().unwrap();
            assert_eq!(4, header.command);
            assert_eq!(7, header.subfunction);
            assert!(rx.frame().is_none());

            // nothing more until handled
            assert_eq!(0, rx.ingest(&frame[..size], Timestamp::ZERO));
        }
    }

    mod timeout {
        use super::*;

        #[test]
        fn partial_dropped() {
            let mut buf = [0u8; 16];
            let mut rx = Reassembler::new(&mut buf);
            let mut timebase = Timebase::new();

            rx.ingest(&[0x01, 0x01], timebase.now());

            timebase.step(499);
            assert!(!rx.expire(&timebase, 50));

            timebase.step(1);
            assert!(rx.expire(&timebase, 50));

            let (frame, size) = render::<16>(Request::new(1, 1, &[]));
            rx.ingest(&frame[..size], timebase.now());
            assert!(rx.frame().is_some());
        }

        #[test]
        fn idle_untouched() {
            let mut buf = [0u8; 16];
            let mut rx = Reassembler::new(&mut buf);
            let mut timebase = Timebase::new();

            timebase.step(1_000_000);

            assert!(!rx.expire(&timebase, 50));
        }

        #[test]
        fn complete_frame_kept() {
            let mut buf = [0u8; 16];
            let mut rx = Reassembler::new(&mut buf);
            let mut timebase = Timebase::new();

            let (frame, size) = render::<16>(Request::new(1, 1, &[]));
            rx.ingest(&frame[..size], timebase.now());

            timebase.step(1_000_000);

            assert!(!rx.expire(&timebase, 50));
            assert!(rx.frame().is_some());
        }
    }
}
