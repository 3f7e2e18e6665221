use heapless::String;
use scrutiny_framing::{Request, ResponseCode};
use wire_codec::WireFormat;

use crate::{
    config::Config,
    protocol::{
        CommControl, CommParams, Command, ConnectRequest, ConnectResponse, DisconnectRequest,
        DiscoverRequest, DiscoverResponseHead, GetInfo, Heartbeat, SupportedFeatures,
        CONNECT_MAGIC, DISCOVER_MAGIC, DISPLAY_NAME_MAX, PROTOCOL_VERSION, SOFTWARE_ID_SIZE,
    },
    timebase::{Timebase, Timestamp},
    user_command::UserCommandDispatcher,
};

/// Code and payload length of a response whose
/// payload has been written in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reply {
    pub code: ResponseCode,
    pub length: u16,
}

impl Reply {
    /// A response with no payload.
    #[inline]
    pub const fn code(code: ResponseCode) -> Self {
        Self { code, length: 0 }
    }

    #[inline]
    pub const fn ok(length: u16) -> Self {
        Self {
            code: ResponseCode::Ok,
            length,
        }
    }

    /// Encode `payload` as a successful response.
    fn encode(payload: &impl WireFormat, dst: &mut [u8]) -> Self {
        match payload.encode_slice(dst) {
            Ok(size) => Self::ok(size as u16),
            Err(_) => Self::code(ResponseCode::Overflow),
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Session {
    id: u32,
    last_heartbeat: Timestamp,
}

/// Static facts reported to the server.
struct Identity {
    display_name: String<DISPLAY_NAME_MAX>,
    software_id: [u8; SOFTWARE_ID_SIZE],
    params: CommParams,
}

/// Interprets requests and writes response payloads.
pub struct CommandProcessor<'a> {
    identity: Identity,
    session: Option<Session>,
    session_counter: u32,
    user_command: UserCommandDispatcher<'a>,
}

impl<'a> CommandProcessor<'a> {
    /// Take what the processor needs out of `config`.
    ///
    /// Payload sizes are those of validated buffers.
    pub fn new(config: &mut Config<'a>, rx_payload_size: u16, tx_payload_size: u16) -> Self {
        let mut user_command = core::mem::take(&mut config.user_command);
        user_command.set_max_request_length(rx_payload_size);

        Self {
            identity: Identity {
                display_name: config.display_name.clone(),
                software_id: config.software_id,
                params: CommParams {
                    rx_payload_size,
                    tx_payload_size,
                    max_bitrate: config.max_bitrate,
                    heartbeat_timeout_us: config.heartbeat_timeout_us,
                    rx_timeout_us: config.rx_timeout_us,
                    address_size: core::mem::size_of::<usize>() as u8,
                },
            },
            session: None,
            session_counter: 0,
            user_command,
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    #[inline]
    pub fn session_id(&self) -> Option<u32> {
        self.session.map(|session| session.id)
    }

    /// Drop the session if the heartbeat stalled.
    pub fn check_session(&mut self, timebase: &Timebase) {
        let Some(session) = self.session else {
            return;
        };

        if timebase.has_expired(
            session.last_heartbeat,
            self.identity.params.heartbeat_timeout_us,
        ) {
            warn!("session {=u32:#x} timed out", session.id);

            self.session = None;
        }
    }

    /// Handle one request, writing the response payload
    /// to `dst`.
    ///
    /// Returns `None` when the request must be dropped
    /// without a response.
    pub fn process(
        &mut self,
        request: &Request<'_>,
        dst: &mut [u8],
        timebase: &Timebase,
    ) -> Option<Reply> {
        let command = Command::from_id(request.command);

        if !self.is_connected() && !Self::allowed_without_session(command, request.subfunction) {
            warn!(
                "dropping command {} subfunction {} without a session",
                request.command,
                request.subfunction
            );

            return None;
        }

        let Some(command) = command else {
            debug!("unknown command {}", request.command);

            return Some(Reply::code(ResponseCode::UnsupportedFeature));
        };

        let reply = match command {
            Command::GetInfo => self.get_info(request, dst),
            Command::CommControl => self.comm_control(request, dst, timebase),
            Command::UserCommand => self.user_command(request, dst),
            Command::MemoryControl | Command::DatalogControl => {
                Reply::code(ResponseCode::UnsupportedFeature)
            }
        };

        Some(reply)
    }

    fn allowed_without_session(command: Option<Command>, subfunction: u8) -> bool {
        matches!(
            (command, CommControl::from_id(subfunction)),
            (
                Some(Command::CommControl),
                Some(CommControl::Discover | CommControl::Connect)
            )
        )
    }

    fn get_info(&self, request: &Request<'_>, dst: &mut [u8]) -> Reply {
        if !request.payload.is_empty() {
            return Reply::code(ResponseCode::InvalidRequest);
        }

        match GetInfo::from_id(request.subfunction) {
            Some(GetInfo::ProtocolVersion) => Reply::encode(&PROTOCOL_VERSION, dst),
            Some(GetInfo::SoftwareId) => Reply::encode(&self.identity.software_id, dst),
            Some(GetInfo::SupportedFeatures) => {
                let features = SupportedFeatures::default()
                    .with(
                        SupportedFeatures::USER_COMMAND,
                        self.user_command.is_registered(),
                    )
                    .with(
                        SupportedFeatures::ADDRESS_64_BITS,
                        core::mem::size_of::<usize>() == 8,
                    );

                Reply::encode(&features, dst)
            }
            None => Reply::code(ResponseCode::UnsupportedFeature),
        }
    }

    fn comm_control(
        &mut self,
        request: &Request<'_>,
        dst: &mut [u8],
        timebase: &Timebase,
    ) -> Reply {
        let Some(subfunction) = CommControl::from_id(request.subfunction) else {
            return Reply::code(ResponseCode::UnsupportedFeature);
        };

        match subfunction {
            CommControl::Discover => match DiscoverRequest::decode_exact(request.payload) {
                Ok(DiscoverRequest {
                    magic: DISCOVER_MAGIC,
                }) => self.discover(dst),
                _ => Reply::code(ResponseCode::InvalidRequest),
            },
            CommControl::Heartbeat => match Heartbeat::decode_exact(request.payload) {
                Ok(heartbeat) => self.heartbeat(heartbeat, dst, timebase),
                Err(_) => Reply::code(ResponseCode::InvalidRequest),
            },
            CommControl::GetParams if request.payload.is_empty() => {
                Reply::encode(&self.identity.params, dst)
            }
            CommControl::GetParams => Reply::code(ResponseCode::InvalidRequest),
            CommControl::Connect => match ConnectRequest::decode_exact(request.payload) {
                Ok(ConnectRequest {
                    magic: CONNECT_MAGIC,
                }) => self.connect(dst, timebase),
                _ => Reply::code(ResponseCode::InvalidRequest),
            },
            CommControl::Disconnect => match DisconnectRequest::decode_exact(request.payload) {
                Ok(disconnect) => self.disconnect(disconnect),
                Err(_) => Reply::code(ResponseCode::InvalidRequest),
            },
        }
    }

    fn discover(&self, dst: &mut [u8]) -> Reply {
        let name = self.identity.display_name.as_bytes();

        let head = DiscoverResponseHead {
            version: PROTOCOL_VERSION,
            software_id: self.identity.software_id,
            // at most 64 bytes
            name_length: name.len() as u8,
        };

        let length = DiscoverResponseHead::SIZE + name.len();

        if dst.len() < length {
            return Reply::code(ResponseCode::Overflow);
        }

        let Ok(written) = head.encode_slice(dst) else {
            return Reply::code(ResponseCode::Overflow);
        };
        dst[written..length].copy_from_slice(name);

        Reply::ok(length as u16)
    }

    fn heartbeat(&mut self, heartbeat: Heartbeat, dst: &mut [u8], timebase: &Timebase) -> Reply {
        match &mut self.session {
            Some(session) if session.id == heartbeat.session_id => {
                session.last_heartbeat = timebase.now();

                Reply::encode(&heartbeat.answer(), dst)
            }
            _ => {
                warn!(
                    "heartbeat for session {=u32:#x} does not match",
                    heartbeat.session_id
                );

                Reply::code(ResponseCode::InvalidRequest)
            }
        }
    }

    fn connect(&mut self, dst: &mut [u8], timebase: &Timebase) -> Reply {
        if self.is_connected() {
            return Reply::code(ResponseCode::Busy);
        }

        let session = Session {
            id: self.next_session_id(timebase.now()),
            last_heartbeat: timebase.now(),
        };

        let reply = Reply::encode(
            &ConnectResponse {
                magic: CONNECT_MAGIC,
                session_id: session.id,
            },
            dst,
        );

        if reply.code == ResponseCode::Ok {
            info!("session {=u32:#x} opened", session.id);

            self.session = Some(session);
        }

        reply
    }

    fn disconnect(&mut self, disconnect: DisconnectRequest) -> Reply {
        if self.session_id() != Some(disconnect.session_id) {
            warn!(
                "disconnect for session {=u32:#x} does not match",
                disconnect.session_id
            );

            return Reply::code(ResponseCode::InvalidRequest);
        }

        info!("session {=u32:#x} closed", disconnect.session_id);

        self.session = None;

        Reply::ok(0)
    }

    fn user_command(&mut self, request: &Request<'_>, dst: &mut [u8]) -> Reply {
        let max_response_length = u16::try_from(dst.len()).unwrap_or(u16::MAX);

        match self
            .user_command
            .dispatch(request.subfunction, request.payload, dst, max_response_length)
        {
            Ok(length) => Reply::ok(length),
            Err(e) => {
                debug!("user command {} failed: {}", request.subfunction, e);

                Reply::code(e.into())
            }
        }
    }

    /// Mix the clock with a counter so that consecutive
    /// sessions get unrelated ids.
    fn next_session_id(&mut self, now: Timestamp) -> u32 {
        self.session_counter = self.session_counter.wrapping_add(1);

        let ticks = now.ticks();
        let mut x = (ticks as u32)
            ^ ((ticks >> 32) as u32)
            ^ self.session_counter.wrapping_mul(0x9e37_79b9);

        // xorshift32 has no zero state
        if x == 0 {
            x = 0x2545_f491;
        }

        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;

        x
    }
}
