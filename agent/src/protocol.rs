//! Command ids, subfunctions and payload layouts
//! understood by the agent.

use scrutiny_framing::ResponseCode;
use wire_codec::WireFormat;

use crate::user_command::error::{DispatchError, UserCommandError};

pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion { major: 1, minor: 0 };

/// Payload of a Discover request.
pub const DISCOVER_MAGIC: [u8; 4] = [0x7e, 0x18, 0xfc, 0x68];

/// Payload of a Connect request, echoed in its response.
pub const CONNECT_MAGIC: [u8; 4] = [0x82, 0x90, 0x22, 0x66];

pub const SOFTWARE_ID_SIZE: usize = 16;

pub const DISPLAY_NAME_MAX: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    GetInfo = 1,
    CommControl,
    MemoryControl,
    UserCommand,
    DatalogControl,
}

impl Command {
    /// Look up a command by its wire id.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::decode_exact(&[id]).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommControl {
    Discover = 1,
    Heartbeat,
    GetParams,
    Connect,
    Disconnect,
}

impl CommControl {
    pub fn from_id(id: u8) -> Option<Self> {
        Self::decode_exact(&[id]).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum GetInfo {
    ProtocolVersion = 1,
    SoftwareId,
    SupportedFeatures,
}

impl GetInfo {
    pub fn from_id(id: u8) -> Option<Self> {
        Self::decode_exact(&[id]).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoverRequest {
    pub magic: [u8; 4],
}

/// Fixed part of a Discover response,
/// followed by the display name bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoverResponseHead {
    pub version: ProtocolVersion,
    pub software_id: [u8; SOFTWARE_ID_SIZE],
    pub name_length: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Heartbeat {
    pub session_id: u32,
    pub challenge: u16,
}

impl Heartbeat {
    /// The answer the server expects.
    #[inline]
    pub fn answer(&self) -> Self {
        Self {
            session_id: self.session_id,
            challenge: !self.challenge,
        }
    }
}

/// Link parameters reported by GetParams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommParams {
    /// Largest request payload.
    pub rx_payload_size: u16,
    /// Largest response payload.
    pub tx_payload_size: u16,
    /// Bits per second, 0 when unlimited.
    pub max_bitrate: u32,
    pub heartbeat_timeout_us: u32,
    pub rx_timeout_us: u32,
    /// Size of a memory address in bytes.
    pub address_size: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectRequest {
    pub magic: [u8; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectResponse {
    pub magic: [u8; 4],
    pub session_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisconnectRequest {
    pub session_id: u32,
}

/// Feature bitfield reported by GetInfo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, WireFormat)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SupportedFeatures(pub u8);

impl SupportedFeatures {
    pub const MEMORY_WRITE: u8 = 0x80;
    pub const DATALOGGING: u8 = 0x40;
    pub const USER_COMMAND: u8 = 0x20;
    pub const ADDRESS_64_BITS: u8 = 0x10;

    #[inline]
    pub fn with(self, flag: u8, enabled: bool) -> Self {
        if enabled {
            Self(self.0 | flag)
        } else {
            self
        }
    }

    #[inline]
    pub fn contains(&self, flag: u8) -> bool {
        self.0 & flag == flag
    }
}

impl From<DispatchError> for ResponseCode {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::NoHandler => Self::UnsupportedFeature,
            DispatchError::Overflow => Self::Overflow,
            DispatchError::MalformedRequest => Self::InvalidRequest,
            DispatchError::Handler(UserCommandError::InvalidRequest) => Self::InvalidRequest,
            DispatchError::Handler(UserCommandError::Overflow) => Self::Overflow,
            DispatchError::Handler(
                UserCommandError::UnknownSubfunction | UserCommandError::Failure,
            ) => Self::FailureToProceed,
        }
    }
}
