use heapless::String;
use scrutiny_framing::{REQUEST_OVERHEAD, RESPONSE_OVERHEAD};

use crate::{
    protocol::{DISPLAY_NAME_MAX, SOFTWARE_ID_SIZE},
    user_command::{UserCommandDispatcher, UserCommandFn, UserCommandHandler},
};

pub const DEFAULT_HEARTBEAT_TIMEOUT_US: u32 = 3_000_000;
pub const DEFAULT_RX_TIMEOUT_US: u32 = 50_000;

/// Smallest receive buffer: a Heartbeat request.
pub const MIN_RX_BUFFER_SIZE: usize = REQUEST_OVERHEAD + 8;

/// Smallest transmit buffer: a Discover response without a name.
pub const MIN_TX_BUFFER_SIZE: usize = RESPONSE_OVERHEAD + 32;

pub const MAX_RX_BUFFER_SIZE: usize = REQUEST_OVERHEAD + u16::MAX as usize;
pub const MAX_TX_BUFFER_SIZE: usize = RESPONSE_OVERHEAD + u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    MissingBuffers,
    RxBufferTooSmall,
    TxBufferTooSmall,
    RxBufferTooLarge,
    TxBufferTooLarge,
    DisplayNameTooLong,
}

/// Everything the firmware decides before
/// starting the agent.
pub struct Config<'a> {
    pub(crate) rx_buffer: Option<&'a mut [u8]>,
    pub(crate) tx_buffer: Option<&'a mut [u8]>,
    pub(crate) user_command: UserCommandDispatcher<'a>,
    pub(crate) display_name: String<DISPLAY_NAME_MAX>,
    display_name_too_long: bool,
    pub(crate) software_id: [u8; SOFTWARE_ID_SIZE],
    pub(crate) max_bitrate: u32,
    pub(crate) heartbeat_timeout_us: u32,
    pub(crate) rx_timeout_us: u32,
}

impl Default for Config<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Config<'a> {
    pub fn new() -> Self {
        Self {
            rx_buffer: None,
            tx_buffer: None,
            user_command: UserCommandDispatcher::new(),
            display_name: String::new(),
            display_name_too_long: false,
            software_id: [0; SOFTWARE_ID_SIZE],
            max_bitrate: 0,
            heartbeat_timeout_us: DEFAULT_HEARTBEAT_TIMEOUT_US,
            rx_timeout_us: DEFAULT_RX_TIMEOUT_US,
        }
    }

    /// Lend the receive and transmit regions to the agent.
    pub fn set_buffers(&mut self, rx: &'a mut [u8], tx: &'a mut [u8]) {
        self.rx_buffer = Some(rx);
        self.tx_buffer = Some(tx);
    }

    /// Install a plain function as the user command handler,
    /// replacing any previous one.
    pub fn set_user_command_callback(&mut self, callback: UserCommandFn) {
        self.user_command.register_fn(callback);
    }

    /// Install a stateful user command handler,
    /// replacing any previous one.
    pub fn set_user_command_handler(&mut self, handler: &'a mut dyn UserCommandHandler) {
        self.user_command.register(handler);
    }

    /// Set the name reported by Discover.
    ///
    /// A name over 64 bytes is reported by `MainHandler::init`.
    pub fn set_display_name(&mut self, name: &str) {
        self.display_name.clear();
        self.display_name_too_long = self.display_name.push_str(name).is_err();
    }

    #[inline]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Identifies the firmware build to the server.
    pub fn set_software_id(&mut self, software_id: [u8; SOFTWARE_ID_SIZE]) {
        self.software_id = software_id;
    }

    /// Bits per second the server should not exceed, 0 for no limit.
    pub fn set_max_bitrate(&mut self, max_bitrate: u32) {
        self.max_bitrate = max_bitrate;
    }

    /// The session is dropped when no heartbeat arrives
    /// for this long. Zero disables the timeout.
    pub fn set_heartbeat_timeout_us(&mut self, timeout_us: u32) {
        self.heartbeat_timeout_us = timeout_us;
    }

    /// A partial request is dropped when no byte arrives
    /// for this long. Zero disables the timeout.
    pub fn set_rx_timeout_us(&mut self, timeout_us: u32) {
        self.rx_timeout_us = timeout_us;
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let (Some(rx), Some(tx)) = (&self.rx_buffer, &self.tx_buffer) else {
            return Err(ConfigError::MissingBuffers);
        };

        if rx.len() < MIN_RX_BUFFER_SIZE {
            Err(ConfigError::RxBufferTooSmall)?
        }

        if rx.len() > MAX_RX_BUFFER_SIZE {
            Err(ConfigError::RxBufferTooLarge)?
        }

        if tx.len() < MIN_TX_BUFFER_SIZE {
            Err(ConfigError::TxBufferTooSmall)?
        }

        if tx.len() > MAX_TX_BUFFER_SIZE {
            Err(ConfigError::TxBufferTooLarge)?
        }

        if self.display_name_too_long {
            Err(ConfigError::DisplayNameTooLong)?
        }

        Ok(())
    }
}
