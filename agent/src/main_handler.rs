use scrutiny_framing::{Crc32, Request, ResponseCode, ResponseHeader};

use crate::{
    command_processor::{CommandProcessor, Reply},
    config::{Config, ConfigError},
    rx::Reassembler,
    timebase::Timebase,
    tx::Transmitter,
};

/// The agent a firmware drives from its main loop.
///
/// Bytes come in through [`receive_data`](Self::receive_data),
/// requests are handled in [`process`](Self::process) and
/// responses leave through [`pop_data`](Self::pop_data).
pub struct MainHandler<'a> {
    rx: Reassembler<'a>,
    tx: Transmitter<'a>,
    timebase: Timebase,
    processor: CommandProcessor<'a>,
    rx_timeout_us: u32,
}

impl<'a> MainHandler<'a> {
    /// Validate `config` and start the agent.
    pub fn init(mut config: Config<'a>) -> Result<Self, ConfigError> {
        config.validate()?;

        let (Some(rx_buffer), Some(tx_buffer)) = (config.rx_buffer.take(), config.tx_buffer.take())
        else {
            return Err(ConfigError::MissingBuffers);
        };

        let rx = Reassembler::new(rx_buffer);
        let tx = Transmitter::new(tx_buffer);

        // bounded by validation
        let rx_payload_size = (rx.capacity() - scrutiny_framing::REQUEST_OVERHEAD) as u16;
        let tx_payload_size = tx.payload_capacity() as u16;

        let processor = CommandProcessor::new(&mut config, rx_payload_size, tx_payload_size);

        info!(
            "agent ready, rx payload {} tx payload {}",
            rx_payload_size,
            tx_payload_size
        );

        Ok(Self {
            rx,
            tx,
            timebase: Timebase::new(),
            processor,
            rx_timeout_us: config.rx_timeout_us,
        })
    }

    /// Feed bytes received from the link, returning
    /// how many were consumed.
    ///
    /// Nothing is consumed while a request is pending or its
    /// response has not been fully popped. Bytes left over must
    /// be offered again after that.
    pub fn receive_data(&mut self, data: &[u8]) -> usize {
        if !self.is_receiving() {
            return 0;
        }

        self.rx.ingest(data, self.timebase.now())
    }

    /// Whether [`receive_data`](Self::receive_data)
    /// would consume anything.
    #[inline]
    pub fn is_receiving(&self) -> bool {
        self.tx.is_idle() && self.rx.is_receiving()
    }

    /// Advance time by `timestep_100ns` and handle
    /// the pending request, if any.
    pub fn process(&mut self, timestep_100ns: u32) {
        self.timebase.step(timestep_100ns);

        if self.rx.expire(&self.timebase, self.rx_timeout_us) {
            warn!("partial request timed out");
        }

        self.processor.check_session(&self.timebase);

        // one response at a time
        if !self.tx.is_idle() {
            return;
        }

        if let Some(header) = self.rx.overflowed() {
            warn!(
                "request {} {} overflows the receive buffer",
                header.command,
                header.subfunction
            );

            if self.processor.is_connected() {
                self.respond(
                    header.command,
                    header.subfunction,
                    Reply::code(ResponseCode::Overflow),
                );
            }

            self.rx.reset();

            return;
        }

        let Some(frame) = self.rx.frame() else {
            return;
        };

        let outcome = match Request::construct(frame, &mut Crc32::new()) {
            Ok(request) => {
                trace!("request {} {}", request.command, request.subfunction);

                self.processor
                    .process(&request, self.tx.payload_area(), &self.timebase)
                    .map(|reply| (request.command, request.subfunction, reply))
            }
            Err(e) => {
                warn!("dropping malformed request: {}", e);

                None
            }
        };

        self.rx.reset();

        if let Some((command, subfunction, reply)) = outcome {
            self.respond(command, subfunction, reply);
        }
    }

    /// Frame a response whose payload is in place.
    fn respond(&mut self, command: u8, subfunction: u8, reply: Reply) {
        let header = ResponseHeader {
            command,
            subfunction,
            code: reply.code,
            length: reply.length,
        };

        if let Err(e) = self.tx.seal(header) {
            error!("response could not be framed: {}", e);
        }
    }

    /// Bytes waiting to be transmitted.
    #[inline]
    pub fn data_to_send(&self) -> usize {
        self.tx.pending()
    }

    /// Copy pending bytes to `dst`, returning how many.
    pub fn pop_data(&mut self, dst: &mut [u8]) -> usize {
        self.tx.pop(dst)
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.processor.is_connected()
    }

    #[inline]
    pub fn session_id(&self) -> Option<u32> {
        self.processor.session_id()
    }

    /// Time elapsed since `init`.
    #[inline]
    pub fn timebase(&self) -> &Timebase {
        &self.timebase
    }
}
