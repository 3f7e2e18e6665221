//! Drives a [`MainHandler`] over an async byte port.

use core::future::Future;

use embassy_futures::select::{select, Either};
use embedded_io_async::{BufRead, ErrorType, Write};

use crate::MainHandler;

/// Size of the chunks popped from the agent before writing.
const CHUNK_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError<E> {
    Port(E),
    /// The port reported end of stream.
    Closed,
}

impl<E> From<E> for LinkError<E> {
    fn from(value: E) -> Self {
        Self::Port(value)
    }
}

/// Connects an agent to a port.
pub struct Link<Port>
where
    Port: BufRead + Write,
{
    port: Port,
}

impl<Port> Link<Port>
where
    Port: BufRead + Write,
{
    pub const fn new(port: Port) -> Self {
        Self { port }
    }

    pub fn into_inner(self) -> Port {
        self.port
    }

    /// Wait for either incoming bytes or `tick`, handle
    /// whichever comes first, then flush the response.
    ///
    /// `tick` resolves to the timestep in 100 ns units.
    /// While a request waits to be processed or its
    /// response to be sent, the port is not read.
    pub async fn poll<Tick>(
        &mut self,
        agent: &mut MainHandler<'_>,
        tick: Tick,
    ) -> Result<(), LinkError<<Port as ErrorType>::Error>>
    where
        Tick: Future<Output = u32>,
    {
        if agent.is_receiving() {
            let event = select(self.port.fill_buf(), tick).await;

            match event {
                Either::First(read) => {
                    let available = read?;

                    if available.is_empty() {
                        return Err(LinkError::Closed);
                    }

                    let consumed = agent.receive_data(available);
                    self.port.consume(consumed);
                }
                Either::Second(timestep) => agent.process(timestep),
            }
        } else {
            agent.process(tick.await);
        }

        self.flush(agent).await
    }

    async fn flush(
        &mut self,
        agent: &mut MainHandler<'_>,
    ) -> Result<(), LinkError<<Port as ErrorType>::Error>> {
        if agent.data_to_send() == 0 {
            return Ok(());
        }

        let mut chunk = [0u8; CHUNK_SIZE];

        while agent.data_to_send() != 0 {
            let count = agent.pop_data(&mut chunk);
            self.port.write_all(&chunk[..count]).await?;
        }

        self.port.flush().await?;

        Ok(())
    }

    /// Poll forever, with a fresh tick from `tick` each
    /// time, until the port fails.
    pub async fn run<F, Tick>(
        &mut self,
        agent: &mut MainHandler<'_>,
        mut tick: F,
    ) -> LinkError<<Port as ErrorType>::Error>
    where
        F: FnMut() -> Tick,
        Tick: Future<Output = u32>,
    {
        loop {
            if let Err(e) = self.poll(agent, tick()).await {
                error!("link stopped");

                break e;
            }
        }
    }
}
