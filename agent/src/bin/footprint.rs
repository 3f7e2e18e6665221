#![no_std]
#![no_main]

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use panic_halt as _;

use cortex_m::peripheral::DWT;
use cortex_m_rt::entry;
use scrutiny_agent::{Config, MainHandler, ResponseBuffer, UserCommandError};

const CPU_HZ: u32 = 64_000_000;
const TICKS_PER_SECOND: u32 = 10_000_000;

// single byte mailboxes standing in for a UART
static RX_BYTE: AtomicU8 = AtomicU8::new(0);
static RX_READY: AtomicBool = AtomicBool::new(false);
static TX_BYTE: AtomicU8 = AtomicU8::new(0);
static TX_READY: AtomicBool = AtomicBool::new(false);

#[inline(never)]
fn user_command(
    subfunction: u8,
    request: &[u8],
    response: &mut ResponseBuffer<'_>,
) -> Result<(), UserCommandError> {
    match subfunction {
        1 => response.extend_from_slice(&[0xaa, 0xbb, 0xcc])?,
        2 => response.extend_from_slice(request)?,
        _ => Err(UserCommandError::UnknownSubfunction)?,
    }

    Ok(())
}

/// Convert elapsed cycles to 100 ns ticks,
/// carrying the remainder.
fn timestep(cycles: u32, carry: &mut u64) -> u32 {
    let scaled = u64::from(cycles) * u64::from(TICKS_PER_SECOND) + *carry;
    *carry = scaled % u64::from(CPU_HZ);

    (scaled / u64::from(CPU_HZ)).min(u64::from(u32::MAX)) as u32
}

#[entry]
fn main() -> ! {
    let Some(mut peripherals) = cortex_m::Peripherals::take() else {
        loop {}
    };

    peripherals.DCB.enable_trace();
    peripherals.DWT.enable_cycle_counter();

    let mut rx_buffer = [0u8; 64];
    let mut tx_buffer = [0u8; 128];

    let mut config = Config::new();
    config.set_buffers(&mut rx_buffer, &mut tx_buffer);
    config.set_user_command_callback(user_command);
    config.set_display_name("footprint");
    config.set_max_bitrate(115_200);

    let Ok(mut agent) = MainHandler::init(config) else {
        loop {}
    };

    let mut last = DWT::cycle_count();
    let mut carry = 0;

    loop {
        if RX_READY.load(Ordering::Acquire) {
            let byte = RX_BYTE.load(Ordering::Relaxed);

            if agent.receive_data(&[byte]) == 1 {
                RX_READY.store(false, Ordering::Release);
            }
        }

        let now = DWT::cycle_count();
        agent.process(timestep(now.wrapping_sub(last), &mut carry));
        last = now;

        if !TX_READY.load(Ordering::Acquire) {
            let mut byte = [0u8];

            if agent.pop_data(&mut byte) == 1 {
                TX_BYTE.store(byte[0], Ordering::Relaxed);
                TX_READY.store(true, Ordering::Release);
            }
        }
    }
}
