use heapless::Vec;
use scrutiny_agent::{
    framing::{Crc32, Request, Response, ResponseCode},
    protocol::{CONNECT_MAGIC, DISCOVER_MAGIC},
    Config, ConfigError, MainHandler, ResponseBuffer, UserCommandError,
};

/// An owned copy of a response popped from the agent.
#[derive(Debug, PartialEq)]
struct Reply {
    command: u8,
    subfunction: u8,
    code: ResponseCode,
    payload: Vec<u8, 128>,
}

fn frame(command: u8, subfunction: u8, payload: &[u8]) -> Vec<u8, 128> {
    let mut buf = [0u8; 128];
    let size = Request::new(command, subfunction, payload)
        .render(&mut buf, &mut Crc32::new())
        .unwrap();

    Vec::from_slice(&buf[..size]).unwrap()
}

fn drain(agent: &mut MainHandler<'_>) -> Option<Reply> {
    let mut buf = [0u8; 256];
    let mut size = 0;

    // small pops on purpose
    while agent.data_to_send() != 0 {
        size += agent.pop_data(&mut buf[size..(size + 5).min(256)]);
    }

    if size == 0 {
        return None;
    }

    let response = Response::construct(&buf[..size], &mut Crc32::new()).unwrap();

    Some(Reply {
        command: response.command,
        subfunction: response.subfunction,
        code: response.code,
        payload: Vec::from_slice(response.payload).unwrap(),
    })
}

fn exchange(
    agent: &mut MainHandler<'_>,
    command: u8,
    subfunction: u8,
    payload: &[u8],
) -> Option<Reply> {
    let request = frame(command, subfunction, payload);

    assert_eq!(request.len(), agent.receive_data(&request));
    agent.process(10);

    drain(agent)
}

fn connect(agent: &mut MainHandler<'_>) -> u32 {
    let reply = exchange(agent, 2, 4, &CONNECT_MAGIC).unwrap();

    assert_eq!(ResponseCode::Ok, reply.code);
    assert_eq!(CONNECT_MAGIC, reply.payload[..4]);

    u32::from_be_bytes([
        reply.payload[4],
        reply.payload[5],
        reply.payload[6],
        reply.payload[7],
    ])
}

fn echo(
    subfunction: u8,
    request: &[u8],
    response: &mut ResponseBuffer<'_>,
) -> Result<(), UserCommandError> {
    match subfunction {
        0 => response.extend_from_slice(request)?,
        // more than the transmit buffer allows
        1 => response.extend_from_slice(&[0x11; 120])?,
        _ => Err(UserCommandError::UnknownSubfunction)?,
    }

    Ok(())
}

mod init {
    use super::*;

    #[test]
    fn missing_buffers() {
        assert!(matches!(
            MainHandler::init(Config::new()),
            Err(ConfigError::MissingBuffers)
        ));
    }

    #[test]
    fn small_buffers() {
        let mut rx = [0u8; 8];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);

        assert!(matches!(
            MainHandler::init(config),
            Err(ConfigError::RxBufferTooSmall)
        ));
    }

    #[test]
    fn name_too_long() {
        let mut rx = [0u8; 64];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);
        config.set_display_name(core::str::from_utf8(&[b'n'; 70]).unwrap());

        assert!(matches!(
            MainHandler::init(config),
            Err(ConfigError::DisplayNameTooLong)
        ));
    }
}

mod session {
    use super::*;

    #[test]
    fn lifecycle() {
        let mut rx = [0u8; 64];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);
        config.set_display_name("bench");
        let mut agent = MainHandler::init(config).unwrap();

        // nothing but discover and connect without a session
        assert_eq!(None, exchange(&mut agent, 1, 1, &[]));

        let discover = exchange(&mut agent, 2, 1, &DISCOVER_MAGIC).unwrap();
        assert_eq!(ResponseCode::Ok, discover.code);
        assert_eq!(2, discover.command);
        assert_eq!(b"bench", &discover.payload[19..]);

        let id = connect(&mut agent);
        assert!(agent.is_connected());
        assert_eq!(Some(id), agent.session_id());

        let mut heartbeat = [0u8; 6];
        heartbeat[..4].copy_from_slice(&id.to_be_bytes());
        heartbeat[4..].copy_from_slice(&[0x00, 0x0f]);

        let reply = exchange(&mut agent, 2, 2, &heartbeat).unwrap();
        assert_eq!(ResponseCode::Ok, reply.code);
        assert_eq!(id.to_be_bytes(), reply.payload[..4]);
        assert_eq!([0xff, 0xf0], reply.payload[4..]);

        let reply = exchange(&mut agent, 2, 3, &[]).unwrap();
        assert_eq!(ResponseCode::Ok, reply.code);
        assert_eq!(17, reply.payload.len());
        // rx payload: 64 - 8
        assert_eq!([0x00, 56], reply.payload[..2]);
        // tx payload: 128 - 9
        assert_eq!([0x00, 119], reply.payload[2..4]);

        let reply = exchange(&mut agent, 2, 5, &id.to_be_bytes()).unwrap();
        assert_eq!(ResponseCode::Ok, reply.code);
        assert!(!agent.is_connected());
    }

    #[test]
    fn busy() {
        let mut rx = [0u8; 64];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);
        let mut agent = MainHandler::init(config).unwrap();

        connect(&mut agent);

        let reply = exchange(&mut agent, 2, 4, &CONNECT_MAGIC).unwrap();
        assert_eq!(ResponseCode::Busy, reply.code);
        assert!(reply.payload.is_empty());
    }

    #[test]
    fn heartbeat_timeout() {
        let mut rx = [0u8; 64];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);
        config.set_heartbeat_timeout_us(1_000_000);
        let mut agent = MainHandler::init(config).unwrap();

        connect(&mut agent);

        agent.process(9_000_000);
        assert!(agent.is_connected());

        agent.process(1_000_000);
        assert!(!agent.is_connected());
        assert_eq!(None, agent.session_id());
    }
}

mod reception {
    use super::*;

    #[test]
    fn byte_by_byte() {
        let mut rx = [0u8; 64];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);
        let mut agent = MainHandler::init(config).unwrap();

        let request = frame(2, 1, &DISCOVER_MAGIC);

        for byte in request.iter() {
            assert_eq!(1, agent.receive_data(core::slice::from_ref(byte)));
            agent.process(10);
        }

        assert_eq!(ResponseCode::Ok, drain(&mut agent).unwrap().code);
    }

    #[test]
    fn one_request_in_flight() {
        let mut rx = [0u8; 64];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);
        let mut agent = MainHandler::init(config).unwrap();

        let request = frame(2, 1, &DISCOVER_MAGIC);
        let mut stream: Vec<u8, 128> = Vec::new();
        stream.extend_from_slice(&request).unwrap();
        stream.extend_from_slice(&request).unwrap();

        let consumed = agent.receive_data(&stream);
        assert_eq!(request.len(), consumed);
        assert_eq!(0, agent.receive_data(&stream[consumed..]));

        agent.process(10);

        // handled, but the response is still pending
        assert!(!agent.is_receiving());
        assert_eq!(0, agent.receive_data(&stream[consumed..]));

        // a partial pop is not enough
        let mut out = [0u8; 128];
        let head = agent.pop_data(&mut out[..4]);
        assert_eq!(4, head);
        assert_eq!(0, agent.receive_data(&stream[consumed..]));

        let size = head + agent.pop_data(&mut out[head..]);
        let first = Response::construct(&out[..size], &mut Crc32::new()).unwrap();
        assert_eq!(ResponseCode::Ok, first.code);

        assert!(agent.is_receiving());
        assert_eq!(request.len(), agent.receive_data(&stream[consumed..]));
        agent.process(10);

        assert_eq!(ResponseCode::Ok, drain(&mut agent).unwrap().code);
    }

    #[test]
    fn rx_timeout() {
        let mut rx = [0u8; 64];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);
        let mut agent = MainHandler::init(config).unwrap();

        let request = frame(2, 1, &DISCOVER_MAGIC);

        agent.receive_data(&request[..3]);
        agent.process(499_990);
        agent.process(10);

        // the stale bytes are gone, a full request goes through
        assert_eq!(ResponseCode::Ok, exchange(&mut agent, 2, 1, &DISCOVER_MAGIC).unwrap().code);
    }

    #[test]
    fn slow_but_in_time() {
        let mut rx = [0u8; 64];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);
        let mut agent = MainHandler::init(config).unwrap();

        let request = frame(2, 1, &DISCOVER_MAGIC);

        for chunk in request.chunks(2) {
            agent.receive_data(chunk);
            agent.process(400_000);
        }

        assert_eq!(ResponseCode::Ok, drain(&mut agent).unwrap().code);
    }

    #[test]
    fn bad_crc_dropped() {
        let mut rx = [0u8; 64];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);
        let mut agent = MainHandler::init(config).unwrap();

        let mut request = frame(2, 1, &DISCOVER_MAGIC);
        let last = request.len() - 1;
        request[last] ^= 0x01;

        assert_eq!(request.len(), agent.receive_data(&request));
        agent.process(10);
        assert_eq!(0, agent.data_to_send());

        assert!(exchange(&mut agent, 2, 1, &DISCOVER_MAGIC).is_some());
    }

    #[test]
    fn overflow() {
        let mut rx = [0u8; 64];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);
        let mut agent = MainHandler::init(config).unwrap();

        connect(&mut agent);

        let reply = exchange(&mut agent, 4, 9, &[0xab; 60]).unwrap();

        assert_eq!(4, reply.command);
        assert_eq!(9, reply.subfunction);
        assert_eq!(ResponseCode::Overflow, reply.code);
        assert!(reply.payload.is_empty());

        // back to normal afterwards
        assert_eq!(ResponseCode::Ok, exchange(&mut agent, 1, 1, &[]).unwrap().code);
    }
}

mod commands {
    use super::*;

    #[test]
    fn get_info() {
        let mut rx = [0u8; 64];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);
        config.set_software_id(*b"0123456789abcdef");
        let mut agent = MainHandler::init(config).unwrap();

        connect(&mut agent);

        let reply = exchange(&mut agent, 1, 1, &[]).unwrap();
        assert_eq!([1, 0], reply.payload[..]);

        let reply = exchange(&mut agent, 1, 2, &[]).unwrap();
        assert_eq!(b"0123456789abcdef", &reply.payload[..]);

        let reply = exchange(&mut agent, 1, 3, &[]).unwrap();
        assert_eq!(0, reply.payload[0] & 0x20);
    }

    #[test]
    fn unsupported() {
        let mut rx = [0u8; 64];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);
        let mut agent = MainHandler::init(config).unwrap();

        connect(&mut agent);

        for (command, subfunction) in [(3, 1), (5, 1), (1, 200), (2, 200), (4, 1), (0x70, 0)] {
            let reply = exchange(&mut agent, command, subfunction, &[]).unwrap();

            assert_eq!(ResponseCode::UnsupportedFeature, reply.code);
            assert_eq!(command, reply.command);
            assert_eq!(subfunction, reply.subfunction);
        }
    }

    #[test]
    fn user_command() {
        let mut rx = [0u8; 64];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);
        config.set_user_command_callback(echo);
        let mut agent = MainHandler::init(config).unwrap();

        connect(&mut agent);

        let reply = exchange(&mut agent, 4, 0, &[1, 2, 3, 4]).unwrap();
        assert_eq!(ResponseCode::Ok, reply.code);
        assert_eq!([1, 2, 3, 4], reply.payload[..]);

        let reply = exchange(&mut agent, 4, 1, &[]).unwrap();
        assert_eq!(ResponseCode::Overflow, reply.code);
        assert!(reply.payload.is_empty());

        let reply = exchange(&mut agent, 4, 2, &[]).unwrap();
        assert_eq!(ResponseCode::FailureToProceed, reply.code);
    }

    #[test]
    fn stateful_user_command() {
        let mut count = 0u8;
        let mut counter = |_: u8,
                           _: &[u8],
                           response: &mut ResponseBuffer<'_>|
         -> Result<(), UserCommandError> {
            count += 1;
            response.push(count)?;

            Ok(())
        };

        let mut rx = [0u8; 64];
        let mut tx = [0u8; 128];
        let mut config = Config::new();
        config.set_buffers(&mut rx, &mut tx);
        config.set_user_command_handler(&mut counter);
        let mut agent = MainHandler::init(config).unwrap();

        connect(&mut agent);

        assert_eq!([1], exchange(&mut agent, 4, 0, &[]).unwrap().payload[..]);
        assert_eq!([2], exchange(&mut agent, 4, 0, &[]).unwrap().payload[..]);
    }
}
