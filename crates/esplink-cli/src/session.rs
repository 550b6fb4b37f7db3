//! High-level exchanges with the module, one per subcommand.
//!
//! Everything here is generic over the transport so the same code runs
//! against the TCP bridge and against an in-memory module in tests.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use chrono::DateTime;
use esplink_client::{Client, ClientError, Transport};
use esplink_protocol::{commands, Arg, CommandSpec, Packet, ParamKind, ProtocolError};
use tracing::{debug, info, warn};

use crate::error::CliError;

/// Station states reported by `WIFI_STATUS`.
pub fn wifi_status_name(status: u32) -> &'static str {
    match status {
        0 => "idle",
        1 => "connecting",
        2 => "wrong password",
        3 => "no AP found",
        4 => "connect failed",
        5 => "got IP",
        _ => "unknown",
    }
}

/// Render a module timestamp as `HH:MM:SS` (UTC). Zero means the module
/// has no time yet.
pub fn format_time(seconds: u32) -> Option<String> {
    if seconds == 0 {
        return None;
    }
    DateTime::from_timestamp(i64::from(seconds), 0).map(|t| t.format("%H:%M:%S").to_string())
}

/// Run the handshake until it succeeds, up to `attempts` times.
pub fn sync<T: Transport>(client: &mut Client<T>, attempts: u32) -> Result<(), CliError> {
    for attempt in 1..=attempts.max(1) {
        if client.synchronize()? {
            info!("module ready after {} attempt(s)", attempt);
            return Ok(());
        }
        warn!("sync attempt {}/{} failed", attempt, attempts.max(1));
    }
    Err(CliError::SyncFailed {
        attempts: attempts.max(1),
    })
}

/// Send a request and wait for its value response.
pub fn query<T: Transport>(
    client: &mut Client<T>,
    spec: &CommandSpec,
    args: &[Arg<'_>],
) -> Result<u32, CliError> {
    if !spec.expects_response() {
        return Err(CliError::NoResponseExpected(spec.name));
    }
    client.execute(spec, args)?;
    match client.receive()? {
        Some(packet) => Ok(packet.value),
        None => Err(CliError::NoReply(spec.name)),
    }
}

/// The module's current time in seconds since the epoch.
pub fn get_time<T: Transport>(client: &mut Client<T>) -> Result<u32, CliError> {
    query(client, &commands::GET_TIME, &[])
}

/// The module's WiFi station state.
pub fn wifi_status<T: Transport>(client: &mut Client<T>) -> Result<u32, CliError> {
    query(client, &commands::WIFI_STATUS, &[])
}

/// Publish one MQTT message. The module sends no reply.
pub fn publish<T: Transport>(
    client: &mut Client<T>,
    topic: &str,
    message: &[u8],
    qos: u8,
    retain: bool,
) -> Result<(), CliError> {
    let args = [
        Arg::from(topic),
        Arg::Bytes(message),
        Arg::U8(qos),
        Arg::U8(u8::from(retain)),
    ];
    client.execute(&commands::MQTT_PUBLISH, &args)?;
    debug!("published {} bytes to {}", message.len(), topic);
    Ok(())
}

/// Parse one command-line argument as the parameter kind `kind`.
fn parse_arg<'a>(
    spec: &CommandSpec,
    index: usize,
    kind: ParamKind,
    text: &'a str,
) -> Result<Arg<'a>, CliError> {
    let invalid = || CliError::InvalidArgument {
        command: spec.name,
        index,
        value: text.to_string(),
    };
    Ok(match kind {
        ParamKind::U8 => Arg::U8(parse_number(text).ok_or_else(invalid)?),
        ParamKind::U16 => Arg::U16(parse_number(text).ok_or_else(invalid)?),
        ParamKind::U32 => Arg::U32(parse_number(text).ok_or_else(invalid)?),
        ParamKind::Str | ParamKind::StrWithLen => Arg::from(text),
        ParamKind::Callback => return Err(CliError::CallbackArgument(spec.name)),
    })
}

/// Decimal, or hex with a `0x` prefix.
fn parse_number<N: TryFrom<u64>>(text: &str) -> Option<N> {
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => text.parse().ok()?,
    };
    N::try_from(value).ok()
}

/// Run a catalog command by name with textual arguments. Returns the value
/// response for commands that have one.
pub fn exec<T: Transport>(
    client: &mut Client<T>,
    name: &str,
    raw: &[String],
) -> Result<Option<u32>, CliError> {
    let spec = commands::lookup(name).ok_or_else(|| CliError::UnknownCommand {
        name: name.to_string(),
        known: commands::CATALOG.iter().map(|c| c.name).collect::<Vec<_>>().join(", "),
    })?;
    if raw.len() != spec.params.len() {
        let err = ProtocolError::ArgumentCount {
            command: spec.name,
            expected: spec.params.len(),
            actual: raw.len(),
        };
        return Err(ClientError::Protocol(err).into());
    }
    let args = spec
        .params
        .iter()
        .zip(raw)
        .enumerate()
        .map(|(index, (kind, text))| parse_arg(spec, index, *kind, text))
        .collect::<Result<Vec<_>, _>>()?;

    if spec.expects_response() {
        query(client, spec, &args).map(Some)
    } else {
        client.execute(spec, &args)?;
        Ok(None)
    }
}

// ============================================================================
// MQTT monitoring
// ============================================================================

/// A notification delivered through one of the MQTT callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttEvent {
    Connected,
    Disconnected,
    Published,
    Data { topic: String, payload: Vec<u8> },
}

impl fmt::Display for MqttEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MqttEvent::Connected => write!(f, "mqtt connected"),
            MqttEvent::Disconnected => write!(f, "mqtt disconnected"),
            MqttEvent::Published => write!(f, "mqtt published"),
            MqttEvent::Data { topic, payload } => {
                write!(f, "{}: {}", topic, String::from_utf8_lossy(payload))
            }
        }
    }
}

impl MqttEvent {
    fn data(packet: &Packet<'_>) -> Option<Self> {
        let mut args = packet.args();
        let topic = args.next_str().ok()?.to_string();
        let payload = args.next_bytes().map(<[u8]>::to_vec).unwrap_or_default();
        Some(MqttEvent::Data { topic, payload })
    }
}

/// Events collected by the MQTT callbacks, drained by the caller.
pub type EventQueue = Rc<RefCell<Vec<MqttEvent>>>;

/// Register the four MQTT callbacks, hand them to the module and subscribe
/// to `topics`. Returns the queue the callbacks feed.
pub fn mqtt_setup<T: Transport>(
    client: &mut Client<T>,
    topics: &[String],
) -> Result<EventQueue, CliError> {
    let events: EventQueue = Rc::default();

    let queue = Rc::clone(&events);
    let connected = client
        .register_callback(move |_: &Packet<'_>| queue.borrow_mut().push(MqttEvent::Connected))?;
    let queue = Rc::clone(&events);
    let disconnected = client
        .register_callback(move |_: &Packet<'_>| queue.borrow_mut().push(MqttEvent::Disconnected))?;
    let queue = Rc::clone(&events);
    let published = client
        .register_callback(move |_: &Packet<'_>| queue.borrow_mut().push(MqttEvent::Published))?;
    let queue = Rc::clone(&events);
    let data = client.register_callback(move |p: &Packet<'_>| match MqttEvent::data(p) {
        Some(event) => queue.borrow_mut().push(event),
        None => warn!("malformed mqtt data notification"),
    })?;

    client.execute(
        &commands::MQTT_SETUP,
        &[connected.as_arg(), disconnected.as_arg(), published.as_arg(), data.as_arg()],
    )?;
    for topic in topics {
        client.execute(&commands::MQTT_SUBSCRIBE, &[Arg::from(topic.as_str()), Arg::U8(0)])?;
        info!("subscribed to {}", topic);
    }
    Ok(events)
}

/// Poll for notifications, handing each to `sink`. Runs `rounds` receive
/// timeouts, or forever when `rounds` is `None`. Returns the number of
/// events delivered.
pub fn monitor<T: Transport>(
    client: &mut Client<T>,
    events: &EventQueue,
    rounds: Option<u32>,
    mut sink: impl FnMut(&MqttEvent),
) -> Result<usize, CliError> {
    let mut delivered = 0;
    let mut round = 0u32;
    while rounds.map_or(true, |limit| round < limit) {
        round = round.saturating_add(1);
        if let Some(packet) = client.receive()? {
            debug!("unsolicited reply cmd={} value={}", packet.command, packet.value);
        }
        for event in events.borrow_mut().drain(..) {
            sink(&event);
            delivered += 1;
        }
    }
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use esplink_client::{ClientConfig, MemoryTransport};
    use esplink_protocol::{encode_packet, encode_request, CMD_RESP_CB, CMD_RESP_V};

    fn quick(transport: MemoryTransport) -> Client<MemoryTransport> {
        let config = ClientConfig {
            receive_timeout: 3,
            sync_timeout: 3,
            ..ClientConfig::default()
        };
        Client::with_config(transport, config)
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), None);
        assert_eq!(format_time(3_725).as_deref(), Some("01:02:05"));
        assert_eq!(format_time(1_500_000_000).as_deref(), Some("02:40:00"));
    }

    #[test]
    fn test_wifi_status_names() {
        assert_eq!(wifi_status_name(5), "got IP");
        assert_eq!(wifi_status_name(42), "unknown");
    }

    #[test]
    fn test_sync_retries_then_fails() {
        let mut client = quick(MemoryTransport::new());
        let err = sync(&mut client, 3).unwrap_err();
        assert!(matches!(err, CliError::SyncFailed { attempts: 3 }));
        assert_eq!(client.stats().requests_sent, 3);
    }

    #[test]
    fn test_sync_succeeds_on_second_attempt() {
        let mut calls = 0;
        let transport = MemoryTransport::with_responder(move |_| {
            calls += 1;
            if calls < 2 {
                Vec::new()
            } else {
                encode_packet(CMD_RESP_V, 0x142, &[]).unwrap()
            }
        });
        let mut client = quick(transport);
        sync(&mut client, 5).unwrap();
        assert_eq!(client.stats().requests_sent, 2);
    }

    #[test]
    fn test_get_time_reads_value() {
        let transport =
            MemoryTransport::with_responder(|_| encode_packet(CMD_RESP_V, 3_725, &[]).unwrap());
        let mut client = quick(transport);
        assert_eq!(get_time(&mut client).unwrap(), 3_725);
    }

    #[test]
    fn test_query_without_reply() {
        let mut client = quick(MemoryTransport::new());
        let err = wifi_status(&mut client).unwrap_err();
        assert!(matches!(err, CliError::NoReply("wifi_status")));
    }

    #[test]
    fn test_publish_wire_format() {
        let mut client = quick(MemoryTransport::new());
        publish(&mut client, "/spider/LED", b"ABCDE", 0, false).unwrap();

        let expected = encode_request(
            &commands::MQTT_PUBLISH,
            0x142,
            &[Arg::from("/spider/LED"), Arg::from("ABCDE"), Arg::U8(0), Arg::U8(0)],
        )
        .unwrap();
        assert_eq!(client.transport().written(), expected.as_slice());
    }

    #[test]
    fn test_monitor_collects_notifications() {
        let mut client = quick(MemoryTransport::new());
        let events = mqtt_setup(&mut client, &["/spider/#".to_string()]).unwrap();
        assert_eq!(client.stats().requests_sent, 2);

        let mut wire = encode_packet(CMD_RESP_CB, 0, &[]).unwrap();
        let data = [b"/spider/LED".as_slice(), b"on".as_slice()];
        wire.extend(encode_packet(CMD_RESP_CB, 3, &data).unwrap());
        client.transport_mut().feed(&wire);

        let mut seen = Vec::new();
        let delivered = monitor(&mut client, &events, Some(1), |e| seen.push(e.clone())).unwrap();
        assert_eq!(delivered, 2);
        assert_eq!(
            seen,
            vec![
                MqttEvent::Connected,
                MqttEvent::Data {
                    topic: "/spider/LED".to_string(),
                    payload: b"on".to_vec(),
                },
            ]
        );
        assert_eq!(seen[1].to_string(), "/spider/LED: on");
    }

    #[test]
    fn test_query_rejects_command_without_response() {
        let mut client = quick(MemoryTransport::new());
        let err = query(&mut client, &commands::MQTT_LWT, &[]).unwrap_err();
        assert!(matches!(err, CliError::NoResponseExpected("mqtt_lwt")));
        assert!(client.transport().written().is_empty());
    }

    #[test]
    fn test_exec_value_command() {
        let transport =
            MemoryTransport::with_responder(|_| encode_packet(CMD_RESP_V, 5, &[]).unwrap());
        let mut client = quick(transport);
        assert_eq!(exec(&mut client, "wifi_status", &[]).unwrap(), Some(5));
    }

    #[test]
    fn test_exec_parses_arguments_by_kind() {
        let mut client = quick(MemoryTransport::new());
        let raw = ["/spider/LED", "ABCDE", "0x1", "0"].map(String::from);
        assert_eq!(exec(&mut client, "mqtt_publish", &raw).unwrap(), None);

        let expected = encode_request(
            &commands::MQTT_PUBLISH,
            0x142,
            &[Arg::from("/spider/LED"), Arg::from("ABCDE"), Arg::U8(1), Arg::U8(0)],
        )
        .unwrap();
        assert_eq!(client.transport().written(), expected.as_slice());
    }

    #[test]
    fn test_exec_rejects_bad_input() {
        let mut client = quick(MemoryTransport::new());

        let err = exec(&mut client, "reboot", &[]).unwrap_err();
        match err {
            CliError::UnknownCommand { name, known } => {
                assert_eq!(name, "reboot");
                assert!(known.contains("mqtt_publish"));
            }
            other => panic!("unexpected error {:?}", other),
        }

        let raw = ["t", "m", "300", "0"].map(String::from);
        let err = exec(&mut client, "mqtt_publish", &raw).unwrap_err();
        assert!(matches!(
            err,
            CliError::InvalidArgument { command: "mqtt_publish", index: 2, .. }
        ));

        let err = exec(&mut client, "get_time", &["1".to_string()]).unwrap_err();
        assert!(matches!(
            err,
            CliError::Client(ClientError::Protocol(ProtocolError::ArgumentCount {
                expected: 0,
                actual: 1,
                ..
            }))
        ));

        let raw = ["1", "2", "3", "4"].map(String::from);
        let err = exec(&mut client, "mqtt_setup", &raw).unwrap_err();
        assert!(matches!(err, CliError::CallbackArgument("mqtt_setup")));

        assert!(client.transport().written().is_empty());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number::<u8>("255"), Some(255));
        assert_eq!(parse_number::<u8>("256"), None);
        assert_eq!(parse_number::<u16>("0x142"), Some(0x142));
        assert_eq!(parse_number::<u32>("ten"), None);
    }
}
