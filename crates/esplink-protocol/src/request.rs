//! Outgoing request encoding.
//!
//! A request is written straight to a byte sink as it is built: each raw byte
//! is folded into the running CRC and then escaped onto the wire. Nothing is
//! buffered, so a request of any length streams through a serial port one
//! byte at a time.
//!
//! ```text
//! C0 | cmd:u16 | argc:u16 | value:u32 | { len:u16 | data | pad }* | crc:u16 | C0
//! ```
//!
//! Everything between the delimiters is escaped; integers are little-endian.

use std::io::Write;

use crate::commands::{CommandSpec, ParamKind};
use crate::constants::*;
use crate::crc::crc16_add;
use crate::error::{EncodeError, ProtocolError};
use crate::frame::escape_byte;

/// One logical argument supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg<'a> {
    /// One-byte scalar.
    U8(u8),
    /// Two-byte scalar.
    U16(u16),
    /// Four-byte scalar.
    U32(u32),
    /// Byte string, for [`ParamKind::Str`] and [`ParamKind::StrWithLen`].
    Bytes(&'a [u8]),
    /// Callback slot index.
    Callback(u8),
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(s: &'a str) -> Self {
        Arg::Bytes(s.as_bytes())
    }
}

impl<'a> From<&'a [u8]> for Arg<'a> {
    fn from(b: &'a [u8]) -> Self {
        Arg::Bytes(b)
    }
}

impl Arg<'_> {
    fn matches(&self, kind: ParamKind) -> bool {
        matches!(
            (kind, self),
            (ParamKind::U8, Arg::U8(_))
                | (ParamKind::U16, Arg::U16(_))
                | (ParamKind::U32, Arg::U32(_))
                | (ParamKind::Str, Arg::Bytes(_))
                | (ParamKind::StrWithLen, Arg::Bytes(_))
                | (ParamKind::Callback, Arg::Callback(_))
        )
    }
}

/// Number of zero bytes that follow a parameter of `len` bytes.
pub fn padding_for(len: usize) -> usize {
    (ARG_ALIGNMENT - (len % ARG_ALIGNMENT)) % ARG_ALIGNMENT
}

/// Check `args` against the descriptor before anything is written.
pub fn check_args(spec: &CommandSpec, args: &[Arg<'_>]) -> Result<(), ProtocolError> {
    if args.len() != spec.params.len() {
        return Err(ProtocolError::ArgumentCount {
            command: spec.name,
            expected: spec.params.len(),
            actual: args.len(),
        });
    }
    for (index, (kind, arg)) in spec.params.iter().zip(args).enumerate() {
        if !arg.matches(*kind) {
            return Err(ProtocolError::ArgumentKind {
                command: spec.name,
                index,
                expected: *kind,
            });
        }
        if let Arg::Bytes(data) = arg {
            if data.len() > usize::from(u16::MAX) {
                return Err(ProtocolError::ArgumentTooLong(data.len()));
            }
        }
    }
    Ok(())
}

/// Streams one request frame into a byte sink.
///
/// Created by [`RequestWriter::begin`], which emits the leading delimiter and
/// the header; closed by [`RequestWriter::finish`], which emits the CRC and
/// the closing delimiter.
#[derive(Debug)]
pub struct RequestWriter<W: Write> {
    sink: W,
    crc: u16,
}

impl<W: Write> RequestWriter<W> {
    /// Start a frame and write its header.
    pub fn begin(sink: W, command: u16, argc: u16, value: u32) -> std::io::Result<Self> {
        let mut writer = RequestWriter { sink, crc: 0 };
        writer.sink.write_all(&[SLIP_END])?;
        writer.write_raw(&command.to_le_bytes())?;
        writer.write_raw(&argc.to_le_bytes())?;
        writer.write_raw(&value.to_le_bytes())?;
        Ok(writer)
    }

    /// Write raw packet bytes, folding them into the CRC.
    pub fn write_raw(&mut self, data: &[u8]) -> std::io::Result<()> {
        for &byte in data {
            self.crc = crc16_add(byte, self.crc);
            self.write_escaped(byte)?;
        }
        Ok(())
    }

    /// Append one length-prefixed, zero-padded parameter.
    pub fn add_param(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        let len =
            u16::try_from(data.len()).map_err(|_| ProtocolError::ArgumentTooLong(data.len()))?;
        self.write_raw(&len.to_le_bytes())?;
        self.write_raw(data)?;
        for _ in 0..padding_for(data.len()) {
            self.write_raw(&[0])?;
        }
        Ok(())
    }

    /// Append argument `index` of `spec` the way its parameter kind puts it
    /// on the wire.
    pub fn add_arg(
        &mut self,
        spec: &CommandSpec,
        index: usize,
        arg: &Arg<'_>,
    ) -> Result<(), EncodeError> {
        let kind = *spec.params.get(index).ok_or(ProtocolError::ArgumentCount {
            command: spec.name,
            expected: spec.params.len(),
            actual: index + 1,
        })?;
        match (kind, arg) {
            (ParamKind::U8, Arg::U8(v)) => self.add_param(&[*v]),
            (ParamKind::U16, Arg::U16(v)) => self.add_param(&v.to_le_bytes()),
            (ParamKind::U32, Arg::U32(v)) => self.add_param(&v.to_le_bytes()),
            (ParamKind::Str, Arg::Bytes(data)) => self.add_param(data),
            (ParamKind::StrWithLen, Arg::Bytes(data)) => {
                self.add_param(data)?;
                let len = u16::try_from(data.len())
                    .map_err(|_| ProtocolError::ArgumentTooLong(data.len()))?;
                self.add_param(&len.to_le_bytes())
            }
            (ParamKind::Callback, Arg::Callback(slot)) => {
                self.add_param(&u32::from(*slot).to_le_bytes())
            }
            (expected, _) => Err(ProtocolError::ArgumentKind {
                command: spec.name,
                index,
                expected,
            }
            .into()),
        }
    }

    /// Write the CRC and the closing delimiter, returning the sink.
    pub fn finish(mut self) -> std::io::Result<W> {
        for byte in self.crc.to_le_bytes() {
            self.write_escaped(byte)?;
        }
        self.sink.write_all(&[SLIP_END])?;
        self.sink.flush()?;
        Ok(self.sink)
    }

    fn write_escaped(&mut self, byte: u8) -> std::io::Result<()> {
        let (bytes, len) = escape_byte(byte);
        self.sink.write_all(&bytes[..len])
    }
}

/// Write a complete request for `spec` into `sink`.
///
/// Arguments are validated against the descriptor first, so a rejected
/// request never leaves a partial frame on the wire.
pub fn write_request<W: Write>(
    sink: W,
    spec: &CommandSpec,
    value: u32,
    args: &[Arg<'_>],
) -> Result<W, EncodeError> {
    check_args(spec, args)?;
    log::trace!(
        "request {} (0x{:04X}) argc={} value=0x{:X}",
        spec.name,
        spec.code,
        spec.wire_argc(),
        value
    );
    let mut writer = RequestWriter::begin(sink, spec.code, spec.wire_argc(), value)?;
    for (index, arg) in args.iter().enumerate() {
        writer.add_arg(spec, index, arg)?;
    }
    Ok(writer.finish()?)
}

/// Encode a request into a new buffer.
pub fn encode_request(
    spec: &CommandSpec,
    value: u32,
    args: &[Arg<'_>],
) -> Result<Vec<u8>, EncodeError> {
    write_request(Vec::new(), spec, value, args)
}

/// Encode a frame from raw parameters.
///
/// The layout is the same in both directions, so this also produces the
/// frames the module sends back (value responses, callback invocations).
pub fn encode_packet(command: u16, value: u32, params: &[&[u8]]) -> Result<Vec<u8>, EncodeError> {
    let argc =
        u16::try_from(params.len()).map_err(|_| ProtocolError::TooManyArguments(params.len()))?;
    let mut writer = RequestWriter::begin(Vec::new(), command, argc, value)?;
    for param in params {
        writer.add_param(param)?;
    }
    Ok(writer.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{GET_TIME, MQTT_PUBLISH, MQTT_SETUP, SYNC};
    use crate::crc::crc16;

    #[test]
    fn test_sync_request_bytes() {
        let frame = encode_request(&SYNC, 0x142, &[]).expect("encode");
        assert_eq!(
            frame,
            vec![0xC0, 0x02, 0x00, 0x00, 0x00, 0x42, 0x01, 0x00, 0x00, 0x72, 0x7E, 0xC0]
        );
    }

    #[test]
    fn test_payload_delimiter_is_escaped() {
        let frame = encode_packet(CMD_RESP_V, 0, &[&[0xC0u8][..]]).expect("encode");
        // header(8) then len=1, the escaped byte, three pad bytes
        assert_eq!(&frame[9..15], &[0x01, 0x00, 0xDB, 0xDC, 0x00, 0x00]);

        let frame = encode_packet(CMD_RESP_V, 0, &[&[0xDBu8][..]]).expect("encode");
        assert_eq!(&frame[9..15], &[0x01, 0x00, 0xDB, 0xDD, 0x00, 0x00]);
    }

    #[test]
    fn test_header_bytes_are_escaped() {
        // value 0xC0 in the header must be stuffed too
        let frame = encode_packet(CMD_RESP_V, 0xC0, &[]).expect("encode");
        assert_eq!(&frame[5..7], &[0xDB, 0xDC]);
        assert_eq!(frame.iter().filter(|&&b| b == SLIP_END).count(), 2);
    }

    #[test]
    fn test_padding() {
        assert_eq!(padding_for(0), 0);
        assert_eq!(padding_for(1), 3);
        assert_eq!(padding_for(4), 0);
        assert_eq!(padding_for(5), 3);
        assert_eq!(padding_for(7), 1);
    }

    #[test]
    fn test_publish_layout_and_crc() {
        let frame = encode_request(
            &MQTT_PUBLISH,
            0x142,
            &["/spider/LED".into(), "ABCDE".into(), Arg::U8(0), Arg::U8(0)],
        )
        .expect("encode");

        let mut raw = Vec::new();
        raw.extend_from_slice(&CMD_MQTT_PUBLISH.to_le_bytes());
        raw.extend_from_slice(&5u16.to_le_bytes());
        raw.extend_from_slice(&0x142u32.to_le_bytes());
        // topic: 11 bytes + 1 pad
        raw.extend_from_slice(&[11, 0]);
        raw.extend_from_slice(b"/spider/LED");
        raw.push(0);
        // data: 5 bytes + 3 pad
        raw.extend_from_slice(&[5, 0]);
        raw.extend_from_slice(b"ABCDE");
        raw.extend_from_slice(&[0, 0, 0]);
        // restated length: u16 + 2 pad
        raw.extend_from_slice(&[2, 0, 5, 0, 0, 0]);
        // qos, retain
        raw.extend_from_slice(&[1, 0, 0, 0, 0, 0]);
        raw.extend_from_slice(&[1, 0, 0, 0, 0, 0]);
        let crc = crc16(&raw);
        raw.extend_from_slice(&crc.to_le_bytes());

        let mut expected = vec![SLIP_END];
        crate::frame::escape_into(&raw, &mut expected);
        expected.push(SLIP_END);
        assert_eq!(frame, expected);
    }

    #[test]
    fn test_callback_params_are_u32() {
        let frame = encode_request(
            &MQTT_SETUP,
            0x142,
            &[Arg::Callback(0), Arg::Callback(1), Arg::Callback(2), Arg::Callback(3)],
        )
        .expect("encode");
        // first parameter after the header: len=4, slot 0 as u32
        assert_eq!(&frame[9..15], &[0x04, 0x00, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(frame[3], 4); // argc
    }

    #[test]
    fn test_rejects_wrong_arity() {
        let err = encode_request(&GET_TIME, 0x142, &[Arg::U8(1)]).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Protocol(ProtocolError::ArgumentCount { expected: 0, actual: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_kind() {
        let err = check_args(&MQTT_PUBLISH, &["t".into(), Arg::U8(1), Arg::U8(0), Arg::U8(0)])
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::ArgumentKind {
                command: "mqtt_publish",
                index: 1,
                expected: ParamKind::StrWithLen,
            }
        );
    }

    #[test]
    fn test_rejected_request_writes_nothing() {
        let mut sink = Vec::new();
        let result = write_request(&mut sink, &SYNC, 0, &[Arg::U8(1)]);
        assert!(result.is_err());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_add_arg_reports_command_and_position() {
        let mut writer = RequestWriter::begin(Vec::new(), CMD_MQTT_PUBLISH, 5, 0).expect("begin");
        writer.add_arg(&MQTT_PUBLISH, 0, &"topic".into()).expect("topic");
        let err = writer.add_arg(&MQTT_PUBLISH, 2, &Arg::U16(1)).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Protocol(ProtocolError::ArgumentKind {
                command: "mqtt_publish",
                index: 2,
                expected: ParamKind::U8,
            })
        ));

        let err = writer.add_arg(&MQTT_PUBLISH, 4, &Arg::U8(0)).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Protocol(ProtocolError::ArgumentCount {
                command: "mqtt_publish",
                expected: 4,
                actual: 5,
            })
        ));
    }

    #[test]
    fn test_param_count_overflow() {
        let params = vec![&[][..]; usize::from(u16::MAX) + 1];
        let err = encode_packet(CMD_RESP_V, 0, &params).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Protocol(ProtocolError::TooManyArguments(65_536))
        ));
    }
}
