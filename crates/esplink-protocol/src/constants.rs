//! Protocol constants
//!
//! These constants define the framing bytes, packet layout sizes and command
//! codes used on the serial link between the host and the esp-link module.

// ============================================================================
// Framing Bytes
// ============================================================================

/// Frame delimiter.
pub const SLIP_END: u8 = 0xC0;
/// Escape marker.
pub const SLIP_ESC: u8 = 0xDB;
/// Substitute sent after [`SLIP_ESC`] for a literal [`SLIP_END`].
pub const SLIP_ESC_END: u8 = 0xDC;
/// Substitute sent after [`SLIP_ESC`] for a literal [`SLIP_ESC`].
pub const SLIP_ESC_ESC: u8 = 0xDD;

// ============================================================================
// Packet Layout
// ============================================================================

/// Size of the packet header: cmd (u16) + argc (u16) + value (u32).
pub const HEADER_LEN: usize = 2 + 2 + 4;
/// Size of the CRC trailer.
pub const CRC_LEN: usize = 2;
/// Smallest frame that can hold a packet: a header with no arguments plus CRC.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + CRC_LEN;
/// Capacity of the receive frame buffer.
pub const FRAME_BUFFER_SIZE: usize = 128;
/// Arguments are zero-padded to a multiple of this many bytes.
pub const ARG_ALIGNMENT: usize = 4;

/// Default value field sent with requests. The module echoes it back in the
/// sync acknowledgement.
pub const DEFAULT_REQUEST_TAG: u32 = 0x0142;

// ============================================================================
// Command Codes
// ============================================================================

/// No operation.
pub const CMD_NULL: u16 = 0;
/// Reset the module (not honored by all firmware revisions).
pub const CMD_RESET: u16 = 1;
/// Synchronize framing state. Sent by either side.
pub const CMD_SYNC: u16 = 2;
/// Response carrying a scalar value.
pub const CMD_RESP_V: u16 = 3;
/// Response asking the host to invoke a registered callback.
pub const CMD_RESP_CB: u16 = 4;
/// Query the current WiFi status.
pub const CMD_WIFI_STATUS: u16 = 5;
/// Register a named callback with the module.
pub const CMD_CB_ADD: u16 = 6;
/// Request pending callback events.
pub const CMD_CB_EVENTS: u16 = 7;
/// Get the module clock in seconds since the unix epoch.
pub const CMD_GET_TIME: u16 = 8;

/// Set up MQTT callbacks.
pub const CMD_MQTT_SETUP: u16 = 10;
/// Publish an MQTT message.
pub const CMD_MQTT_PUBLISH: u16 = 11;
/// Subscribe to an MQTT topic.
pub const CMD_MQTT_SUBSCRIBE: u16 = 12;
/// Set the MQTT last-will topic and message.
pub const CMD_MQTT_LWT: u16 = 13;

/// Set up a REST client.
pub const CMD_REST_SETUP: u16 = 20;
/// Issue a REST request.
pub const CMD_REST_REQUEST: u16 = 21;
/// Set a REST request header.
pub const CMD_REST_SETHEADER: u16 = 22;

/// Human-readable name for a command code, for logs.
pub fn command_name(code: u16) -> &'static str {
    match code {
        CMD_NULL => "NULL",
        CMD_RESET => "RESET",
        CMD_SYNC => "SYNC",
        CMD_RESP_V => "RESP_V",
        CMD_RESP_CB => "RESP_CB",
        CMD_WIFI_STATUS => "WIFI_STATUS",
        CMD_CB_ADD => "CB_ADD",
        CMD_CB_EVENTS => "CB_EVENTS",
        CMD_GET_TIME => "GET_TIME",
        CMD_MQTT_SETUP => "MQTT_SETUP",
        CMD_MQTT_PUBLISH => "MQTT_PUBLISH",
        CMD_MQTT_SUBSCRIBE => "MQTT_SUBSCRIBE",
        CMD_MQTT_LWT => "MQTT_LWT",
        CMD_REST_SETUP => "REST_SETUP",
        CMD_REST_REQUEST => "REST_REQUEST",
        CMD_REST_SETHEADER => "REST_SETHEADER",
        _ => "UNKNOWN",
    }
}
