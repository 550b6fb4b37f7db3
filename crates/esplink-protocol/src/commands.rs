//! Command descriptors.
//!
//! A descriptor names a command code and the ordered kinds of its
//! parameters. The request builder walks the kinds and appends each argument
//! the way its kind demands, so the catalog never needs per-command encoding
//! code.

use crate::constants::*;

/// How a logical argument is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// One-byte scalar.
    U8,
    /// Two-byte little-endian scalar.
    U16,
    /// Four-byte little-endian scalar.
    U32,
    /// Length-prefixed byte string.
    Str,
    /// Length-prefixed byte string followed by a second `u16` parameter that
    /// restates its length. Occupies two wire parameters.
    StrWithLen,
    /// Slot index of a host callback, sent as a `u32`.
    Callback,
}

impl ParamKind {
    /// Number of wire parameters this kind expands to.
    pub fn wire_params(self) -> u16 {
        match self {
            ParamKind::StrWithLen => 2,
            _ => 1,
        }
    }
}

/// What the module sends back for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returns {
    /// Nothing is sent back.
    Nothing,
    /// A value response echoing the request tag.
    Ack,
    /// A value response carrying a scalar.
    Value,
}

/// Static description of one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Command code sent in the header.
    pub code: u16,
    /// Name used in logs and on the command line.
    pub name: &'static str,
    /// Parameter kinds, in wire order.
    pub params: &'static [ParamKind],
    /// Expected response.
    pub returns: Returns,
}

impl CommandSpec {
    /// Argument count written to the header.
    pub fn wire_argc(&self) -> u16 {
        self.params.iter().map(|p| p.wire_params()).sum()
    }

    /// Whether the caller should wait for a response after sending.
    pub fn expects_response(&self) -> bool {
        self.returns != Returns::Nothing
    }
}

/// Synchronize with the module.
pub const SYNC: CommandSpec = CommandSpec {
    code: CMD_SYNC,
    name: "sync",
    params: &[],
    returns: Returns::Ack,
};

/// Query the WiFi status.
pub const WIFI_STATUS: CommandSpec = CommandSpec {
    code: CMD_WIFI_STATUS,
    name: "wifi_status",
    params: &[],
    returns: Returns::Value,
};

/// Read the module clock.
pub const GET_TIME: CommandSpec = CommandSpec {
    code: CMD_GET_TIME,
    name: "get_time",
    params: &[],
    returns: Returns::Value,
};

/// Register the connected, disconnected, published and data callbacks.
pub const MQTT_SETUP: CommandSpec = CommandSpec {
    code: CMD_MQTT_SETUP,
    name: "mqtt_setup",
    params: &[
        ParamKind::Callback,
        ParamKind::Callback,
        ParamKind::Callback,
        ParamKind::Callback,
    ],
    returns: Returns::Nothing,
};

/// Publish: topic, data, qos, retain.
pub const MQTT_PUBLISH: CommandSpec = CommandSpec {
    code: CMD_MQTT_PUBLISH,
    name: "mqtt_publish",
    params: &[ParamKind::Str, ParamKind::StrWithLen, ParamKind::U8, ParamKind::U8],
    returns: Returns::Nothing,
};

/// Subscribe: topic, qos.
pub const MQTT_SUBSCRIBE: CommandSpec = CommandSpec {
    code: CMD_MQTT_SUBSCRIBE,
    name: "mqtt_subscribe",
    params: &[ParamKind::Str, ParamKind::U8],
    returns: Returns::Nothing,
};

/// Last will: topic, message, qos, retain.
pub const MQTT_LWT: CommandSpec = CommandSpec {
    code: CMD_MQTT_LWT,
    name: "mqtt_lwt",
    params: &[ParamKind::Str, ParamKind::Str, ParamKind::U8, ParamKind::U8],
    returns: Returns::Nothing,
};

/// REST client setup: host, port, security. Returns the client handle.
pub const REST_SETUP: CommandSpec = CommandSpec {
    code: CMD_REST_SETUP,
    name: "rest_setup",
    params: &[ParamKind::Str, ParamKind::U16, ParamKind::U8],
    returns: Returns::Value,
};

/// REST header: header index, value. The request value field carries the
/// client handle.
pub const REST_SETHEADER: CommandSpec = CommandSpec {
    code: CMD_REST_SETHEADER,
    name: "rest_setheader",
    params: &[ParamKind::U8, ParamKind::Str],
    returns: Returns::Nothing,
};

/// Every command this crate knows how to build.
pub const CATALOG: &[CommandSpec] = &[
    SYNC,
    WIFI_STATUS,
    GET_TIME,
    MQTT_SETUP,
    MQTT_PUBLISH,
    MQTT_SUBSCRIBE,
    MQTT_LWT,
    REST_SETUP,
    REST_SETHEADER,
];

/// Find a command by name.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    CATALOG.iter().find(|c| c.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_argc_counts_restated_length() {
        assert_eq!(SYNC.wire_argc(), 0);
        assert_eq!(MQTT_SETUP.wire_argc(), 4);
        // topic + data + data length + qos + retain
        assert_eq!(MQTT_PUBLISH.wire_argc(), 5);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("get_time").map(|c| c.code), Some(CMD_GET_TIME));
        assert!(lookup("reboot").is_none());
    }

    #[test]
    fn test_catalog_codes_are_unique() {
        for (i, a) in CATALOG.iter().enumerate() {
            for b in &CATALOG[i + 1..] {
                assert_ne!(a.code, b.code, "{} and {} share a code", a.name, b.name);
            }
        }
    }

    #[test]
    fn test_expects_response() {
        assert!(SYNC.expects_response());
        assert!(GET_TIME.expects_response());
        assert!(!MQTT_PUBLISH.expects_response());
    }
}
