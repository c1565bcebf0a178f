// ── Wire protocol ──
//
// Newline-delimited JSON frames exchanged with the backend process:
//
//   -> {"id": 7, "command": "connect_to_serial_port", "args": {"portName": "COM3"}}
//   <- {"id": 7, "result": null}
//   <- {"id": 8, "error": "port is busy"}
//   <- {"event": "device_update", "payload": {...}}

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

/// Backend commands consumed by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Method {
    CheckDeviceConnected,
    RequestDeviceState,
    GetAllSerialPorts,
    InitializeGraphState,
    ConnectToSerialPort,
    DisconnectFromSerialPort,
    SendText,
    UpdateDeviceUser,
    SendWaypoint,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Outgoing request frame.
#[derive(Debug, Serialize)]
pub struct RequestFrame<'a> {
    pub id: u64,
    pub command: &'a str,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub args: &'a serde_json::Value,
}

/// Incoming frame: either a push event or the answer to a request.
///
/// Events are tried first since they carry the discriminating `event` key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IncomingFrame {
    Event {
        event: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
    Response {
        id: u64,
        #[serde(default)]
        result: serde_json::Value,
        #[serde(default)]
        error: Option<String>,
    },
}

impl IncomingFrame {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
