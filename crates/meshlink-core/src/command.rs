// ── UI intents ──
//
// Every user action the UI can raise, and the request-status name each
// tracked action reports under.

use strum::{Display, EnumIter, IntoStaticStr};

use crate::model::{ChannelIndex, NodeNum, PortName, User, Waypoint};

/// Identifier under which a tracked command reports its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    /// `query_status()`
    DeviceConnectionStatus,
    /// `list_ports()`
    AvailablePorts,
    /// `connect()`
    Connect,
    SendMessage,
    UpdateUser,
    NewWaypoint,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// A discrete request from the UI, bound to exactly one worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    QueryStatus,
    ListPorts,
    Connect { port: PortName },
    Disconnect,
    SendMessage { channel: ChannelIndex, text: String },
    UpdateUser { user: User },
    NewWaypoint { waypoint: Waypoint, channel: ChannelIndex },
    SelectNode { node: Option<NodeNum> },
}

impl Intent {
    /// Request-status name the bound worker reports under, if tracked.
    ///
    /// Disconnect and node selection are untracked.
    pub fn request_kind(&self) -> Option<RequestKind> {
        match self {
            Self::QueryStatus => Some(RequestKind::DeviceConnectionStatus),
            Self::ListPorts => Some(RequestKind::AvailablePorts),
            Self::Connect { .. } => Some(RequestKind::Connect),
            Self::SendMessage { .. } => Some(RequestKind::SendMessage),
            Self::UpdateUser { .. } => Some(RequestKind::UpdateUser),
            Self::NewWaypoint { .. } => Some(RequestKind::NewWaypoint),
            Self::Disconnect | Self::SelectNode { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::QueryStatus => "query_status",
            Self::ListPorts => "list_ports",
            Self::Connect { .. } => "connect",
            Self::Disconnect => "disconnect",
            Self::SendMessage { .. } => "send_message",
            Self::UpdateUser { .. } => "update_user",
            Self::NewWaypoint { .. } => "new_waypoint",
            Self::SelectNode { .. } => "select_node",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn request_names_are_snake_case_and_unique() {
        let names: HashSet<&str> = RequestKind::iter().map(RequestKind::as_str).collect();
        assert_eq!(names.len(), RequestKind::iter().count());
        assert!(names.contains("connect"));
        assert!(names.contains("available_ports"));
        assert!(names.contains("device_connection_status"));
        assert_eq!(RequestKind::NewWaypoint.to_string(), "new_waypoint");
    }

    #[test]
    fn disconnect_is_untracked() {
        assert_eq!(Intent::Disconnect.request_kind(), None);
        assert_eq!(Intent::SelectNode { node: Some(1) }.request_kind(), None);
        assert_eq!(
            Intent::Connect { port: "COM3".into() }.request_kind(),
            Some(RequestKind::Connect)
        );
    }
}
