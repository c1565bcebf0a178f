// ── Push-event channels ──
//
// A backend event channel is a long-lived FIFO subscription to one of the
// three push sources. Channels carry raw JSON payloads; typing them is the
// consumer's business.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use tokio::sync::mpsc;

use crate::error::Error;

/// The push sources exposed by the backend.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// Full device snapshot, emitted whenever the backend's view changes.
    DeviceUpdate,
    /// The physical device dropped. Carries no payload.
    DeviceDisconnect,
    /// Mesh topology changed.
    GraphUpdate,
}

impl EventKind {
    /// Wire name of the event, as it appears in backend frames.
    pub fn event_name(self) -> &'static str {
        self.into()
    }
}

/// A subscription handle bound to one [`EventKind`].
///
/// Events arrive in backend emission order. The channel ends (yields
/// `None`) once the backend side stops producing; dropping the handle
/// abandons the subscription.
#[derive(Debug)]
pub struct EventChannel {
    kind: EventKind,
    rx: mpsc::UnboundedReceiver<serde_json::Value>,
}

impl EventChannel {
    pub fn new(kind: EventKind, rx: mpsc::UnboundedReceiver<serde_json::Value>) -> Self {
        Self { kind, rx }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Wait for the next raw payload.
    pub async fn recv(&mut self) -> Option<serde_json::Value> {
        self.rx.recv().await
    }

    /// Wait for the next payload and decode it into `T`.
    ///
    /// Decode failures are returned per item and do not end the channel.
    pub async fn recv_as<T: DeserializeOwned>(&mut self) -> Option<Result<T, Error>> {
        let payload = self.rx.recv().await?;
        Some(serde_json::from_value(payload.clone()).map_err(|e| Error::deserialization(&e, &payload)))
    }
}

impl Stream for EventChannel {
    type Item = serde_json::Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
