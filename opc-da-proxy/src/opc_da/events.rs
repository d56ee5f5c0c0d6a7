//! Diagnostics for soft statuses.
//!
//! Informational statuses never fail a call. They are logged through
//! `tracing` and, for subscribers of [`crate::Server::subscribe`],
//! broadcast as [`OpcEvent`]s.

use tokio::sync::broadcast;

use super::errors::{Status, format_status};
use super::typedefs::ItemHandle;

/// Capacity of the per-server diagnostics channel. Slow receivers see
/// `RecvError::Lagged` rather than blocking calls.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A named diagnostic raised by a soft status.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum OpcEvent {
    /// `OPC_S_UNSUPPORTEDRATE`: the server chose another update rate.
    UnsupportedRate {
        group: String,
        requested: Option<u32>,
        revised: u32,
    },
    /// `OPC_S_CLAMP`: a written value was accepted but clamped.
    Clamped { server_handle: ItemHandle },
    /// `OPC_S_INUSE`: the object is still referenced by another client.
    InUse { operation: &'static str },
    /// `S_FALSE` on `IEnumString::Next`: fewer names than requested.
    EnumerationExhausted { requested: u32, fetched: u32 },
    /// `E_NOTIMPL` from an optional browse method.
    BrowseNotImplemented { operation: &'static str },
    /// Any other non-failure status that is not `S_OK`.
    SoftStatus { operation: &'static str, code: u32 },
}

/// Cloneable sender half shared by a server and every proxy it creates.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<broadcast::Sender<OpcEvent>>,
}

impl EventSink {
    /// A sink that only logs.
    pub fn detached() -> Self {
        Self::default()
    }

    pub(crate) fn channel() -> (Self, broadcast::Sender<OpcEvent>) {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        (
            Self {
                sender: Some(sender.clone()),
            },
            sender,
        )
    }

    pub fn emit(&self, event: OpcEvent) {
        tracing::warn!(event = ?event, "OPC diagnostic");
        if let Some(sender) = &self.sender {
            // no receivers is fine
            let _ = sender.send(event);
        }
    }

    /// Emits the named event for a known soft status, or a generic one.
    /// `S_OK` and failures are ignored.
    pub fn soft_status(&self, operation: &'static str, status: Status) {
        use super::errors::codes;

        if !status.is_soft() {
            return;
        }
        match status.code() {
            codes::OPC_S_INUSE => self.emit(OpcEvent::InUse { operation }),
            code => {
                tracing::debug!(operation, code = %format_status(code), "soft status");
                self.emit(OpcEvent::SoftStatus { operation, code });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc_da::errors::codes;

    #[test]
    fn test_detached_sink_does_not_panic() {
        EventSink::detached().emit(OpcEvent::InUse { operation: "x" });
    }

    #[test]
    fn test_events_reach_subscribers() {
        let (sink, sender) = EventSink::channel();
        let mut rx = sender.subscribe();
        sink.soft_status("RemoveGroup", Status(codes::OPC_S_INUSE));
        sink.soft_status("Read", Status::OK);
        sink.soft_status("Read", Status(codes::E_FAIL));
        sink.soft_status("Write", Status(0x0004_0100));
        assert_eq!(
            rx.try_recv().unwrap(),
            OpcEvent::InUse {
                operation: "RemoveGroup"
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            OpcEvent::SoftStatus {
                operation: "Write",
                code: 0x0004_0100
            }
        );
        assert!(rx.try_recv().is_err());
    }
}
