use crate::opc_da::client::remote::RemoteInterface;
use crate::opc_da::client::traits::ItemIoTrait;
use crate::opc_da::errors::{OpcResult, Status, codes};
use crate::opc_da::events::{EventSink, OpcEvent};
use crate::opc_da::iid::IID_IOPC_ITEM_IO;
use crate::opc_da::typedefs::{ItemIoRead, ItemIoValue, ItemIoWrite};
use crate::transport::RemoteRef;

/// Proxy for the server's `IOPCItemIO` (OPC DA 3.0): reads and writes by
/// item ID without a group.
pub struct ItemIo {
    remote: RemoteInterface,
    events: EventSink,
}

impl Default for ItemIo {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemIo {
    pub fn new() -> Self {
        Self::with_events(EventSink::detached())
    }

    pub(crate) fn with_events(events: EventSink) -> Self {
        Self {
            remote: RemoteInterface::new(IID_IOPC_ITEM_IO),
            events,
        }
    }

    pub async fn init(&mut self, unknown: &RemoteRef) -> OpcResult<()> {
        self.remote.attach(unknown).await
    }

    pub async fn read(&mut self, items: &[ItemIoRead]) -> OpcResult<Vec<ItemIoValue>> {
        let values = ItemIoTrait::read(self, items).await?;
        for (item, value) in items.iter().zip(&values) {
            if value.status.is_failure() {
                tracing::warn!(item_id = %item.item_id, status = %value.status, "Item read failed");
            }
        }
        Ok(values)
    }

    /// Writes by item ID. Clamped writes are reported with a server handle
    /// of 0, since these items have none.
    pub async fn write_vqt(&mut self, items: &[ItemIoWrite]) -> OpcResult<Vec<Status>> {
        let statuses = ItemIoTrait::write_vqt(self, items).await?;
        for (item, status) in items.iter().zip(&statuses) {
            if status.code() == codes::OPC_S_CLAMP {
                tracing::debug!(item_id = %item.item_id, "Write clamped");
                self.events.emit(OpcEvent::Clamped {
                    server_handle: Default::default(),
                });
            }
        }
        Ok(statuses)
    }

    pub async fn end(&mut self) -> OpcResult<()> {
        self.remote.release().await
    }
}

impl ItemIoTrait for ItemIo {
    fn interface(&self) -> OpcResult<&RemoteRef> {
        self.remote.get()
    }
}
