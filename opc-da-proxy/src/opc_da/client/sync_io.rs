use crate::opc_da::client::remote::RemoteInterface;
use crate::opc_da::client::traits::SyncIoTrait;
use crate::opc_da::errors::{OpcResult, Status, codes};
use crate::opc_da::events::{EventSink, OpcEvent};
use crate::opc_da::iid::IID_IOPC_SYNC_IO;
use crate::opc_da::typedefs::{DataSource, ItemHandle, ItemValue, ItemWrite};
use crate::transport::RemoteRef;

/// Proxy for a group's `IOPCSyncIO`.
pub struct SyncIo {
    remote: RemoteInterface,
    events: EventSink,
}

impl Default for SyncIo {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncIo {
    pub fn new() -> Self {
        Self::with_events(EventSink::detached())
    }

    pub(crate) fn with_events(events: EventSink) -> Self {
        Self {
            remote: RemoteInterface::new(IID_IOPC_SYNC_IO),
            events,
        }
    }

    pub async fn init(&mut self, unknown: &RemoteRef) -> OpcResult<()> {
        self.remote.attach(unknown).await
    }

    /// Reads items from the cache or the device.
    ///
    /// Results are positional with `server_handles`; items that could not be
    /// read carry a failure status and an empty value.
    pub async fn read(
        &mut self,
        source: DataSource,
        server_handles: &[ItemHandle],
    ) -> OpcResult<Vec<ItemValue>> {
        let values = SyncIoTrait::read(self, source, server_handles).await?;
        let failed = values.iter().filter(|v| v.status.is_failure()).count();
        if failed > 0 {
            tracing::warn!(failed, count = values.len(), "Some items could not be read");
        }
        Ok(values)
    }

    /// Writes one value per item. A clamped value raises
    /// [`OpcEvent::Clamped`].
    pub async fn write(&mut self, writes: &[ItemWrite]) -> OpcResult<Vec<Status>> {
        let statuses = SyncIoTrait::write(self, writes).await?;
        for (write, status) in writes.iter().zip(&statuses) {
            if status.code() == codes::OPC_S_CLAMP {
                self.events.emit(OpcEvent::Clamped {
                    server_handle: write.server_handle,
                });
            }
        }
        Ok(statuses)
    }

    pub async fn end(&mut self) -> OpcResult<()> {
        self.remote.release().await
    }
}

impl SyncIoTrait for SyncIo {
    fn interface(&self) -> OpcResult<&RemoteRef> {
        self.remote.get()
    }
}
