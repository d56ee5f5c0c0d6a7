use async_trait::async_trait;

use crate::opc_da::client::remote::invoke;
use crate::opc_da::errors::{OpcResult, Status};
use crate::opc_da::ndr::NdrWriter;
use crate::opc_da::typedefs::{DataSource, ItemHandle, ItemState, ItemValue, ItemWrite};
use crate::opc_da::variant;
use crate::transport::RemoteRef;

use super::item_mgt::write_handles;

const OPNUM_READ: u16 = 0;
const OPNUM_WRITE: u16 = 1;

/// Synchronous I/O functionality (OPC DA 1.0).
///
/// Provides methods for basic synchronous read/write operations
/// with direct server communication.
#[async_trait]
pub trait SyncIoTrait: Send + Sync {
    fn interface(&self) -> OpcResult<&RemoteRef>;

    /// Reads values synchronously from items.
    ///
    /// # Arguments
    /// * `source` - Whether to read from cache or device
    /// * `server_handles` - Array of server item handles
    ///
    /// # Returns
    /// One [`ItemValue`] per handle, in order, each with its own status
    async fn read(
        &mut self,
        source: DataSource,
        server_handles: &[ItemHandle],
    ) -> OpcResult<Vec<ItemValue>> {
        if server_handles.is_empty() {
            return Ok(Vec::new());
        }

        let mut w = NdrWriter::new();
        w.write_enum16(source.to_wire());
        write_handles(&mut w, server_handles)?;

        let mut reply = invoke(self.interface()?, OPNUM_READ, w).await?;
        let states: Vec<ItemState> = reply
            .reader
            .read_unique_struct_array(server_handles.len(), "item states")?;
        let statuses = reply.read_statuses(server_handles.len())?;

        Ok(server_handles
            .iter()
            .zip(states.into_iter().zip(statuses))
            .map(|(server_handle, (state, status))| ItemValue {
                server_handle: *server_handle,
                client_handle: state.client_handle,
                status,
                quality: state.quality,
                timestamp: state.timestamp,
                value: state.value,
            })
            .collect())
    }

    /// Writes values synchronously to items.
    ///
    /// # Returns
    /// One status per write. `OPC_S_CLAMP` means the value was accepted
    /// after clamping.
    async fn write(&mut self, writes: &[ItemWrite]) -> OpcResult<Vec<Status>> {
        if writes.is_empty() {
            return Ok(Vec::new());
        }

        let handles: Vec<ItemHandle> = writes.iter().map(|item| item.server_handle).collect();

        let mut w = NdrWriter::new();
        write_handles(&mut w, &handles)?;
        variant::write_variant_array(&mut w, writes.iter().map(|item| &item.value))?;

        let mut reply = invoke(self.interface()?, OPNUM_WRITE, w).await?;
        reply.read_statuses(writes.len())
    }
}
