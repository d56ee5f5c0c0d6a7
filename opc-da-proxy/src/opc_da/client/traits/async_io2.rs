use async_trait::async_trait;

use crate::opc_da::client::remote::invoke;
use crate::opc_da::errors::{OpcResult, Status};
use crate::opc_da::ndr::NdrWriter;
use crate::opc_da::typedefs::{DataSource, ItemHandle, ItemWrite};
use crate::opc_da::variant;
use crate::transport::RemoteRef;

use super::item_mgt::write_handles;

const OPNUM_READ: u16 = 0;
const OPNUM_WRITE: u16 = 1;
const OPNUM_REFRESH2: u16 = 2;
const OPNUM_CANCEL2: u16 = 3;
const OPNUM_SET_ENABLE: u16 = 4;
const OPNUM_GET_ENABLE: u16 = 5;

/// Cancel id and per-item statuses of an accepted asynchronous request.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncRequest {
    pub cancel_id: u32,
    pub statuses: Vec<Status>,
}

/// Asynchronous I/O functionality (OPC DA 2.0).
///
/// Provides methods for asynchronous read/write operations with
/// transaction tracking and cancellation support. Completions are delivered
/// through the group's data callback, which is not covered here.
#[async_trait]
pub trait AsyncIo2Trait: Send + Sync {
    fn interface(&self) -> OpcResult<&RemoteRef>;

    /// Starts an asynchronous read.
    ///
    /// # Arguments
    /// * `server_handles` - Array of server item handles
    /// * `transaction_id` - Client id echoed in the completion
    async fn read(
        &mut self,
        server_handles: &[ItemHandle],
        transaction_id: u32,
    ) -> OpcResult<AsyncRequest> {
        let mut w = NdrWriter::new();
        write_handles(&mut w, server_handles)?;
        w.write_u32(transaction_id);

        let mut reply = invoke(self.interface()?, OPNUM_READ, w).await?;
        let cancel_id = reply.reader.read_u32()?;
        let statuses = reply.read_statuses(server_handles.len())?;
        Ok(AsyncRequest {
            cancel_id,
            statuses,
        })
    }

    /// Starts an asynchronous write.
    async fn write(&mut self, writes: &[ItemWrite], transaction_id: u32) -> OpcResult<AsyncRequest> {
        let handles: Vec<ItemHandle> = writes.iter().map(|item| item.server_handle).collect();

        let mut w = NdrWriter::new();
        write_handles(&mut w, &handles)?;
        variant::write_variant_array(&mut w, writes.iter().map(|item| &item.value))?;
        w.write_u32(transaction_id);

        let mut reply = invoke(self.interface()?, OPNUM_WRITE, w).await?;
        let cancel_id = reply.reader.read_u32()?;
        let statuses = reply.read_statuses(writes.len())?;
        Ok(AsyncRequest {
            cancel_id,
            statuses,
        })
    }

    /// Asks the server to send every active item of the group.
    ///
    /// # Returns
    /// Cancel id of the refresh
    async fn refresh2(&mut self, source: DataSource, transaction_id: u32) -> OpcResult<u32> {
        let mut w = NdrWriter::new();
        w.write_enum16(source.to_wire());
        w.write_u32(transaction_id);

        let mut reply = invoke(self.interface()?, OPNUM_REFRESH2, w).await?;
        reply.reader.read_u32()
    }

    /// Cancels an outstanding request.
    async fn cancel2(&mut self, cancel_id: u32) -> OpcResult<()> {
        let mut w = NdrWriter::new();
        w.write_u32(cancel_id);
        invoke(self.interface()?, OPNUM_CANCEL2, w).await?;
        Ok(())
    }

    /// Enables or disables data change notifications.
    async fn set_enable(&mut self, enable: bool) -> OpcResult<()> {
        let mut w = NdrWriter::new();
        w.write_bool(enable);
        invoke(self.interface()?, OPNUM_SET_ENABLE, w).await?;
        Ok(())
    }

    async fn get_enable(&mut self) -> OpcResult<bool> {
        let mut reply = invoke(self.interface()?, OPNUM_GET_ENABLE, NdrWriter::new()).await?;
        reply.reader.read_bool()
    }
}
