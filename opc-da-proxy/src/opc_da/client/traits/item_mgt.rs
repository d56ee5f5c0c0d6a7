use async_trait::async_trait;

use crate::opc_da::client::remote::{Reply, check_lengths, invoke};
use crate::opc_da::errors::{OpcResult, Status};
use crate::opc_da::ndr::NdrWriter;
use crate::opc_da::typedefs::{ItemAddResult, ItemDef, ItemHandle, ItemResult};
use crate::transport::RemoteRef;

const OPNUM_ADD_ITEMS: u16 = 0;
const OPNUM_VALIDATE_ITEMS: u16 = 1;
const OPNUM_REMOVE_ITEMS: u16 = 2;
const OPNUM_SET_ACTIVE_STATE: u16 = 3;
const OPNUM_SET_CLIENT_HANDLES: u16 = 4;
const OPNUM_SET_DATATYPES: u16 = 5;

/// Item management functionality.
///
/// Provides methods to add, validate, remove and configure items in an OPC
/// group. Every method is batched: results are positional with the input,
/// and an empty batch returns an empty result without a remote call.
#[async_trait]
pub trait ItemMgtTrait: Send + Sync {
    fn interface(&self) -> OpcResult<&RemoteRef>;

    /// Adds items to the group.
    ///
    /// # Arguments
    /// * `items` - Item definitions; a missing client handle is sent as 0
    ///
    /// # Returns
    /// One [`ItemAddResult`] per definition. Failed items carry their status
    /// and no result.
    async fn add_items(&mut self, items: &[ItemDef]) -> OpcResult<Vec<ItemAddResult>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut w = NdrWriter::new();
        w.write_count(items.len())?;
        w.write_struct_array(items)?;

        let reply = invoke(self.interface()?, OPNUM_ADD_ITEMS, w).await?;
        item_results(reply, items)
    }

    /// Checks item definitions without adding them.
    ///
    /// # Arguments
    /// * `items` - Item definitions to check
    /// * `blob_update` - Ask the server for an updated blob per item
    async fn validate_items(
        &mut self,
        items: &[ItemDef],
        blob_update: bool,
    ) -> OpcResult<Vec<ItemAddResult>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut w = NdrWriter::new();
        w.write_count(items.len())?;
        w.write_struct_array(items)?;
        w.write_bool(blob_update);

        let reply = invoke(self.interface()?, OPNUM_VALIDATE_ITEMS, w).await?;
        item_results(reply, items)
    }

    /// Removes items from the group.
    ///
    /// # Returns
    /// One status per server handle
    async fn remove_items(&mut self, server_handles: &[ItemHandle]) -> OpcResult<Vec<Status>> {
        if server_handles.is_empty() {
            return Ok(Vec::new());
        }

        let mut w = NdrWriter::new();
        write_handles(&mut w, server_handles)?;

        let mut reply = invoke(self.interface()?, OPNUM_REMOVE_ITEMS, w).await?;
        reply.read_statuses(server_handles.len())
    }

    /// Sets the active state of items.
    async fn set_active_state(
        &mut self,
        active: bool,
        server_handles: &[ItemHandle],
    ) -> OpcResult<Vec<Status>> {
        if server_handles.is_empty() {
            return Ok(Vec::new());
        }

        let mut w = NdrWriter::new();
        write_handles(&mut w, server_handles)?;
        w.write_bool(active);

        let mut reply = invoke(self.interface()?, OPNUM_SET_ACTIVE_STATE, w).await?;
        reply.read_statuses(server_handles.len())
    }

    /// Replaces the client handles of items.
    ///
    /// # Errors
    /// `InvalidArgument` when the slices differ in length; nothing is sent
    async fn set_client_handles(
        &mut self,
        server_handles: &[ItemHandle],
        client_handles: &[ItemHandle],
    ) -> OpcResult<Vec<Status>> {
        check_lengths(server_handles.len(), client_handles.len(), "SetClientHandles")?;
        if server_handles.is_empty() {
            return Ok(Vec::new());
        }

        let mut w = NdrWriter::new();
        write_handles(&mut w, server_handles)?;
        w.write_u32_array(&client_handles.iter().map(|h| h.0).collect::<Vec<_>>())?;

        let mut reply = invoke(self.interface()?, OPNUM_SET_CLIENT_HANDLES, w).await?;
        reply.read_statuses(server_handles.len())
    }

    /// Changes the requested data types of items.
    ///
    /// # Errors
    /// `InvalidArgument` when the slices differ in length; nothing is sent
    async fn set_datatypes(
        &mut self,
        server_handles: &[ItemHandle],
        requested_types: &[u16],
    ) -> OpcResult<Vec<Status>> {
        check_lengths(server_handles.len(), requested_types.len(), "SetDatatypes")?;
        if server_handles.is_empty() {
            return Ok(Vec::new());
        }

        let mut w = NdrWriter::new();
        write_handles(&mut w, server_handles)?;
        w.write_u16_array(requested_types)?;

        let mut reply = invoke(self.interface()?, OPNUM_SET_DATATYPES, w).await?;
        reply.read_statuses(server_handles.len())
    }
}

/// `dwCount` followed by the conformant handle array.
pub(crate) fn write_handles(w: &mut NdrWriter, handles: &[ItemHandle]) -> OpcResult<()> {
    w.write_count(handles.len())?;
    w.write_u32_array(&handles.iter().map(|h| h.0).collect::<Vec<_>>())
}

fn item_results(mut reply: Reply, items: &[ItemDef]) -> OpcResult<Vec<ItemAddResult>> {
    let results: Vec<ItemResult> = reply
        .reader
        .read_unique_struct_array(items.len(), "item results")?;
    let statuses = reply.read_statuses(items.len())?;

    Ok(items
        .iter()
        .zip(results.into_iter().zip(statuses))
        .map(|(def, (result, status))| ItemAddResult {
            status,
            client_handle: def.client_handle.unwrap_or_default(),
            result: (!status.is_failure()).then_some(result),
        })
        .collect())
}
