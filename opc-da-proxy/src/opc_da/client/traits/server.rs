use async_trait::async_trait;

use crate::opc_da::client::remote::invoke;
use crate::opc_da::config::GroupParams;
use crate::opc_da::errors::{OpcError, OpcResult, Status};
use crate::opc_da::iid::{IID_IENUM_STRING, IID_IOPC_GROUP_STATE_MGT};
use crate::opc_da::ndr::NdrWriter;
use crate::opc_da::typedefs::{EnumScope, GroupHandle, ServerStatus};
use crate::transport::RemoteRef;

const OPNUM_ADD_GROUP: u16 = 0;
const OPNUM_GET_ERROR_STRING: u16 = 1;
const OPNUM_GET_GROUP_BY_NAME: u16 = 2;
const OPNUM_GET_STATUS: u16 = 3;
const OPNUM_REMOVE_GROUP: u16 = 4;
const OPNUM_CREATE_GROUP_ENUMERATOR: u16 = 5;

/// Out parameters of `IOPCServer::AddGroup`.
pub struct AddGroupReply {
    pub server_handle: GroupHandle,
    pub revised_update_rate: u32,
    /// `IOPCGroupStateMgt` on the new group.
    pub group: RemoteRef,
    /// `OPC_S_UNSUPPORTEDRATE` when the rate was revised.
    pub status: Status,
}

/// OPC Server management functionality.
///
/// Provides methods to create and manage groups within an OPC server,
/// as well as monitor server status and enumerate existing groups.
#[async_trait]
pub trait ServerTrait: Send + Sync {
    fn interface(&self) -> OpcResult<&RemoteRef>;

    /// Adds a new group to the OPC server.
    ///
    /// # Arguments
    /// * `name` - Group name for identification; empty lets the server pick one
    /// * `params` - Active flag, rates, bias, deadband, locale and client handle
    ///
    /// # Returns
    /// Server handle, granted update rate and a `IOPCGroupStateMgt`
    /// reference to the group
    async fn add_group(&mut self, name: &str, params: &GroupParams) -> OpcResult<AddGroupReply> {
        let mut w = NdrWriter::new();
        w.write_string(name)?;
        w.write_bool(params.active);
        w.write_u32(params.update_rate);
        w.write_u32(params.client_handle.0);
        w.write_referent(true);
        w.write_i32(params.time_bias);
        w.write_referent(true);
        w.write_f32(params.deadband);
        w.write_u32(params.locale_id);
        w.write_guid(&IID_IOPC_GROUP_STATE_MGT);

        let mut reply = invoke(self.interface()?, OPNUM_ADD_GROUP, w).await?;
        let server_handle = GroupHandle(reply.reader.read_u32()?);
        let revised_update_rate = reply.reader.read_u32()?;
        let group = reply.require_interface("group")?;

        Ok(AddGroupReply {
            server_handle,
            revised_update_rate,
            group,
            status: reply.status,
        })
    }

    /// Gets a server-side description of an error code.
    ///
    /// # Arguments
    /// * `error` - Status code to describe
    /// * `locale_id` - Locale for the returned text
    async fn get_error_string(&mut self, error: u32, locale_id: u32) -> OpcResult<String> {
        let mut w = NdrWriter::new();
        w.write_u32(error);
        w.write_u32(locale_id);

        let mut reply = invoke(self.interface()?, OPNUM_GET_ERROR_STRING, w).await?;
        Ok(reply.reader.read_unique_string()?.unwrap_or_default())
    }

    /// Looks up a private group by name.
    ///
    /// # Returns
    /// `IOPCGroupStateMgt` on the group
    async fn get_group_by_name(&mut self, name: &str) -> OpcResult<RemoteRef> {
        let mut w = NdrWriter::new();
        w.write_string(name)?;
        w.write_guid(&IID_IOPC_GROUP_STATE_MGT);

        let mut reply = invoke(self.interface()?, OPNUM_GET_GROUP_BY_NAME, w).await?;
        reply.require_interface("group")
    }

    /// Gets the current server status.
    ///
    /// # Returns
    /// Status snapshot including times, state, counts and vendor info
    async fn get_status(&mut self) -> OpcResult<ServerStatus> {
        let mut reply = invoke(self.interface()?, OPNUM_GET_STATUS, NdrWriter::new()).await?;
        if reply.reader.read_referent()? == 0 {
            return Err(OpcError::Decode("server returned a null status".into()));
        }
        reply.reader.read_struct()
    }

    /// Removes a group from the server.
    ///
    /// # Arguments
    /// * `server_handle` - Server handle of the group
    /// * `force` - Remove even while clients still reference it
    ///
    /// # Returns
    /// `OPC_S_INUSE` when the group is still referenced and `force` is false
    async fn remove_group(&mut self, server_handle: GroupHandle, force: bool) -> OpcResult<Status> {
        let mut w = NdrWriter::new();
        w.write_u32(server_handle.0);
        w.write_bool(force);

        Ok(invoke(self.interface()?, OPNUM_REMOVE_GROUP, w).await?.status)
    }

    /// Creates an enumerator over group names.
    ///
    /// # Returns
    /// `IEnumString` reference, or `None` when the server has no groups in
    /// `scope`
    async fn create_group_enumerator(&mut self, scope: EnumScope) -> OpcResult<Option<RemoteRef>> {
        let mut w = NdrWriter::new();
        w.write_enum16(scope.to_wire());
        w.write_guid(&IID_IENUM_STRING);

        let mut reply = invoke(self.interface()?, OPNUM_CREATE_GROUP_ENUMERATOR, w).await?;
        reply.take_interface()
    }
}
