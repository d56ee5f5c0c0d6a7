use async_trait::async_trait;

use crate::opc_da::client::remote::invoke;
use crate::opc_da::errors::{OpcResult, Status};
use crate::opc_da::iid::IID_IOPC_GROUP_STATE_MGT;
use crate::opc_da::ndr::NdrWriter;
use crate::opc_da::typedefs::{GroupHandle, GroupState, GroupStateUpdate};
use crate::transport::RemoteRef;

const OPNUM_GET_STATE: u16 = 0;
const OPNUM_SET_STATE: u16 = 1;
const OPNUM_SET_NAME: u16 = 2;
const OPNUM_CLONE_GROUP: u16 = 3;

/// Group state management functionality.
///
/// Provides methods to manage OPC group properties including update rates,
/// time bias, deadband, locale settings, and group handles.
#[async_trait]
pub trait GroupStateMgtTrait: Send + Sync {
    fn interface(&self) -> OpcResult<&RemoteRef>;

    /// Gets the current state of the group.
    ///
    /// # Returns
    /// Every group property as currently stored by the server
    async fn get_state(&mut self) -> OpcResult<GroupState> {
        let mut reply = invoke(self.interface()?, OPNUM_GET_STATE, NdrWriter::new()).await?;
        let r = &mut reply.reader;

        let update_rate = r.read_u32()?;
        let active = r.read_bool()?;
        let name = r.read_unique_string()?.unwrap_or_default();
        let time_bias = r.read_i32()?;
        let percent_deadband = r.read_f32()?;
        let locale_id = r.read_u32()?;
        let client_handle = GroupHandle(r.read_u32()?);
        let server_handle = GroupHandle(r.read_u32()?);

        Ok(GroupState {
            update_rate,
            active,
            name,
            time_bias,
            percent_deadband,
            locale_id,
            client_handle,
            server_handle,
        })
    }

    /// Sets group properties. Fields left as `None` are sent as null
    /// pointers and stay unchanged on the server.
    ///
    /// # Returns
    /// Revised update rate and the call status; `OPC_S_UNSUPPORTEDRATE`
    /// when the server picked a different rate
    async fn set_state(&mut self, update: &GroupStateUpdate) -> OpcResult<(u32, Status)> {
        let mut w = NdrWriter::new();
        write_optional(&mut w, update.update_rate, NdrWriter::write_u32);
        write_optional(&mut w, update.active, NdrWriter::write_bool);
        write_optional(&mut w, update.time_bias, NdrWriter::write_i32);
        write_optional(&mut w, update.percent_deadband, NdrWriter::write_f32);
        write_optional(&mut w, update.locale_id, NdrWriter::write_u32);
        write_optional(&mut w, update.client_handle.map(|h| h.0), NdrWriter::write_u32);

        let mut reply = invoke(self.interface()?, OPNUM_SET_STATE, w).await?;
        let revised = reply.reader.read_u32()?;
        Ok((revised, reply.status))
    }

    /// Renames the group.
    async fn set_name(&mut self, name: &str) -> OpcResult<()> {
        let mut w = NdrWriter::new();
        w.write_string(name)?;
        invoke(self.interface()?, OPNUM_SET_NAME, w).await?;
        Ok(())
    }

    /// Creates a copy of the group with the same items and properties.
    ///
    /// # Arguments
    /// * `name` - Name of the new group; empty lets the server pick one
    ///
    /// # Returns
    /// `IOPCGroupStateMgt` on the clone
    async fn clone_group(&mut self, name: &str) -> OpcResult<RemoteRef> {
        let mut w = NdrWriter::new();
        w.write_string(name)?;
        w.write_guid(&IID_IOPC_GROUP_STATE_MGT);

        let mut reply = invoke(self.interface()?, OPNUM_CLONE_GROUP, w).await?;
        reply.require_interface("group clone")
    }
}

fn write_optional<T>(w: &mut NdrWriter, value: Option<T>, write: fn(&mut NdrWriter, T)) {
    w.write_referent(value.is_some());
    if let Some(value) = value {
        write(w, value);
    }
}
