use async_trait::async_trait;

use crate::opc_da::client::remote::invoke;
use crate::opc_da::errors::OpcResult;
use crate::opc_da::ndr::NdrWriter;
use crate::opc_da::typedefs::{BrowseDirection, BrowseType, NamespaceType};
use crate::transport::RemoteRef;

const OPNUM_QUERY_ORGANIZATION: u16 = 0;
const OPNUM_CHANGE_BROWSE_POSITION: u16 = 1;
const OPNUM_BROWSE_OPC_ITEM_IDS: u16 = 2;
const OPNUM_GET_ITEM_ID: u16 = 3;
const OPNUM_BROWSE_ACCESS_PATHS: u16 = 4;

/// Server address space browsing functionality (OPC DA 2.0).
///
/// Provides methods to navigate and discover items in the OPC server's
/// address space, supporting both hierarchical and flat browsing.
/// The browse position is server-side state owned by this interface
/// reference.
#[async_trait]
pub trait BrowseServerAddressSpaceTrait: Send + Sync {
    fn interface(&self) -> OpcResult<&RemoteRef>;

    /// Queries the organization type of the server's address space.
    async fn query_organization(&mut self) -> OpcResult<NamespaceType> {
        let mut reply = invoke(self.interface()?, OPNUM_QUERY_ORGANIZATION, NdrWriter::new()).await?;
        NamespaceType::from_wire(reply.reader.read_enum16()?)
    }

    /// Changes the current position in the server's address space.
    ///
    /// # Arguments
    /// * `direction` - Up, Down, or To
    /// * `name` - Branch to move down into, or the full path for `To`
    ///   (empty moves to the root); ignored for `Up`
    async fn change_browse_position(
        &mut self,
        direction: BrowseDirection,
        name: &str,
    ) -> OpcResult<()> {
        let mut w = NdrWriter::new();
        w.write_enum16(direction.to_wire());
        w.write_string(name)?;

        invoke(self.interface()?, OPNUM_CHANGE_BROWSE_POSITION, w).await?;
        Ok(())
    }

    /// Browses item IDs at the current position.
    ///
    /// # Arguments
    /// * `browse_type` - Branch, Leaf, or Flat
    /// * `filter` - Server-specific name filter; empty for none
    /// * `data_type` - Canonical type filter, `VT_EMPTY` for any
    /// * `access_rights` - Access rights filter, 0 for any
    ///
    /// # Returns
    /// `IEnumString` over the matching names, or `None` when nothing matched
    async fn browse_opc_item_ids(
        &mut self,
        browse_type: BrowseType,
        filter: &str,
        data_type: u16,
        access_rights: u32,
    ) -> OpcResult<Option<RemoteRef>> {
        let mut w = NdrWriter::new();
        w.write_enum16(browse_type.to_wire());
        w.write_string(filter)?;
        w.write_u16(data_type);
        w.write_u32(access_rights);

        let mut reply = invoke(self.interface()?, OPNUM_BROWSE_OPC_ITEM_IDS, w).await?;
        reply.take_interface()
    }

    /// Gets the fully qualified item ID for a name seen at the current
    /// position.
    async fn get_item_id(&mut self, item_data_id: &str) -> OpcResult<String> {
        let mut w = NdrWriter::new();
        w.write_string(item_data_id)?;

        let mut reply = invoke(self.interface()?, OPNUM_GET_ITEM_ID, w).await?;
        Ok(reply.reader.read_unique_string()?.unwrap_or_default())
    }

    /// Browses the access paths of an item.
    ///
    /// # Returns
    /// `IEnumString` over the access paths, or `None` when there are none
    async fn browse_access_paths(&mut self, item_id: &str) -> OpcResult<Option<RemoteRef>> {
        let mut w = NdrWriter::new();
        w.write_string(item_id)?;

        let mut reply = invoke(self.interface()?, OPNUM_BROWSE_ACCESS_PATHS, w).await?;
        reply.take_interface()
    }
}
