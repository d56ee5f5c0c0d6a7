use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use tracing::Instrument as _;

use crate::opc_da::client::iterator::StringEnumerator;
use crate::opc_da::client::remote::RemoteInterface;
use crate::opc_da::client::traits::BrowseServerAddressSpaceTrait;
use crate::opc_da::config::DEFAULT_ENUM_BATCH_SIZE;
use crate::opc_da::errors::{OpcError, OpcResult, codes};
use crate::opc_da::events::{EventSink, OpcEvent};
use crate::opc_da::iid::IID_IOPC_BROWSE_SERVER_ADDRESS_SPACE;
use crate::opc_da::typedefs::{BrowseDirection, BrowseType};
use crate::opc_da::variant::vt;
use crate::transport::RemoteRef;

/// Outcome of a cursor move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionChange {
    Moved,
    /// The server refused the move because it would not change anything,
    /// such as going up from the root.
    NoEffect,
}

/// Node of a browsed namespace tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseNode {
    /// Fully qualified item ID.
    Leaf(String),
    Branch(BrowseTree),
}

/// Names at one level, mapped to their subtree or item ID.
pub type BrowseTree = BTreeMap<String, BrowseNode>;

/// Proxy for `IOPCBrowseServerAddressSpace`.
///
/// The browse position lives on the server and belongs to this proxy's
/// reference, so every method takes `&mut self`. Names returned by a browse
/// are only valid at the position they were returned from.
pub struct Browser {
    remote: RemoteInterface,
    events: EventSink,
    batch_size: u32,
}

impl Default for Browser {
    fn default() -> Self {
        Self::new()
    }
}

impl Browser {
    pub fn new() -> Self {
        Self::with_events(EventSink::detached(), DEFAULT_ENUM_BATCH_SIZE)
    }

    pub(crate) fn with_events(events: EventSink, batch_size: u32) -> Self {
        Self {
            remote: RemoteInterface::new(IID_IOPC_BROWSE_SERVER_ADDRESS_SPACE),
            events,
            batch_size,
        }
    }

    pub async fn init(&mut self, unknown: &RemoteRef) -> OpcResult<()> {
        self.remote.attach(unknown).await
    }

    pub async fn end(&mut self) -> OpcResult<()> {
        self.remote.release().await
    }

    /// Moves the browse cursor.
    ///
    /// `To` with `None` returns to the root; `Down` needs a branch name;
    /// `Up` ignores `target`.
    ///
    /// # Returns
    /// [`PositionChange::NoEffect`] when the server rejects an `Up` move,
    /// which it does at the root
    pub async fn change_position(
        &mut self,
        target: Option<&str>,
        direction: BrowseDirection,
    ) -> OpcResult<PositionChange> {
        if direction == BrowseDirection::Down && target.is_none_or(str::is_empty) {
            return Err(OpcError::InvalidArgument(
                "moving down needs a branch name".into(),
            ));
        }

        match self
            .change_browse_position(direction, target.unwrap_or_default())
            .await
        {
            Ok(()) => Ok(PositionChange::Moved),
            Err(e) if direction == BrowseDirection::Up && e.is_code(codes::E_FAIL) => {
                tracing::debug!("Already at the root");
                Ok(PositionChange::NoEffect)
            }
            Err(e) => Err(e),
        }
    }

    /// Lists names at the current position.
    ///
    /// # Arguments
    /// * `browse_type` - Branches, leaves, or every item ID below (flat)
    /// * `filter` - Server-specific name filter; empty for none
    /// * `data_type` - Canonical type filter, `VT_EMPTY` for any
    /// * `access_rights` - Access rights filter, 0 for any
    ///
    /// # Returns
    /// An enumerator the caller must end, or `None` when nothing matched
    pub async fn browse(
        &mut self,
        browse_type: BrowseType,
        filter: &str,
        data_type: u16,
        access_rights: u32,
    ) -> OpcResult<Option<StringEnumerator>> {
        self.browse_opc_item_ids(browse_type, filter, data_type, access_rights)
            .await?
            .map(|remote| self.enumerator(remote))
            .transpose()
    }

    /// Lists the access paths of an item. Servers that do not implement
    /// access paths yield an empty list and a
    /// [`OpcEvent::BrowseNotImplemented`].
    pub async fn browse_access_paths(&mut self, item_id: &str) -> OpcResult<Vec<String>> {
        match BrowseServerAddressSpaceTrait::browse_access_paths(self, item_id).await {
            Ok(Some(remote)) => self.enumerator(remote)?.into_vec().await,
            Ok(None) => Ok(Vec::new()),
            Err(e) if e.is_code(codes::E_NOTIMPL) => {
                self.events.emit(OpcEvent::BrowseNotImplemented {
                    operation: "BrowseAccessPaths",
                });
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Every item ID in the namespace, from the root.
    pub async fn browse_all_flat(&mut self) -> OpcResult<Vec<String>> {
        self.change_position(None, BrowseDirection::To).await?;
        self.browse_names(BrowseType::Flat).await
    }

    /// The whole namespace as a tree, from the root.
    ///
    /// The cursor is moved back up after every branch, also when browsing
    /// inside it failed, so a failure leaves the cursor at the root.
    pub async fn browse_all_tree(&mut self) -> OpcResult<BrowseTree> {
        let span = tracing::info_span!("browse_all_tree");
        async {
            self.change_position(None, BrowseDirection::To).await?;
            let tree = self.walk().await?;
            tracing::debug!(top_level = tree.len(), "Namespace browsed");
            Ok(tree)
        }
        .instrument(span)
        .await
    }

    fn walk(&mut self) -> Pin<Box<dyn Future<Output = OpcResult<BrowseTree>> + Send + '_>> {
        Box::pin(async move {
            let mut tree = BrowseTree::new();

            for name in self.browse_names(BrowseType::Leaf).await? {
                let item_id = self.get_item_id(&name).await?;
                tree.insert(name, BrowseNode::Leaf(item_id));
            }

            for branch in self.browse_names(BrowseType::Branch).await? {
                self.change_position(Some(&branch), BrowseDirection::Down)
                    .await?;
                let subtree = self.walk().await;
                let ascended = self.change_position(None, BrowseDirection::Up).await;
                let subtree = subtree?;
                ascended?;
                tree.insert(branch, BrowseNode::Branch(subtree));
            }

            Ok(tree)
        })
    }

    async fn browse_names(&mut self, browse_type: BrowseType) -> OpcResult<Vec<String>> {
        match self.browse(browse_type, "", vt::VT_EMPTY, 0).await? {
            Some(enumerator) => enumerator.into_vec().await,
            None => Ok(Vec::new()),
        }
    }

    fn enumerator(&self, remote: RemoteRef) -> OpcResult<StringEnumerator> {
        Ok(StringEnumerator::from_remote(remote, self.events.clone())?
            .with_batch_size(self.batch_size))
    }
}

impl BrowseServerAddressSpaceTrait for Browser {
    fn interface(&self) -> OpcResult<&RemoteRef> {
        self.remote.get()
    }
}
