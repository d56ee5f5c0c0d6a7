use crate::opc_da::client::async_io2::AsyncIo2;
use crate::opc_da::client::item_manager::ItemManager;
use crate::opc_da::client::remote::RemoteInterface;
use crate::opc_da::client::sync_io::SyncIo;
use crate::opc_da::client::traits::GroupStateMgtTrait;
use crate::opc_da::errors::{OpcResult, codes};
use crate::opc_da::events::{EventSink, OpcEvent};
use crate::opc_da::iid::IID_IOPC_GROUP_STATE_MGT;
use crate::opc_da::typedefs::{GroupState, GroupStateUpdate};
use crate::transport::RemoteRef;

/// Proxy for one OPC group.
///
/// Owns the group's `IOPCGroupStateMgt` reference and the item, sync and
/// async proxies created from it. Those are created on first use and kept
/// until [`GroupStateManager::end`], which releases them before the group
/// itself.
pub struct GroupStateManager {
    remote: RemoteInterface,
    events: EventSink,
    name: String,
    item_manager: Option<ItemManager>,
    sync_io: Option<SyncIo>,
    async_io2: Option<AsyncIo2>,
}

impl Default for GroupStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupStateManager {
    pub fn new() -> Self {
        Self::with_events(EventSink::detached(), String::new())
    }

    pub(crate) fn with_events(events: EventSink, name: String) -> Self {
        Self {
            remote: RemoteInterface::new(IID_IOPC_GROUP_STATE_MGT),
            events,
            name,
            item_manager: None,
            sync_io: None,
            async_io2: None,
        }
    }

    /// Wraps the `IOPCGroupStateMgt` reference returned by `AddGroup`,
    /// `GetGroupByName` or `CloneGroup`.
    pub(crate) fn from_remote(remote: RemoteRef, events: EventSink, name: String) -> OpcResult<Self> {
        let mut group = Self::with_events(events, name);
        group.remote.adopt(remote)?;
        Ok(group)
    }

    pub async fn init(&mut self, unknown: &RemoteRef) -> OpcResult<()> {
        self.remote.attach(unknown).await
    }

    /// Name as last known locally: the name the group was created or found
    /// with, updated by `set_name` and `get_state`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_attached(&self) -> bool {
        self.remote.is_attached()
    }

    pub async fn get_state(&mut self) -> OpcResult<GroupState> {
        let state = GroupStateMgtTrait::get_state(self).await?;
        self.name.clone_from(&state.name);
        Ok(state)
    }

    /// Applies the fields set in `update`.
    ///
    /// # Returns
    /// The update rate the server granted. A rate other than the requested
    /// one raises [`OpcEvent::UnsupportedRate`].
    pub async fn set_state(&mut self, update: &GroupStateUpdate) -> OpcResult<u32> {
        let (revised, status) = GroupStateMgtTrait::set_state(self, update).await?;
        if status.code() == codes::OPC_S_UNSUPPORTEDRATE {
            self.events.emit(OpcEvent::UnsupportedRate {
                group: self.name.clone(),
                requested: update.update_rate,
                revised,
            });
        } else {
            self.events.soft_status("SetState", status);
        }
        Ok(revised)
    }

    pub async fn set_name(&mut self, name: &str) -> OpcResult<()> {
        GroupStateMgtTrait::set_name(self, name).await?;
        tracing::debug!(from = %self.name, to = name, "Group renamed");
        self.name = name.to_string();
        Ok(())
    }

    /// Duplicates the group on the server. The copy is independent, has its
    /// own server handle and starts inactive.
    pub async fn clone_group(&mut self, name: &str) -> OpcResult<GroupStateManager> {
        let remote = GroupStateMgtTrait::clone_group(self, name).await?;
        Self::from_remote(remote, self.events.clone(), name.to_string())
    }

    pub async fn get_item_manager(&mut self) -> OpcResult<&mut ItemManager> {
        let manager = match self.item_manager.take() {
            Some(manager) => manager,
            None => {
                let mut manager = ItemManager::new();
                manager.init(self.remote.get()?).await?;
                tracing::debug!(group = %self.name, "Item manager created");
                manager
            }
        };
        Ok(self.item_manager.insert(manager))
    }

    pub async fn get_sync_io(&mut self) -> OpcResult<&mut SyncIo> {
        let sync_io = match self.sync_io.take() {
            Some(sync_io) => sync_io,
            None => {
                let mut sync_io = SyncIo::with_events(self.events.clone());
                sync_io.init(self.remote.get()?).await?;
                tracing::debug!(group = %self.name, "Sync I/O created");
                sync_io
            }
        };
        Ok(self.sync_io.insert(sync_io))
    }

    pub async fn get_async_io2(&mut self) -> OpcResult<&mut AsyncIo2> {
        let async_io2 = match self.async_io2.take() {
            Some(async_io2) => async_io2,
            None => {
                let mut async_io2 = AsyncIo2::new();
                async_io2.init(self.remote.get()?).await?;
                tracing::debug!(group = %self.name, "Async I/O created");
                async_io2
            }
        };
        Ok(self.async_io2.insert(async_io2))
    }

    /// Releases the child proxies, then the group reference.
    ///
    /// A child that fails to release is logged and dropped; only the
    /// group's own release error is returned. Ending twice is a no-op.
    pub async fn end(&mut self) -> OpcResult<()> {
        if let Some(mut manager) = self.item_manager.take() {
            if let Err(e) = manager.end().await {
                tracing::warn!(group = %self.name, error = %e, "Failed to release item manager");
            }
        }
        if let Some(mut sync_io) = self.sync_io.take() {
            if let Err(e) = sync_io.end().await {
                tracing::warn!(group = %self.name, error = %e, "Failed to release sync I/O");
            }
        }
        if let Some(mut async_io2) = self.async_io2.take() {
            if let Err(e) = async_io2.end().await {
                tracing::warn!(group = %self.name, error = %e, "Failed to release async I/O");
            }
        }
        self.remote.release().await
    }
}

impl GroupStateMgtTrait for GroupStateManager {
    fn interface(&self) -> OpcResult<&RemoteRef> {
        self.remote.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc_da::client::testing::{ScriptedTransport, write_interface_pointer};
    use crate::opc_da::errors::OpcError;
    use crate::opc_da::iid::{IID_IOPC_ASYNC_IO2, IID_IOPC_ITEM_MGT, IID_IOPC_SYNC_IO};
    use crate::opc_da::ndr::NdrWriter;
    use crate::opc_da::typedefs::GroupHandle;

    async fn group(transport: &ScriptedTransport, events: EventSink) -> GroupStateManager {
        let mut group = GroupStateManager::with_events(events, "Fast".into());
        group.init(&transport.root()).await.unwrap();
        group
    }

    #[tokio::test]
    async fn test_get_state_decodes_every_field() {
        let transport = ScriptedTransport::new();
        let mut group = group(&transport, EventSink::detached()).await;
        let mut w = NdrWriter::new();
        w.write_u32(500);
        w.write_bool(true);
        w.write_unique_string(Some("Renamed")).unwrap();
        w.write_i32(-60);
        w.write_f32(2.5);
        w.write_u32(1033);
        w.write_u32(7);
        w.write_u32(0x0102);
        transport.respond(w, codes::S_OK);

        let state = group.get_state().await.unwrap();

        assert_eq!(
            state,
            GroupState {
                update_rate: 500,
                active: true,
                name: "Renamed".into(),
                time_bias: -60,
                percent_deadband: 2.5,
                locale_id: 1033,
                client_handle: GroupHandle(7),
                server_handle: GroupHandle(0x0102),
            }
        );
        assert_eq!(group.name(), "Renamed");
    }

    #[tokio::test]
    async fn test_set_state_sends_null_for_unset_fields() {
        let transport = ScriptedTransport::new();
        let (events, sender) = EventSink::channel();
        let mut rx = sender.subscribe();
        let mut group = group(&transport, events).await;
        let mut w = NdrWriter::new();
        w.write_u32(1000);
        transport.respond(w, codes::OPC_S_UNSUPPORTEDRATE);

        let revised = group
            .set_state(&GroupStateUpdate {
                update_rate: Some(10),
                active: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(revised, 1000);
        assert_eq!(
            rx.try_recv().unwrap(),
            OpcEvent::UnsupportedRate {
                group: "Fast".into(),
                requested: Some(10),
                revised: 1000,
            }
        );

        let mut r = transport.last_call().unwrap().reader();
        assert_ne!(r.read_referent().unwrap(), 0);
        assert_eq!(r.read_u32().unwrap(), 10);
        assert_ne!(r.read_referent().unwrap(), 0);
        assert!(!r.read_bool().unwrap());
        for _ in 0..4 {
            assert_eq!(r.read_referent().unwrap(), 0);
        }
        assert_eq!(r.remaining(), 0);
    }

    #[tokio::test]
    async fn test_set_name_updates_label() {
        let transport = ScriptedTransport::new();
        let mut group = group(&transport, EventSink::detached()).await;
        transport.respond_status(codes::S_OK);
        transport.respond_status(codes::OPC_E_DUPLICATENAME);

        group.set_name("Slow").await.unwrap();
        assert_eq!(group.name(), "Slow");

        let err = group.set_name("Taken").await.unwrap_err();
        assert!(err.is_code(codes::OPC_E_DUPLICATENAME));
        assert_eq!(group.name(), "Slow");
    }

    #[tokio::test]
    async fn test_clone_group_is_independent() {
        let transport = ScriptedTransport::new();
        let mut group = group(&transport, EventSink::detached()).await;
        let mut w = NdrWriter::new();
        write_interface_pointer(&mut w);
        transport.respond_with_interfaces(w, codes::S_OK, &[IID_IOPC_GROUP_STATE_MGT]);

        let mut clone = group.clone_group("Fast copy").await.unwrap();

        assert_eq!(clone.name(), "Fast copy");
        let mut r = transport.last_call().unwrap().reader();
        assert_eq!(r.read_string().unwrap(), "Fast copy");
        assert_eq!(r.read_guid().unwrap(), IID_IOPC_GROUP_STATE_MGT);

        clone.end().await.unwrap();
        assert!(group.is_attached());
        assert_eq!(transport.released(), vec![IID_IOPC_GROUP_STATE_MGT]);
    }

    #[tokio::test]
    async fn test_children_are_memoized() {
        let transport = ScriptedTransport::new();
        let mut group = group(&transport, EventSink::detached()).await;

        group.get_item_manager().await.unwrap();
        group.get_item_manager().await.unwrap();
        group.get_sync_io().await.unwrap();
        group.get_sync_io().await.unwrap();
        group.get_async_io2().await.unwrap();

        assert_eq!(
            transport.queried(),
            vec![
                IID_IOPC_GROUP_STATE_MGT,
                IID_IOPC_ITEM_MGT,
                IID_IOPC_SYNC_IO,
                IID_IOPC_ASYNC_IO2,
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_child_interface_is_not_cached() {
        let transport = ScriptedTransport::new();
        transport.refuse_interface(IID_IOPC_ASYNC_IO2);
        let mut group = group(&transport, EventSink::detached()).await;

        let err = group.get_async_io2().await.err().unwrap();
        assert!(matches!(err, OpcError::NoSuchInterface { .. }));
        assert!(group.get_async_io2().await.is_err());
    }

    #[tokio::test]
    async fn test_end_releases_children_first() {
        let transport = ScriptedTransport::new();
        let mut group = group(&transport, EventSink::detached()).await;
        group.get_async_io2().await.unwrap();
        group.get_sync_io().await.unwrap();
        group.get_item_manager().await.unwrap();

        group.end().await.unwrap();
        group.end().await.unwrap();

        assert_eq!(
            transport.released(),
            vec![
                IID_IOPC_ITEM_MGT,
                IID_IOPC_SYNC_IO,
                IID_IOPC_ASYNC_IO2,
                IID_IOPC_GROUP_STATE_MGT,
            ]
        );
        assert!(matches!(
            group.get_sync_io().await.err().unwrap(),
            OpcError::NotInitialized("IOPCGroupStateMgt")
        ));
    }
}
