use std::collections::BTreeMap;

use tokio::sync::broadcast;
use tracing::Instrument as _;

use crate::opc_da::client::browser::Browser;
use crate::opc_da::client::common::Common;
use crate::opc_da::client::group::GroupStateManager;
use crate::opc_da::client::item_io::ItemIo;
use crate::opc_da::client::item_properties::ItemProperties;
use crate::opc_da::client::iterator::StringEnumerator;
use crate::opc_da::client::remote::RemoteInterface;
use crate::opc_da::client::traits::ServerTrait;
use crate::opc_da::config::{GroupOptions, ServerOptions};
use crate::opc_da::errors::{OpcError, OpcResult, codes};
use crate::opc_da::events::{EventSink, OpcEvent};
use crate::opc_da::iid::IID_IOPC_SERVER;
use crate::opc_da::typedefs::{EnumScope, GroupHandle, ServerStatus};
use crate::transport::RemoteRef;

/// Key of a group owned by a [`Server`]. Only meaningful to the server that
/// returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(u64);

/// Group to remove: one owned by this server, or any group by its server
/// handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupTarget {
    Key(GroupKey),
    Handle(GroupHandle),
}

impl From<GroupKey> for GroupTarget {
    fn from(key: GroupKey) -> Self {
        Self::Key(key)
    }
}

impl From<GroupHandle> for GroupTarget {
    fn from(handle: GroupHandle) -> Self {
        Self::Handle(handle)
    }
}

struct GroupEntry {
    group: GroupStateManager,
    /// Known when the group was added here; looked up otherwise.
    server_handle: Option<GroupHandle>,
}

/// Proxy for an OPC DA server's `IOPCServer`, and owner of everything
/// created through it.
///
/// Groups live in an arena keyed by [`GroupKey`]. The `IOPCCommon`, browse,
/// item I/O and item property proxies are created on first use.
/// [`Server::end`] releases groups first, then those proxies, then the
/// server reference.
pub struct Server {
    remote: RemoteInterface,
    options: ServerOptions,
    events: EventSink,
    sender: broadcast::Sender<OpcEvent>,
    groups: BTreeMap<GroupKey, GroupEntry>,
    next_key: u64,
    next_group_handle: u32,
    common: Option<Common>,
    browser: Option<Browser>,
    item_io: Option<ItemIo>,
    item_properties: Option<ItemProperties>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new(ServerOptions::default())
    }
}

impl Server {
    pub fn new(options: ServerOptions) -> Self {
        let (events, sender) = EventSink::channel();
        Self {
            remote: RemoteInterface::new(IID_IOPC_SERVER),
            options,
            events,
            sender,
            groups: BTreeMap::new(),
            next_key: 0,
            next_group_handle: rand::random::<u32>(),
            common: None,
            browser: None,
            item_io: None,
            item_properties: None,
        }
    }

    /// Queries the server object for `IOPCServer`.
    pub async fn init(&mut self, unknown: &RemoteRef) -> OpcResult<()> {
        self.remote.attach(unknown).await?;
        tracing::info!("Connected to OPC server");
        Ok(())
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Diagnostics raised by this server and every proxy created through it.
    pub fn subscribe(&self) -> broadcast::Receiver<OpcEvent> {
        self.sender.subscribe()
    }

    /// Adds a group.
    ///
    /// # Arguments
    /// * `name` - Group name; empty lets the server pick one
    /// * `options` - Overrides of the construction defaults
    ///
    /// # Returns
    /// Key of the new group. When the server revised the update rate the
    /// group is still created and [`OpcEvent::UnsupportedRate`] is raised.
    pub async fn add_group(&mut self, name: &str, options: &GroupOptions) -> OpcResult<GroupKey> {
        let counter = &mut self.next_group_handle;
        let params = self.options.resolve(options, || allocate_group_handle(counter));

        let reply = ServerTrait::add_group(self, name, &params).await?;
        if reply.status.code() == codes::OPC_S_UNSUPPORTEDRATE {
            self.events.emit(OpcEvent::UnsupportedRate {
                group: name.to_string(),
                requested: Some(params.update_rate),
                revised: reply.revised_update_rate,
            });
        } else {
            self.events.soft_status("AddGroup", reply.status);
        }

        let group = GroupStateManager::from_remote(reply.group, self.events.clone(), name.to_string())?;
        tracing::info!(
            group = name,
            server_handle = reply.server_handle.0,
            update_rate = reply.revised_update_rate,
            "Group added"
        );
        Ok(self.insert(group, Some(reply.server_handle)))
    }

    /// Opens an existing private group by name.
    pub async fn get_group_by_name(&mut self, name: &str) -> OpcResult<GroupKey> {
        let remote = ServerTrait::get_group_by_name(self, name).await?;
        let group = GroupStateManager::from_remote(remote, self.events.clone(), name.to_string())?;
        Ok(self.insert(group, None))
    }

    pub fn group(&self, key: GroupKey) -> Option<&GroupStateManager> {
        self.groups.get(&key).map(|entry| &entry.group)
    }

    pub fn group_mut(&mut self, key: GroupKey) -> Option<&mut GroupStateManager> {
        self.groups.get_mut(&key).map(|entry| &mut entry.group)
    }

    /// Keys of the groups currently owned, oldest first.
    pub fn group_keys(&self) -> Vec<GroupKey> {
        self.groups.keys().copied().collect()
    }

    /// Names of the groups in `scope`, as the server lists them.
    pub async fn get_groups(&mut self, scope: EnumScope) -> OpcResult<Vec<String>> {
        match self.create_group_enumerator(scope).await? {
            Some(remote) => {
                StringEnumerator::from_remote(remote, self.events.clone())?
                    .with_batch_size(self.options.enum_batch_size)
                    .into_vec()
                    .await
            }
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_status(&mut self) -> OpcResult<ServerStatus> {
        let span = tracing::info_span!("get_status");
        async {
            let status = ServerTrait::get_status(self).await?;
            tracing::debug!(
                state = %status.server_state,
                groups = status.group_count,
                vendor = %status.vendor_info,
                "Server status"
            );
            Ok(status)
        }
        .instrument(span)
        .await
    }

    /// Removes a group from the server.
    ///
    /// A group owned by this server is ended locally first; its server
    /// handle is looked up when it is not known yet. `OPC_S_INUSE` and
    /// other soft statuses are raised as events.
    ///
    /// The local group is forgotten before `RemoveGroup` is sent. If the
    /// server then fails the call, the error is returned and the group can
    /// only be removed again by its server handle, which is logged.
    pub async fn remove_group(
        &mut self,
        target: impl Into<GroupTarget>,
        force: bool,
    ) -> OpcResult<()> {
        let (handle, owned) = match target.into() {
            GroupTarget::Key(key) => {
                let entry = self
                    .groups
                    .get_mut(&key)
                    .ok_or_else(|| OpcError::InvalidArgument(format!("unknown group {key:?}")))?;
                let handle = match entry.server_handle {
                    Some(handle) => handle,
                    None => entry.group.get_state().await?.server_handle,
                };
                (handle, self.groups.remove(&key))
            }
            GroupTarget::Handle(handle) => {
                let key = self
                    .groups
                    .iter()
                    .find(|(_, entry)| entry.server_handle == Some(handle))
                    .map(|(key, _)| *key);
                (handle, key.and_then(|key| self.groups.remove(&key)))
            }
        };

        if let Some(mut entry) = owned {
            if let Err(e) = entry.group.end().await {
                tracing::warn!(group = %entry.group.name(), error = %e, "Failed to release group");
            }
        }

        let status = ServerTrait::remove_group(self, handle, force)
            .await
            .inspect_err(|e| {
                tracing::warn!(server_handle = handle.0, error = %e, "RemoveGroup failed");
            })?;
        self.events.soft_status("RemoveGroup", status);
        tracing::info!(server_handle = handle.0, "Group removed");
        Ok(())
    }

    /// Clones a group owned by this server into a new, inactive group.
    pub async fn clone_group(&mut self, key: GroupKey, name: &str) -> OpcResult<GroupKey> {
        let group = self
            .group_mut(key)
            .ok_or_else(|| OpcError::InvalidArgument(format!("unknown group {key:?}")))?;
        let clone = group.clone_group(name).await?;
        Ok(self.insert(clone, None))
    }

    /// Server description of `code`, in `locale_id` or the default locale.
    pub async fn get_error_string(&mut self, code: u32, locale_id: Option<u32>) -> OpcResult<String> {
        let locale_id = locale_id.unwrap_or(self.options.default_locale);
        ServerTrait::get_error_string(self, code, locale_id).await
    }

    pub async fn get_common(&mut self) -> OpcResult<&mut Common> {
        let common = match self.common.take() {
            Some(common) => common,
            None => {
                let mut common = Common::new();
                common.init(self.remote.get()?).await?;
                tracing::debug!("Common interface created");
                common
            }
        };
        Ok(self.common.insert(common))
    }

    pub async fn get_browser(&mut self) -> OpcResult<&mut Browser> {
        let browser = match self.browser.take() {
            Some(browser) => browser,
            None => {
                let mut browser =
                    Browser::with_events(self.events.clone(), self.options.enum_batch_size);
                browser.init(self.remote.get()?).await?;
                tracing::debug!("Browser created");
                browser
            }
        };
        Ok(self.browser.insert(browser))
    }

    pub async fn get_item_io(&mut self) -> OpcResult<&mut ItemIo> {
        let item_io = match self.item_io.take() {
            Some(item_io) => item_io,
            None => {
                let mut item_io = ItemIo::with_events(self.events.clone());
                item_io.init(self.remote.get()?).await?;
                tracing::debug!("Item I/O created");
                item_io
            }
        };
        Ok(self.item_io.insert(item_io))
    }

    pub async fn get_item_properties(&mut self) -> OpcResult<&mut ItemProperties> {
        let properties = match self.item_properties.take() {
            Some(properties) => properties,
            None => {
                let mut properties = ItemProperties::new();
                properties.init(self.remote.get()?).await?;
                tracing::debug!("Item properties created");
                properties
            }
        };
        Ok(self.item_properties.insert(properties))
    }

    /// Ends every group, then the server-level proxies, then releases the
    /// server. Failures below the server are logged; ending twice is a
    /// no-op.
    pub async fn end(&mut self) -> OpcResult<()> {
        for (_, mut entry) in std::mem::take(&mut self.groups) {
            if let Err(e) = entry.group.end().await {
                tracing::warn!(group = %entry.group.name(), error = %e, "Failed to release group");
            }
        }

        let mut ended = Vec::new();
        if let Some(mut common) = self.common.take() {
            ended.push(("IOPCCommon", common.end().await));
        }
        if let Some(mut browser) = self.browser.take() {
            ended.push(("IOPCBrowseServerAddressSpace", browser.end().await));
        }
        if let Some(mut item_io) = self.item_io.take() {
            ended.push(("IOPCItemIO", item_io.end().await));
        }
        if let Some(mut properties) = self.item_properties.take() {
            ended.push(("IOPCItemProperties", properties.end().await));
        }
        for (interface, result) in ended {
            if let Err(e) = result {
                tracing::warn!(interface, error = %e, "Failed to release interface");
            }
        }

        if self.remote.is_attached() {
            tracing::info!("Disconnecting from OPC server");
        }
        self.remote.release().await
    }

    fn insert(&mut self, group: GroupStateManager, server_handle: Option<GroupHandle>) -> GroupKey {
        let key = GroupKey(self.next_key);
        self.next_key += 1;
        self.groups.insert(
            key,
            GroupEntry {
                group,
                server_handle,
            },
        );
        key
    }
}

impl ServerTrait for Server {
    fn interface(&self) -> OpcResult<&RemoteRef> {
        self.remote.get()
    }
}

fn allocate_group_handle(counter: &mut u32) -> GroupHandle {
    let handle = GroupHandle(*counter);
    *counter = counter.wrapping_add(1);
    handle
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::opc_da::client::testing::{FakeEnumString, ScriptedTransport, write_interface_pointer};
    use crate::opc_da::iid::{IID_IENUM_STRING, IID_IOPC_COMMON, IID_IOPC_GROUP_STATE_MGT};
    use crate::opc_da::ndr::NdrWriter;
    use crate::opc_da::typedefs::ServerState;

    async fn server(transport: &ScriptedTransport) -> Server {
        let mut server = Server::default();
        server.init(&transport.root()).await.unwrap();
        server
    }

    fn add_group_reply(transport: &ScriptedTransport, server_handle: u32, status: u32) {
        let mut w = NdrWriter::new();
        w.write_u32(server_handle);
        w.write_u32(1000);
        write_interface_pointer(&mut w);
        transport.respond_with_interfaces(w, status, &[IID_IOPC_GROUP_STATE_MGT]);
    }

    #[tokio::test]
    async fn test_get_status_decodes_record() {
        let transport = ScriptedTransport::new();
        let mut server = server(&transport).await;

        let mut w = NdrWriter::new();
        w.write_u32(0x0002_0000);
        w.write_u32(0xF03E_4000);
        w.write_u32(0x01D4_A164);
        w.write_u32(0xCAE9_3C50);
        w.write_u32(0x01D9_9F85);
        w.write_u32(0);
        w.write_u32(0);
        w.write_u16(1);
        w.write_u16(0);
        w.write_u32(3);
        w.write_u32(0xFFFF_FFFF);
        w.write_u16(2);
        w.write_u16(5);
        w.write_u16(1234);
        w.write_u16(0);
        w.write_u32(0x0002_0004);
        w.write_string("ACME").unwrap();
        transport.respond(w, codes::S_OK);

        let status = server.get_status().await.unwrap();

        assert_eq!(
            status.start_time.to_datetime(),
            Some(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(status.current_time.ticks(), 133_313_060_967_890_000);
        assert_eq!(status.current_time.unix_millis(), 1_686_832_496_789);
        assert!(status.last_update_time.is_zero());
        assert_eq!(status.last_update_time.to_datetime(), None);
        assert_eq!(status.server_state, ServerState::Running);
        assert_eq!(status.group_count, 3);
        assert_eq!(status.band_width, 0xFFFF_FFFF);
        assert_eq!(
            (
                status.major_version,
                status.minor_version,
                status.build_number
            ),
            (2, 5, 1234)
        );
        assert_eq!(status.reserved, 0);
        assert_eq!(status.vendor_info, "ACME");
        assert_eq!(transport.last_call().unwrap().opnum, 3);
    }

    #[tokio::test]
    async fn test_add_group_request_and_revised_rate() {
        let transport = ScriptedTransport::new();
        let mut server = server(&transport).await;
        let mut rx = server.subscribe();
        add_group_reply(&transport, 0x55, codes::OPC_S_UNSUPPORTEDRATE);

        let key = server
            .add_group(
                "Fast",
                &GroupOptions::default()
                    .update_rate(10)
                    .client_handle(GroupHandle(3)),
            )
            .await
            .unwrap();

        assert_eq!(server.group(key).unwrap().name(), "Fast");
        assert_eq!(
            rx.try_recv().unwrap(),
            OpcEvent::UnsupportedRate {
                group: "Fast".into(),
                requested: Some(10),
                revised: 1000,
            }
        );

        let call = transport.last_call().unwrap();
        assert_eq!(call.opnum, 0);
        let mut r = call.reader();
        assert_eq!(r.read_string().unwrap(), "Fast");
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_u32().unwrap(), 10);
        assert_eq!(r.read_u32().unwrap(), 3);
        assert_ne!(r.read_referent().unwrap(), 0);
        assert_eq!(r.read_i32().unwrap(), 60);
        assert_ne!(r.read_referent().unwrap(), 0);
        assert_eq!(r.read_f32().unwrap(), 0.0);
        assert_eq!(r.read_u32().unwrap(), 1033);
        assert_eq!(r.read_guid().unwrap(), IID_IOPC_GROUP_STATE_MGT);
    }

    #[tokio::test]
    async fn test_allocated_group_handles_are_distinct() {
        let transport = ScriptedTransport::new();
        let mut server = server(&transport).await;
        add_group_reply(&transport, 1, codes::S_OK);
        add_group_reply(&transport, 2, codes::S_OK);

        server.add_group("A", &GroupOptions::default()).await.unwrap();
        server.add_group("B", &GroupOptions::default()).await.unwrap();

        let client_handles: Vec<u32> = transport
            .calls()
            .iter()
            .map(|call| {
                let mut r = call.reader();
                r.read_string().unwrap();
                r.read_bool().unwrap();
                r.read_u32().unwrap();
                r.read_u32().unwrap()
            })
            .collect();
        assert_ne!(client_handles[0], client_handles[1]);
        assert_eq!(server.group_keys().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_group_by_key_ends_it_first() {
        let transport = ScriptedTransport::new();
        let mut server = server(&transport).await;
        add_group_reply(&transport, 0x55, codes::S_OK);
        let key = server
            .add_group("Fast", &GroupOptions::default())
            .await
            .unwrap();
        transport.respond_status(codes::S_OK);

        server.remove_group(key, false).await.unwrap();

        assert!(server.group(key).is_none());
        assert_eq!(transport.released(), vec![IID_IOPC_GROUP_STATE_MGT]);
        let mut r = transport.last_call().unwrap().reader();
        assert_eq!(r.read_u32().unwrap(), 0x55);
        assert!(!r.read_bool().unwrap());
    }

    #[tokio::test]
    async fn test_remove_group_found_by_name_looks_up_handle() {
        let transport = ScriptedTransport::new();
        let mut server = server(&transport).await;
        let mut w = NdrWriter::new();
        write_interface_pointer(&mut w);
        transport.respond_with_interfaces(w, codes::S_OK, &[IID_IOPC_GROUP_STATE_MGT]);
        let key = server.get_group_by_name("Slow").await.unwrap();

        let mut w = NdrWriter::new();
        w.write_u32(1000);
        w.write_bool(true);
        w.write_unique_string(Some("Slow")).unwrap();
        w.write_i32(0);
        w.write_f32(0.0);
        w.write_u32(1033);
        w.write_u32(1);
        w.write_u32(0x77);
        transport.respond(w, codes::S_OK);
        transport.respond_status(codes::S_OK);

        server.remove_group(key, true).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].iid, IID_IOPC_GROUP_STATE_MGT);
        let mut r = calls[2].reader();
        assert_eq!(r.read_u32().unwrap(), 0x77);
        assert!(r.read_bool().unwrap());
    }

    #[tokio::test]
    async fn test_remove_group_in_use_emits_event() {
        let transport = ScriptedTransport::new();
        let mut server = server(&transport).await;
        let mut rx = server.subscribe();
        transport.respond_status(codes::OPC_S_INUSE);

        server.remove_group(GroupHandle(9), false).await.unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            OpcEvent::InUse {
                operation: "RemoveGroup"
            }
        );
    }

    #[tokio::test]
    async fn test_remove_group_failure_after_local_end() {
        let transport = ScriptedTransport::new();
        let mut server = server(&transport).await;
        add_group_reply(&transport, 0x56, codes::S_OK);
        let key = server
            .add_group("Fast", &GroupOptions::default())
            .await
            .unwrap();
        transport.respond_status(codes::E_INVALIDARG);

        let err = server.remove_group(key, false).await.unwrap_err();

        assert!(err.is_code(codes::E_INVALIDARG));
        assert!(server.group(key).is_none());
        assert_eq!(transport.released(), vec![IID_IOPC_GROUP_STATE_MGT]);

        transport.respond_status(codes::S_OK);
        server.remove_group(GroupHandle(0x56), false).await.unwrap();
        let mut r = transport.last_call().unwrap().reader();
        assert_eq!(r.read_u32().unwrap(), 0x56);
    }

    #[tokio::test]
    async fn test_remove_unknown_key_is_local_error() {
        let transport = ScriptedTransport::new();
        let mut server = server(&transport).await;

        let err = server.remove_group(GroupKey(42), false).await.unwrap_err();

        assert!(matches!(err, OpcError::InvalidArgument(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_get_groups_drains_and_ends_enumerator() {
        let transport = ScriptedTransport::new();
        let mut server = server(&transport).await;
        let names = FakeEnumString::new(["Fast", "Slow"]);
        let mut w = NdrWriter::new();
        write_interface_pointer(&mut w);
        transport.respond_with_remote(w, codes::S_OK, names.remote());

        let groups = server.get_groups(EnumScope::All).await.unwrap();

        assert_eq!(groups, vec!["Fast", "Slow"]);
        assert!(names.is_released());
        let mut r = transport.last_call().unwrap().reader();
        assert_eq!(r.read_enum16().unwrap(), EnumScope::All.to_wire());
        assert_eq!(r.read_guid().unwrap(), IID_IENUM_STRING);
    }

    #[tokio::test]
    async fn test_get_groups_without_groups() {
        let transport = ScriptedTransport::new();
        let mut server = server(&transport).await;
        let mut w = NdrWriter::new();
        w.write_referent(false);
        transport.respond(w, codes::S_FALSE);

        assert!(server.get_groups(EnumScope::Private).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_string_uses_default_locale() {
        let transport = ScriptedTransport::new();
        let mut server = Server::new(ServerOptions::default().with_default_locale(1031));
        server.init(&transport.root()).await.unwrap();
        let mut w = NdrWriter::new();
        w.write_unique_string(Some("Unbekannter Fehler")).unwrap();
        transport.respond(w, codes::S_OK);

        let text = server.get_error_string(codes::E_FAIL, None).await.unwrap();

        assert_eq!(text, "Unbekannter Fehler");
        let mut r = transport.last_call().unwrap().reader();
        assert_eq!(r.read_u32().unwrap(), codes::E_FAIL);
        assert_eq!(r.read_u32().unwrap(), 1031);
    }

    #[tokio::test]
    async fn test_end_cascades() {
        let transport = ScriptedTransport::new();
        let mut server = server(&transport).await;
        add_group_reply(&transport, 1, codes::S_OK);
        server
            .add_group("Fast", &GroupOptions::default())
            .await
            .unwrap();
        server.get_common().await.unwrap();
        server.get_common().await.unwrap();

        server.end().await.unwrap();
        server.end().await.unwrap();

        assert_eq!(
            transport.released(),
            vec![IID_IOPC_GROUP_STATE_MGT, IID_IOPC_COMMON, IID_IOPC_SERVER]
        );
        assert!(server.group_keys().is_empty());
        assert!(matches!(
            server.get_status().await,
            Err(OpcError::NotInitialized("IOPCServer"))
        ));
    }

    #[test]
    fn test_group_handle_allocation_wraps() {
        let mut counter = u32::MAX;
        assert_eq!(allocate_group_handle(&mut counter), GroupHandle(u32::MAX));
        assert_eq!(allocate_group_handle(&mut counter), GroupHandle(0));
    }
}
