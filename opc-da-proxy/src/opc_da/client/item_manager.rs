use std::collections::{HashMap, HashSet};

use crate::opc_da::client::remote::RemoteInterface;
use crate::opc_da::client::traits::ItemMgtTrait;
use crate::opc_da::errors::{OpcError, OpcResult, Status};
use crate::opc_da::iid::IID_IOPC_ITEM_MGT;
use crate::opc_da::typedefs::{ItemAddResult, ItemDef, ItemHandle};
use crate::transport::RemoteRef;

/// Proxy for a group's `IOPCItemMgt`.
///
/// Keeps a table from server handle to client handle for every item it
/// added, so values read later can be matched to the caller's own keys.
pub struct ItemManager {
    remote: RemoteInterface,
    correlation: HashMap<ItemHandle, ItemHandle>,
    next_client_handle: u32,
}

impl Default for ItemManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemManager {
    pub fn new() -> Self {
        Self {
            remote: RemoteInterface::new(IID_IOPC_ITEM_MGT),
            correlation: HashMap::new(),
            next_client_handle: rand::random::<u32>(),
        }
    }

    pub async fn init(&mut self, unknown: &RemoteRef) -> OpcResult<()> {
        self.remote.attach(unknown).await
    }

    /// Client handle recorded for an item added through this manager.
    pub fn client_handle(&self, server_handle: ItemHandle) -> Option<ItemHandle> {
        self.correlation.get(&server_handle).copied()
    }

    /// Number of items currently correlated.
    pub fn item_count(&self) -> usize {
        self.correlation.len()
    }

    /// Adds items to the group.
    ///
    /// Items without a client handle get one that is not in use by this
    /// manager. Per-item failures are reported in the result and do not
    /// abort the batch.
    ///
    /// # Errors
    /// `InvalidArgument` when any definition has an empty item ID; nothing is
    /// sent in that case
    pub async fn add(&mut self, items: &[ItemDef]) -> OpcResult<Vec<ItemAddResult>> {
        check_item_ids(items)?;
        let items = self.assign_client_handles(items);

        let results = self.add_items(&items).await?;
        for added in &results {
            if let Some(result) = &added.result {
                self.correlation
                    .insert(result.server_handle, added.client_handle);
            }
        }

        log_failures("AddItems", results.iter().map(|r| r.status));
        Ok(results)
    }

    /// Checks item definitions without adding them.
    ///
    /// # Arguments
    /// * `blob_update` - `false` skips blob persistence on the server
    pub async fn validate(
        &mut self,
        items: &[ItemDef],
        blob_update: bool,
    ) -> OpcResult<Vec<ItemAddResult>> {
        check_item_ids(items)?;
        self.validate_items(items, blob_update).await
    }

    /// Removes items and forgets their client handles.
    pub async fn remove(&mut self, server_handles: &[ItemHandle]) -> OpcResult<Vec<Status>> {
        let statuses = self.remove_items(server_handles).await?;
        for (handle, status) in server_handles.iter().zip(&statuses) {
            if !status.is_failure() {
                self.correlation.remove(handle);
            }
        }
        log_failures("RemoveItems", statuses.iter().copied());
        Ok(statuses)
    }

    /// Activates or deactivates items.
    pub async fn set_active_state(
        &mut self,
        active: bool,
        server_handles: &[ItemHandle],
    ) -> OpcResult<Vec<Status>> {
        let statuses = ItemMgtTrait::set_active_state(self, active, server_handles).await?;
        log_failures("SetActiveState", statuses.iter().copied());
        Ok(statuses)
    }

    /// Re-keys items to new client handles.
    ///
    /// # Errors
    /// `InvalidArgument` when the slices differ in length; nothing is sent
    pub async fn set_client_handles(
        &mut self,
        server_handles: &[ItemHandle],
        client_handles: &[ItemHandle],
    ) -> OpcResult<Vec<Status>> {
        let statuses =
            ItemMgtTrait::set_client_handles(self, server_handles, client_handles).await?;
        for ((server, client), status) in server_handles.iter().zip(client_handles).zip(&statuses) {
            if !status.is_failure() {
                self.correlation.insert(*server, *client);
            }
        }
        log_failures("SetClientHandles", statuses.iter().copied());
        Ok(statuses)
    }

    /// Releases the interface and clears the correlation table.
    pub async fn end(&mut self) -> OpcResult<()> {
        self.correlation.clear();
        self.remote.release().await
    }

    fn assign_client_handles(&mut self, items: &[ItemDef]) -> Vec<ItemDef> {
        let mut in_use: HashSet<ItemHandle> = self.correlation.values().copied().collect();
        in_use.extend(items.iter().filter_map(|item| item.client_handle));

        items
            .iter()
            .map(|item| {
                let mut item = item.clone();
                if item.client_handle.is_none() {
                    let handle = self.allocate_client_handle(&in_use);
                    in_use.insert(handle);
                    item.client_handle = Some(handle);
                }
                item
            })
            .collect()
    }

    fn allocate_client_handle(&mut self, in_use: &HashSet<ItemHandle>) -> ItemHandle {
        loop {
            let candidate = ItemHandle(self.next_client_handle);
            self.next_client_handle = self.next_client_handle.wrapping_add(1);
            if !in_use.contains(&candidate) {
                return candidate;
            }
        }
    }
}

impl ItemMgtTrait for ItemManager {
    fn interface(&self) -> OpcResult<&RemoteRef> {
        self.remote.get()
    }
}

fn check_item_ids(items: &[ItemDef]) -> OpcResult<()> {
    match items.iter().position(|item| item.item_id.is_empty()) {
        Some(index) => Err(OpcError::InvalidArgument(format!(
            "item {index} has an empty item ID"
        ))),
        None => Ok(()),
    }
}

fn log_failures(operation: &'static str, statuses: impl Iterator<Item = Status>) {
    let mut count = 0usize;
    let mut failed = 0usize;
    for status in statuses {
        count += 1;
        if status.is_failure() {
            failed += 1;
        }
    }
    if failed > 0 {
        tracing::warn!(operation, failed, count, "Some items failed");
    }
}
