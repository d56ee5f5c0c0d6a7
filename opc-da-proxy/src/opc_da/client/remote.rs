use std::collections::VecDeque;

use uuid::Uuid;

use crate::opc_da::errors::{OpcError, OpcResult, Status, format_status};
use crate::opc_da::iid::interface_name;
use crate::opc_da::ndr::{NdrReader, NdrWriter};
use crate::transport::{CallRequest, RemoteRef};

/// Slot holding at most one reference to a specific remote interface.
///
/// Every proxy owns one. `attach`/`adopt` fill it, `release` empties it;
/// both directions are checked so double init and use-after-end surface as
/// local errors.
pub(crate) struct RemoteInterface {
    iid: Uuid,
    inner: Option<RemoteRef>,
}

impl RemoteInterface {
    pub const fn new(iid: Uuid) -> Self {
        Self { iid, inner: None }
    }

    pub fn name(&self) -> &'static str {
        interface_name(&self.iid)
    }

    pub fn is_attached(&self) -> bool {
        self.inner.is_some()
    }

    /// Queries `unknown` for this slot's interface.
    pub async fn attach(&mut self, unknown: &RemoteRef) -> OpcResult<()> {
        if self.inner.is_some() {
            return Err(OpcError::AlreadyInitialized(self.name()));
        }
        let remote = unknown.query_interface(self.iid).await?;
        tracing::debug!(interface = self.name(), "Interface attached");
        self.inner = Some(remote);
        Ok(())
    }

    /// Takes ownership of a reference already known to implement this
    /// slot's interface.
    pub fn adopt(&mut self, remote: RemoteRef) -> OpcResult<()> {
        if self.inner.is_some() {
            return Err(OpcError::AlreadyInitialized(self.name()));
        }
        tracing::debug!(interface = self.name(), "Interface adopted");
        self.inner = Some(remote);
        Ok(())
    }

    pub fn get(&self) -> OpcResult<&RemoteRef> {
        self.inner
            .as_ref()
            .ok_or(OpcError::NotInitialized(interface_name(&self.iid)))
    }

    /// Releases the reference. A no-op when empty.
    pub async fn release(&mut self) -> OpcResult<()> {
        if let Some(remote) = self.inner.take() {
            tracing::debug!(interface = self.name(), "Releasing interface");
            remote.release().await?;
        }
        Ok(())
    }
}

/// Decoded response of one call: the out parameters ahead of the status
/// word, the status, and the interface references handed over by the
/// transport.
pub(crate) struct Reply {
    pub status: Status,
    pub reader: NdrReader,
    interfaces: VecDeque<RemoteRef>,
}

impl Reply {
    /// Consumes one `MInterfacePointer` out parameter and returns the live
    /// reference that belongs to it.
    pub fn take_interface(&mut self) -> OpcResult<Option<RemoteRef>> {
        if !self.reader.read_interface_pointer()? {
            return Ok(None);
        }
        self.interfaces.pop_front().map(Some).ok_or_else(|| {
            OpcError::Decode("interface pointer without a resolved reference".into())
        })
    }

    /// Like [`Reply::take_interface`], for out parameters that must be set.
    pub fn require_interface(&mut self, what: &str) -> OpcResult<RemoteRef> {
        self.take_interface()?
            .ok_or_else(|| OpcError::Decode(format!("server returned a null {what}")))
    }

    /// Reads the per-item `HRESULT` array that closes every batched call.
    pub fn read_statuses(&mut self, expected: usize) -> OpcResult<Vec<Status>> {
        Ok(self
            .reader
            .read_unique_u32_array(expected, "errors")?
            .into_iter()
            .map(Status)
            .collect())
    }
}

/// Rejects parallel input slices of different lengths before anything is
/// sent.
pub(crate) fn check_lengths(left: usize, right: usize, what: &str) -> OpcResult<()> {
    if left != right {
        return Err(OpcError::InvalidArgument(format!(
            "{what}: {left} handles but {right} values"
        )));
    }
    Ok(())
}

/// Performs one remote call.
///
/// A failure status becomes [`OpcError::Remote`]; anything else is returned
/// with the decoded out parameters so the caller can act on soft codes.
pub(crate) async fn invoke(remote: &RemoteRef, opnum: u16, params: NdrWriter) -> OpcResult<Reply> {
    let response = remote
        .call(CallRequest {
            opnum,
            stub_data: params.into_bytes(),
        })
        .await?;

    let mut stub_data = response.stub_data;
    if stub_data.len() < 4 {
        return Err(OpcError::Decode(format!(
            "response of {} bytes has no status word",
            stub_data.len()
        )));
    }
    let tail = stub_data.split_off(stub_data.len() - 4);
    let status = Status(u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]));

    if status.is_failure() {
        tracing::debug!(opnum, code = %format_status(status.code()), "Remote call failed");
        return Err(OpcError::Remote {
            code: status.code(),
        });
    }

    Ok(Reply {
        status,
        reader: NdrReader::new(stub_data),
        interfaces: response.interfaces.into(),
    })
}
