use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[cfg(any(test, feature = "test-support"))]
use mockall::automock;

/// Shared handle to a remote object reference owned by the transport.
pub type RemoteRef = Arc<dyn RemoteObject>;

/// One remote method invocation.
///
/// `opnum` is relative to the interface: slot 0 is the first method after
/// the three `IUnknown` methods. The transport adds the base offset and the
/// ORPC headers; `stub_data` is only the NDR-encoded parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub opnum: u16,
    pub stub_data: Vec<u8>,
}

/// Response to a [`CallRequest`].
///
/// `stub_data` holds the NDR-encoded out parameters followed by the 4-byte
/// status word. Interface pointers marshalled in the out parameters are
/// resolved by the transport and handed over in `interfaces`, in the order
/// they appear in `stub_data`.
#[derive(Clone, Default)]
pub struct CallResponse {
    pub stub_data: Vec<u8>,
    pub interfaces: Vec<RemoteRef>,
}

impl std::fmt::Debug for CallResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallResponse")
            .field("stub_data", &self.stub_data.len())
            .field("interfaces", &self.interfaces.len())
            .finish()
    }
}

/// Failures raised by the transport layer itself.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The remote object answered `QueryInterface` with `E_NOINTERFACE`.
    #[error("no such interface: {0}")]
    NoSuchInterface(Uuid),

    /// Connection, authentication or framing failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A reference to an object living in a remote server process.
///
/// This is the only seam between the OPC proxies and the wire: DCOM
/// activation, authentication and RPC framing live behind it.
#[cfg_attr(any(test, feature = "test-support"), automock)]
#[async_trait]
pub trait RemoteObject: Send + Sync {
    /// Asks the remote object for another interface on the same identity.
    ///
    /// # Errors
    /// Returns [`TransportError::NoSuchInterface`] when the object does not
    /// implement `iid`.
    async fn query_interface(&self, iid: Uuid) -> Result<RemoteRef, TransportError>;

    /// Drops the remote reference held by this handle.
    async fn release(&self) -> Result<(), TransportError>;

    /// Invokes one method and returns its marshalled out parameters.
    async fn call(&self, request: CallRequest) -> Result<CallResponse, TransportError>;
}
