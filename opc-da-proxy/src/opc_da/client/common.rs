use crate::opc_da::client::remote::RemoteInterface;
use crate::opc_da::client::traits::CommonTrait;
use crate::opc_da::errors::OpcResult;
use crate::opc_da::iid::IID_IOPC_COMMON;
use crate::transport::RemoteRef;

/// Proxy for the server's `IOPCCommon`: locale and client name.
pub struct Common {
    remote: RemoteInterface,
}

impl Default for Common {
    fn default() -> Self {
        Self::new()
    }
}

impl Common {
    pub fn new() -> Self {
        Self {
            remote: RemoteInterface::new(IID_IOPC_COMMON),
        }
    }

    pub async fn init(&mut self, unknown: &RemoteRef) -> OpcResult<()> {
        self.remote.attach(unknown).await
    }

    pub async fn end(&mut self) -> OpcResult<()> {
        self.remote.release().await
    }
}

impl CommonTrait for Common {
    fn interface(&self) -> OpcResult<&RemoteRef> {
        self.remote.get()
    }
}
