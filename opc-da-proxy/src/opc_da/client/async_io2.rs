use crate::opc_da::client::remote::RemoteInterface;
use crate::opc_da::client::traits::{AsyncIo2Trait, AsyncRequest};
use crate::opc_da::errors::{OpcError, OpcResult};
use crate::opc_da::iid::IID_IOPC_ASYNC_IO2;
use crate::opc_da::typedefs::{DataSource, ItemHandle, ItemWrite};
use crate::transport::RemoteRef;

/// Proxy for a group's `IOPCAsyncIO2`.
///
/// Only starts and cancels requests. Completions arrive through the group's
/// data callback, which this crate does not host.
pub struct AsyncIo2 {
    remote: RemoteInterface,
}

impl Default for AsyncIo2 {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncIo2 {
    pub fn new() -> Self {
        Self {
            remote: RemoteInterface::new(IID_IOPC_ASYNC_IO2),
        }
    }

    pub async fn init(&mut self, unknown: &RemoteRef) -> OpcResult<()> {
        self.remote.attach(unknown).await
    }

    /// Starts an asynchronous read of `server_handles`.
    pub async fn read(
        &mut self,
        server_handles: &[ItemHandle],
        transaction_id: u32,
    ) -> OpcResult<AsyncRequest> {
        if server_handles.is_empty() {
            return Err(OpcError::InvalidArgument(
                "asynchronous read of no items".into(),
            ));
        }
        AsyncIo2Trait::read(self, server_handles, transaction_id).await
    }

    /// Starts an asynchronous write.
    pub async fn write(
        &mut self,
        writes: &[ItemWrite],
        transaction_id: u32,
    ) -> OpcResult<AsyncRequest> {
        if writes.is_empty() {
            return Err(OpcError::InvalidArgument(
                "asynchronous write of no items".into(),
            ));
        }
        AsyncIo2Trait::write(self, writes, transaction_id).await
    }

    /// Requests a refresh of every active item; returns the cancel id.
    pub async fn refresh(&mut self, source: DataSource, transaction_id: u32) -> OpcResult<u32> {
        let cancel_id = self.refresh2(source, transaction_id).await?;
        tracing::debug!(transaction_id, cancel_id, "Refresh requested");
        Ok(cancel_id)
    }

    pub async fn cancel(&mut self, cancel_id: u32) -> OpcResult<()> {
        self.cancel2(cancel_id).await
    }

    pub async fn end(&mut self) -> OpcResult<()> {
        self.remote.release().await
    }
}

impl AsyncIo2Trait for AsyncIo2 {
    fn interface(&self) -> OpcResult<&RemoteRef> {
        self.remote.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc_da::client::testing::ScriptedTransport;
    use crate::opc_da::errors::{Status, codes};
    use crate::opc_da::ndr::NdrWriter;

    async fn async_io(transport: &ScriptedTransport) -> AsyncIo2 {
        let mut io = AsyncIo2::new();
        io.init(&transport.root()).await.unwrap();
        io
    }

    #[tokio::test]
    async fn test_read_returns_cancel_id_and_statuses() {
        let transport = ScriptedTransport::new();
        let mut io = async_io(&transport).await;
        let mut w = NdrWriter::new();
        w.write_u32(77);
        w.write_referent(true);
        w.write_u32_array(&[codes::S_OK, codes::OPC_E_INVALIDHANDLE])
            .unwrap();
        transport.respond(w, codes::S_FALSE);

        let request = io.read(&[ItemHandle(4), ItemHandle(5)], 9).await.unwrap();

        assert_eq!(request.cancel_id, 77);
        assert_eq!(
            request.statuses,
            vec![Status::OK, Status(codes::OPC_E_INVALIDHANDLE)]
        );
        let mut r = transport.last_call().unwrap().reader();
        assert_eq!(r.read_u32().unwrap(), 2);
        assert_eq!(r.read_u32_array(2, "handles").unwrap(), vec![4, 5]);
        assert_eq!(r.read_u32().unwrap(), 9);
    }

    #[tokio::test]
    async fn test_empty_requests_are_rejected_locally() {
        let transport = ScriptedTransport::new();
        let mut io = async_io(&transport).await;

        assert!(matches!(
            io.read(&[], 1).await,
            Err(OpcError::InvalidArgument(_))
        ));
        assert!(matches!(
            io.write(&[], 1).await,
            Err(OpcError::InvalidArgument(_))
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_and_cancel() {
        let transport = ScriptedTransport::new();
        let mut io = async_io(&transport).await;
        let mut w = NdrWriter::new();
        w.write_u32(12);
        transport.respond(w, codes::S_OK);
        transport.respond_status(codes::S_OK);

        let cancel_id = io.refresh(DataSource::Cache, 3).await.unwrap();
        io.cancel(cancel_id).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls[0].opnum, 2);
        let mut r = calls[0].reader();
        assert_eq!(r.read_enum16().unwrap(), DataSource::Cache.to_wire());
        assert_eq!(r.read_u32().unwrap(), 3);
        assert_eq!(calls[1].opnum, 3);
        assert_eq!(calls[1].reader().read_u32().unwrap(), 12);
    }

    #[tokio::test]
    async fn test_enable() {
        let transport = ScriptedTransport::new();
        let mut io = async_io(&transport).await;
        transport.respond_status(codes::S_OK);
        let mut w = NdrWriter::new();
        w.write_bool(false);
        transport.respond(w, codes::S_OK);

        io.set_enable(false).await.unwrap();
        assert!(!io.get_enable().await.unwrap());
        assert!(!transport.calls()[0].reader().read_bool().unwrap());
    }
}
