use async_trait::async_trait;

use crate::opc_da::client::remote::invoke;
use crate::opc_da::errors::{OpcError, OpcResult};
use crate::opc_da::ndr::NdrWriter;
use crate::transport::RemoteRef;

const OPNUM_SET_LOCALE_ID: u16 = 0;
const OPNUM_GET_LOCALE_ID: u16 = 1;
const OPNUM_QUERY_AVAILABLE_LOCALE_IDS: u16 = 2;
const OPNUM_GET_ERROR_STRING: u16 = 3;
const OPNUM_SET_CLIENT_NAME: u16 = 4;

/// Common OPC server functionality.
///
/// Locale management, error descriptions and client identification.
#[async_trait]
pub trait CommonTrait: Send + Sync {
    fn interface(&self) -> OpcResult<&RemoteRef>;

    /// Sets the locale used for strings returned by the server.
    async fn set_locale_id(&mut self, locale_id: u32) -> OpcResult<()> {
        let mut w = NdrWriter::new();
        w.write_u32(locale_id);
        invoke(self.interface()?, OPNUM_SET_LOCALE_ID, w).await?;
        Ok(())
    }

    /// Gets the current locale.
    async fn get_locale_id(&mut self) -> OpcResult<u32> {
        let mut reply = invoke(self.interface()?, OPNUM_GET_LOCALE_ID, NdrWriter::new()).await?;
        reply.reader.read_u32()
    }

    /// Lists the locales the server supports.
    async fn query_available_locale_ids(&mut self) -> OpcResult<Vec<u32>> {
        let mut reply = invoke(
            self.interface()?,
            OPNUM_QUERY_AVAILABLE_LOCALE_IDS,
            NdrWriter::new(),
        )
        .await?;

        let count = reply.reader.read_count()?;
        reply.reader.read_unique_u32_array(count, "locale ids")
    }

    /// Gets the server's description of an error code in the current
    /// locale.
    async fn get_error_string(&mut self, error: u32) -> OpcResult<String> {
        let mut w = NdrWriter::new();
        w.write_u32(error);

        let mut reply = invoke(self.interface()?, OPNUM_GET_ERROR_STRING, w).await?;
        reply
            .reader
            .read_unique_string()?
            .ok_or_else(|| OpcError::Decode("server returned a null error string".into()))
    }

    /// Tells the server who is connected.
    async fn set_client_name(&mut self, name: &str) -> OpcResult<()> {
        let mut w = NdrWriter::new();
        w.write_string(name)?;
        invoke(self.interface()?, OPNUM_SET_CLIENT_NAME, w).await?;
        Ok(())
    }
}
