use async_trait::async_trait;

use crate::opc_da::client::remote::invoke;
use crate::opc_da::errors::{OpcError, OpcResult, Status};
use crate::opc_da::ndr::NdrWriter;
use crate::transport::RemoteRef;

const OPNUM_NEXT: u16 = 0;
const OPNUM_SKIP: u16 = 1;
const OPNUM_RESET: u16 = 2;

/// `IEnumString`: a server-side cursor over a list of names.
#[async_trait]
pub trait EnumStringTrait: Send + Sync {
    fn interface(&self) -> OpcResult<&RemoteRef>;

    /// Fetches up to `count` names.
    ///
    /// # Returns
    /// The names and the call status. `S_FALSE` means fewer than `count`
    /// names were left. A `count` of 0 returns nothing without a call.
    async fn next(&mut self, count: u32) -> OpcResult<(Vec<String>, Status)> {
        if count == 0 {
            return Ok((Vec::new(), Status::OK));
        }

        let mut params = NdrWriter::new();
        params.write_u32(count);
        let mut reply = invoke(self.interface()?, OPNUM_NEXT, params).await?;

        let r = &mut reply.reader;
        let _max = r.read_u32()?;
        let offset = r.read_count()?;
        let actual = r.read_count()?;
        if offset != 0 || actual > count as usize {
            return Err(OpcError::Decode(format!(
                "invalid name window: offset {offset}, {actual} of {count}"
            )));
        }
        let names = r.read_string_array(actual)?;
        let fetched = r.read_count()?;
        if fetched != actual {
            return Err(OpcError::Decode(format!(
                "server reported {fetched} names but sent {actual}"
            )));
        }

        Ok((names, reply.status))
    }

    /// Skips `count` names. `S_FALSE` means the end was reached first.
    async fn skip(&mut self, count: u32) -> OpcResult<Status> {
        let mut params = NdrWriter::new();
        params.write_u32(count);
        Ok(invoke(self.interface()?, OPNUM_SKIP, params).await?.status)
    }

    /// Moves the cursor back to the first name.
    async fn reset(&mut self) -> OpcResult<()> {
        invoke(self.interface()?, OPNUM_RESET, NdrWriter::new()).await?;
        Ok(())
    }
}
