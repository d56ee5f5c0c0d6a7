use async_trait::async_trait;

use crate::opc_da::client::remote::invoke;
use crate::opc_da::errors::{OpcResult, Status};
use crate::opc_da::filetime::FileTime;
use crate::opc_da::ndr::NdrWriter;
use crate::opc_da::typedefs::{ItemIoRead, ItemIoValue, ItemIoWrite, Quality};
use crate::opc_da::variant::{self, Variant};
use crate::transport::RemoteRef;

const OPNUM_READ: u16 = 0;
const OPNUM_WRITE_VQT: u16 = 1;

/// Direct item I/O by item ID (OPC DA 3.0), without a group.
#[async_trait]
pub trait ItemIoTrait: Send + Sync {
    fn interface(&self) -> OpcResult<&RemoteRef>;

    /// Reads items by ID.
    ///
    /// # Returns
    /// One [`ItemIoValue`] per request, in order
    async fn read(&mut self, items: &[ItemIoRead]) -> OpcResult<Vec<ItemIoValue>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let count = items.len();
        let ids: Vec<String> = items.iter().map(|item| item.item_id.clone()).collect();
        let max_ages: Vec<u32> = items.iter().map(|item| item.max_age).collect();

        let mut w = NdrWriter::new();
        w.write_count(count)?;
        w.write_string_array(&ids)?;
        w.write_u32_array(&max_ages)?;

        let mut reply = invoke(self.interface()?, OPNUM_READ, w).await?;
        let r = &mut reply.reader;

        let values = if r.read_referent()? == 0 {
            vec![Variant::Empty; count]
        } else {
            variant::read_variant_array(r, count)?
        };

        let mut qualities = vec![Quality::BAD; count];
        if r.read_referent()? != 0 {
            r.read_expected_count(count, "qualities")?;
            for quality in &mut qualities {
                *quality = Quality(r.read_u16()?);
            }
        }

        let mut timestamps = vec![FileTime::default(); count];
        if r.read_referent()? != 0 {
            r.read_expected_count(count, "timestamps")?;
            for timestamp in &mut timestamps {
                *timestamp = FileTime::unmarshal(r)?;
            }
        }

        let statuses = reply.read_statuses(count)?;

        Ok(values
            .into_iter()
            .zip(qualities)
            .zip(timestamps)
            .zip(statuses)
            .map(|(((value, quality), timestamp), status)| ItemIoValue {
                status,
                value,
                quality,
                timestamp,
            })
            .collect())
    }

    /// Writes values, with optional quality and timestamp, by item ID.
    ///
    /// # Returns
    /// One status per write
    async fn write_vqt(&mut self, items: &[ItemIoWrite]) -> OpcResult<Vec<Status>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = items.iter().map(|item| item.item_id.clone()).collect();
        let vqts: Vec<_> = items.iter().map(|item| item.vqt.clone()).collect();

        let mut w = NdrWriter::new();
        w.write_count(items.len())?;
        w.write_string_array(&ids)?;
        w.write_struct_array(&vqts)?;

        let mut reply = invoke(self.interface()?, OPNUM_WRITE_VQT, w).await?;
        reply.read_statuses(items.len())
    }
}
