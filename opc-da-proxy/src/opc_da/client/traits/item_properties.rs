use async_trait::async_trait;

use crate::opc_da::client::remote::invoke;
use crate::opc_da::errors::{OpcResult, Status};
use crate::opc_da::ndr::{NdrReader, NdrWriter};
use crate::opc_da::typedefs::{PropertyId, PropertyInfo, PropertyValue};
use crate::opc_da::variant::{self, Variant};
use crate::transport::RemoteRef;

const OPNUM_QUERY_AVAILABLE_PROPERTIES: u16 = 0;
const OPNUM_GET_ITEM_PROPERTIES: u16 = 1;
const OPNUM_LOOKUP_ITEM_IDS: u16 = 2;

/// Item property functionality (OPC DA 2.0).
///
/// Provides methods to discover and read the properties of items,
/// such as engineering units, descriptions and limits.
#[async_trait]
pub trait ItemPropertiesTrait: Send + Sync {
    fn interface(&self) -> OpcResult<&RemoteRef>;

    /// Lists the properties available for an item.
    ///
    /// # Returns
    /// Id, server description and data type of each property
    async fn query_available_properties(&mut self, item_id: &str) -> OpcResult<Vec<PropertyInfo>> {
        let mut w = NdrWriter::new();
        w.write_string(item_id)?;

        let mut reply = invoke(self.interface()?, OPNUM_QUERY_AVAILABLE_PROPERTIES, w).await?;
        let r = &mut reply.reader;

        let count = r.read_count()?;
        let ids = r.read_unique_u32_array(count, "property ids")?;
        let descriptions = read_unique_strings(r, count, "property descriptions")?;
        let data_types = read_unique_u16_array(r, count, "property types")?;

        Ok(ids
            .into_iter()
            .zip(descriptions)
            .zip(data_types)
            .map(|((id, description), data_type)| PropertyInfo {
                id: PropertyId(id),
                description: description.unwrap_or_default(),
                data_type,
            })
            .collect())
    }

    /// Reads property values of an item.
    ///
    /// # Returns
    /// One [`PropertyValue`] per requested id, in order
    async fn get_item_properties(
        &mut self,
        item_id: &str,
        ids: &[PropertyId],
    ) -> OpcResult<Vec<PropertyValue>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut w = NdrWriter::new();
        write_request(&mut w, item_id, ids)?;

        let mut reply = invoke(self.interface()?, OPNUM_GET_ITEM_PROPERTIES, w).await?;
        let values = if reply.reader.read_referent()? == 0 {
            vec![Variant::Empty; ids.len()]
        } else {
            variant::read_variant_array(&mut reply.reader, ids.len())?
        };
        let statuses = reply.read_statuses(ids.len())?;

        Ok(ids
            .iter()
            .zip(values.into_iter().zip(statuses))
            .map(|(id, (value, status))| PropertyValue {
                id: *id,
                status,
                value,
            })
            .collect())
    }

    /// Gets the item IDs that address properties directly, where the
    /// server supports it.
    ///
    /// # Returns
    /// Per requested id, the status and the item ID when one exists
    async fn lookup_item_ids(
        &mut self,
        item_id: &str,
        ids: &[PropertyId],
    ) -> OpcResult<Vec<(Status, Option<String>)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut w = NdrWriter::new();
        write_request(&mut w, item_id, ids)?;

        let mut reply = invoke(self.interface()?, OPNUM_LOOKUP_ITEM_IDS, w).await?;
        let names = read_unique_strings(&mut reply.reader, ids.len(), "item ids")?;
        let statuses = reply.read_statuses(ids.len())?;

        Ok(statuses
            .into_iter()
            .zip(names)
            .map(|(status, name)| (status, name.filter(|_| !status.is_failure())))
            .collect())
    }
}

fn write_request(w: &mut NdrWriter, item_id: &str, ids: &[PropertyId]) -> OpcResult<()> {
    w.write_string(item_id)?;
    w.write_count(ids.len())?;
    w.write_u32_array(&ids.iter().map(|id| id.0).collect::<Vec<_>>())
}

/// Unique pointer to a conformant array of string pointers. Null array and
/// null entries both read as `None`.
fn read_unique_strings(
    r: &mut NdrReader,
    expected: usize,
    what: &str,
) -> OpcResult<Vec<Option<String>>> {
    if r.read_referent()? == 0 {
        return Ok(vec![None; expected]);
    }
    let count = r.read_expected_count(expected, what)?;
    let mut referents = Vec::with_capacity(count);
    for _ in 0..count {
        referents.push(r.read_referent()?);
    }
    referents
        .into_iter()
        .map(|referent| (referent != 0).then(|| r.read_string()).transpose())
        .collect()
}

fn read_unique_u16_array(r: &mut NdrReader, expected: usize, what: &str) -> OpcResult<Vec<u16>> {
    if r.read_referent()? == 0 {
        return Ok(vec![0; expected]);
    }
    let count = r.read_expected_count(expected, what)?;
    (0..count).map(|_| r.read_u16()).collect()
}
