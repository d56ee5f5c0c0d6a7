use crate::opc_da::client::remote::RemoteInterface;
use crate::opc_da::client::traits::ItemPropertiesTrait;
use crate::opc_da::errors::OpcResult;
use crate::opc_da::iid::IID_IOPC_ITEM_PROPERTIES;
use crate::opc_da::typedefs::{PropertyId, PropertyInfo, PropertyValue};
use crate::transport::RemoteRef;

/// Proxy for the server's `IOPCItemProperties`.
pub struct ItemProperties {
    remote: RemoteInterface,
}

impl Default for ItemProperties {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemProperties {
    pub fn new() -> Self {
        Self {
            remote: RemoteInterface::new(IID_IOPC_ITEM_PROPERTIES),
        }
    }

    pub async fn init(&mut self, unknown: &RemoteRef) -> OpcResult<()> {
        self.remote.attach(unknown).await
    }

    /// Every available property of an item with its value, in the order the
    /// server lists them. Properties that could not be read keep their
    /// failure status.
    pub async fn get_all_item_properties(
        &mut self,
        item_id: &str,
    ) -> OpcResult<Vec<(PropertyInfo, PropertyValue)>> {
        let available = self.query_available_properties(item_id).await?;
        let ids: Vec<PropertyId> = available.iter().map(|info| info.id).collect();
        let values = self.get_item_properties(item_id, &ids).await?;
        tracing::debug!(item_id, count = values.len(), "Item properties read");
        Ok(available.into_iter().zip(values).collect())
    }

    pub async fn end(&mut self) -> OpcResult<()> {
        self.remote.release().await
    }
}

impl ItemPropertiesTrait for ItemProperties {
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
    use crate::opc_da::variant::{self, Variant, vt};

    async fn properties(transport: &ScriptedTransport) -> ItemProperties {
        let mut properties = ItemProperties::new();
        properties.init(&transport.root()).await.unwrap();
        properties
    }

    fn available(w: &mut NdrWriter) {
        w.write_u32(2);
        w.write_referent(true);
        w.write_u32_array(&[PropertyId::DATATYPE.0, PropertyId::EU_UNITS.0])
            .unwrap();
        w.write_referent(true);
        w.write_string_array(&["Item Canonical DataType".into(), "EU Units".into()])
            .unwrap();
        w.write_referent(true);
        w.write_u16_array(&[vt::VT_I2, vt::VT_BSTR]).unwrap();
    }

    #[tokio::test]
    async fn test_query_available_properties() {
        let transport = ScriptedTransport::new();
        let mut properties = properties(&transport).await;
        let mut w = NdrWriter::new();
        available(&mut w);
        transport.respond(w, codes::S_OK);

        let infos = properties
            .query_available_properties("Tank.Level")
            .await
            .unwrap();

        assert_eq!(
            infos,
            vec![
                PropertyInfo {
                    id: PropertyId::DATATYPE,
                    description: "Item Canonical DataType".into(),
                    data_type: vt::VT_I2,
                },
                PropertyInfo {
                    id: PropertyId::EU_UNITS,
                    description: "EU Units".into(),
                    data_type: vt::VT_BSTR,
                },
            ]
        );
        assert_eq!(
            transport.last_call().unwrap().reader().read_string().unwrap(),
            "Tank.Level"
        );
    }

    #[tokio::test]
    async fn test_get_all_item_properties_pairs_values() {
        let transport = ScriptedTransport::new();
        let mut properties = properties(&transport).await;
        let mut w = NdrWriter::new();
        available(&mut w);
        transport.respond(w, codes::S_OK);
        let mut w = NdrWriter::new();
        w.write_referent(true);
        variant::write_variant_array(&mut w, &[Variant::I2(5), Variant::Empty]).unwrap();
        w.write_referent(true);
        w.write_u32_array(&[codes::S_OK, codes::OPC_E_INVALID_PID])
            .unwrap();
        transport.respond(w, codes::S_FALSE);

        let all = properties
            .get_all_item_properties("Tank.Level")
            .await
            .unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(all[0].1.value, Variant::I2(5));
        assert_eq!(all[1].0.id, PropertyId::EU_UNITS);
        assert_eq!(all[1].1.status, Status(codes::OPC_E_INVALID_PID));

        let mut r = transport.last_call().unwrap().reader();
        assert_eq!(r.read_string().unwrap(), "Tank.Level");
        assert_eq!(r.read_u32().unwrap(), 2);
        assert_eq!(r.read_u32_array(2, "ids").unwrap(), vec![1, 100]);
    }

    #[tokio::test]
    async fn test_lookup_item_ids_drops_failed_names() {
        let transport = ScriptedTransport::new();
        let mut properties = properties(&transport).await;
        let mut w = NdrWriter::new();
        w.write_referent(true);
        w.write_string_array(&["Tank.Level.Units".into(), String::new()])
            .unwrap();
        w.write_referent(true);
        w.write_u32_array(&[codes::S_OK, codes::OPC_E_INVALID_PID])
            .unwrap();
        transport.respond(w, codes::S_FALSE);

        let names = properties
            .lookup_item_ids("Tank.Level", &[PropertyId::EU_UNITS, PropertyId::VALUE])
            .await
            .unwrap();

        assert_eq!(names[0], (Status::OK, Some("Tank.Level.Units".to_string())));
        assert_eq!(names[1], (Status(codes::OPC_E_INVALID_PID), None));
    }

    #[tokio::test]
    async fn test_item_without_properties() {
        let transport = ScriptedTransport::new();
        let mut properties = properties(&transport).await;
        let mut w = NdrWriter::new();
        w.write_u32(0);
        w.write_referent(false);
        w.write_referent(false);
        w.write_referent(false);
        transport.respond(w, codes::S_OK);

        assert!(
            properties
                .get_all_item_properties("Empty")
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(transport.call_count(), 1);
    }
}
