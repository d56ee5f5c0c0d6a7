use std::fmt;

use super::errors::{OpcError, OpcResult, Status};
use super::filetime::FileTime;
use super::ndr::{FromNdr, NdrReader, NdrWriter, ToNdr};
use super::variant::{self, Variant, vt};

/// Opaque handle for an OPC group.
///
/// This wrapper type enhances type safety when building calls,
/// preventing accidental mixing of group and item handles.
///
/// # Examples
///
/// ```
/// use opc_da_proxy::GroupHandle;
/// let handle = GroupHandle(123u32);
/// assert_eq!(handle.0, 123u32);
/// ```
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct GroupHandle(pub u32);

/// Opaque handle for an OPC item.
///
/// Similar to [`GroupHandle`], this ensures type-safe identification of tags
/// within an OPC group.
///
/// # Examples
///
/// ```
/// use opc_da_proxy::ItemHandle;
/// let handle = ItemHandle(456u32);
/// assert_eq!(handle.0, 456u32);
/// ```
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ItemHandle(pub u32);

/// OPC quality word. The top two bits of the low byte carry the
/// good/bad/uncertain class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Quality(pub u16);

impl Quality {
    pub const GOOD: Self = Self(0xC0);
    pub const BAD: Self = Self(0x00);
    pub const UNCERTAIN: Self = Self(0x40);

    pub const fn is_good(self) -> bool {
        self.0 & 0xC0 == 0xC0
    }

    pub const fn is_bad(self) -> bool {
        self.0 & 0xC0 == 0x00
    }

    pub const fn is_uncertain(self) -> bool {
        self.0 & 0xC0 == 0x40
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::helpers::quality_to_string(self.0))
    }
}

/// Access rights bits reported for an item.
pub mod access_rights {
    pub const READABLE: u32 = 0x1;
    pub const WRITEABLE: u32 = 0x2;
}

/// Current running state of the OPC server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Running,
    Failed,
    NoConfig,
    Suspended,
    Test,
    CommunicationFault,
    Unknown(u16),
}

impl ServerState {
    pub fn from_wire(value: u16) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Failed,
            3 => Self::NoConfig,
            4 => Self::Suspended,
            5 => Self::Test,
            6 => Self::CommunicationFault,
            other => Self::Unknown(other),
        }
    }

    pub fn to_wire(self) -> u16 {
        match self {
            Self::Running => 1,
            Self::Failed => 2,
            Self::NoConfig => 3,
            Self::Suspended => 4,
            Self::Test => 5,
            Self::CommunicationFault => 6,
            Self::Unknown(other) => other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Failed => "failed",
            Self::NoConfig => "noconfig",
            Self::Suspended => "suspended",
            Self::Test => "test",
            Self::CommunicationFault => "comm_fault",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scope for enumerating groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumScope {
    PrivateConnections,
    PublicConnections,
    AllConnections,
    Private,
    Public,
    All,
}

impl EnumScope {
    pub fn to_wire(self) -> u16 {
        match self {
            Self::PrivateConnections => 1,
            Self::PublicConnections => 2,
            Self::AllConnections => 3,
            Self::Private => 4,
            Self::Public => 5,
            Self::All => 6,
        }
    }
}

/// Filter type for navigating the namespace (Branch, Leaf, Flat).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseType {
    Branch,
    Leaf,
    Flat,
}

impl BrowseType {
    pub fn to_wire(self) -> u16 {
        match self {
            Self::Branch => 1,
            Self::Leaf => 2,
            Self::Flat => 3,
        }
    }
}

/// Direction of a browse cursor move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseDirection {
    Up,
    Down,
    To,
}

impl BrowseDirection {
    pub fn to_wire(self) -> u16 {
        match self {
            Self::Up => 1,
            Self::Down => 2,
            Self::To => 3,
        }
    }
}

/// Shape of the server's address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceType {
    Hierarchical,
    Flat,
}

impl NamespaceType {
    pub fn from_wire(value: u16) -> OpcResult<Self> {
        match value {
            1 => Ok(Self::Hierarchical),
            2 => Ok(Self::Flat),
            unknown => Err(OpcError::Decode(format!(
                "Unknown namespace type: {unknown}"
            ))),
        }
    }
}

/// Reading source preference (Cache or Device).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Cache,
    Device,
}

impl DataSource {
    pub fn to_wire(self) -> u16 {
        match self {
            Self::Cache => 1,
            Self::Device => 2,
        }
    }
}

/// Current state and properties of an OPC group.
///
/// This structure encapsulates both the requested and currently active properties
/// of an OPC group, as reported by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupState {
    /// Actual update rate in milliseconds (may differ from requested).
    pub update_rate: u32,
    /// Whether the group is currently active (processing updates).
    pub active: bool,
    /// The unique name of the group.
    pub name: String,
    /// Time zone bias in minutes from UTC.
    pub time_bias: i32,
    /// Percent change for a tag value required to trigger an update.
    pub percent_deadband: f32,
    /// Locale ID used for formatting strings in this group.
    pub locale_id: u32,
    /// Handle assigned by the client for this group.
    pub client_handle: GroupHandle,
    /// Handle assigned by the server for this group.
    pub server_handle: GroupHandle,
}

/// Partial update for `SetState`. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupStateUpdate {
    pub update_rate: Option<u32>,
    pub active: Option<bool>,
    pub time_bias: Option<i32>,
    pub percent_deadband: Option<f32>,
    pub locale_id: Option<u32>,
    pub client_handle: Option<GroupHandle>,
}

/// Operational status and metadata of the connected server.
///
/// This structure provides a snapshot of the server's health, current load,
/// and version information.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerStatus {
    /// Time when the server was started.
    pub start_time: FileTime,
    /// Current time according to the server.
    pub current_time: FileTime,
    /// Time of the last data update.
    pub last_update_time: FileTime,
    /// The current operational state of the server.
    pub server_state: ServerState,
    /// Number of groups currently managed by the server.
    pub group_count: u32,
    /// Current bandwidth utilization as reported by the server.
    pub band_width: u32,
    /// Major version of the server software.
    pub major_version: u16,
    /// Minor version of the server software.
    pub minor_version: u16,
    /// Build or revision number of the server software.
    pub build_number: u16,
    pub reserved: u16,
    /// Descriptive vendor-specific information.
    pub vendor_info: String,
}

impl FromNdr for ServerStatus {
    type Flat = (Self, u32);

    fn unmarshal_flat(r: &mut NdrReader) -> OpcResult<Self::Flat> {
        let start_time = FileTime::unmarshal(r)?;
        let current_time = FileTime::unmarshal(r)?;
        let last_update_time = FileTime::unmarshal(r)?;
        let server_state = ServerState::from_wire(r.read_enum16()?);
        let group_count = r.read_u32()?;
        let band_width = r.read_u32()?;
        let major_version = r.read_u16()?;
        let minor_version = r.read_u16()?;
        let build_number = r.read_u16()?;
        let reserved = r.read_u16()?;
        let vendor = r.read_referent()?;
        Ok((
            Self {
                start_time,
                current_time,
                last_update_time,
                server_state,
                group_count,
                band_width,
                major_version,
                minor_version,
                build_number,
                reserved,
                vendor_info: String::new(),
            },
            vendor,
        ))
    }

    fn unmarshal_deferred((mut status, vendor): Self::Flat, r: &mut NdrReader) -> OpcResult<Self> {
        if vendor != 0 {
            status.vendor_info = r.read_string()?;
        }
        Ok(status)
    }
}

/// Definition required to add a new item to an OPC group.
///
/// This structure contains the parameters needed for the server to identify
/// and initialize a tag within a group.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDef {
    /// Optional access path for the item (server-specific).
    pub access_path: String,
    /// The unique identifier of the tag within the server namespace.
    pub item_id: String,
    /// Whether the item should be added in an active state.
    pub active: bool,
    /// Handle assigned by the client; allocated on add when `None`.
    pub client_handle: Option<ItemHandle>,
    /// Requested data type (`VT_EMPTY` for the canonical type).
    pub requested_data_type: u16,
}

impl ItemDef {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            access_path: String::new(),
            item_id: item_id.into(),
            active: true,
            client_handle: None,
            requested_data_type: vt::VT_EMPTY,
        }
    }

    pub fn with_access_path(mut self, access_path: impl Into<String>) -> Self {
        self.access_path = access_path.into();
        self
    }

    pub fn with_client_handle(mut self, handle: ItemHandle) -> Self {
        self.client_handle = Some(handle);
        self
    }

    pub fn with_data_type(mut self, data_type: u16) -> Self {
        self.requested_data_type = data_type;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

impl ToNdr for ItemDef {
    fn marshal_flat(&self, w: &mut NdrWriter) -> OpcResult<()> {
        w.write_referent(true);
        w.write_referent(true);
        w.write_bool(self.active);
        w.write_u32(self.client_handle.unwrap_or_default().0);
        w.write_u32(0); // dwBlobSize
        w.write_referent(false);
        w.write_u16(self.requested_data_type);
        w.write_u16(0);
        Ok(())
    }

    fn marshal_deferred(&self, w: &mut NdrWriter) -> OpcResult<()> {
        w.write_string(&self.access_path)?;
        w.write_string(&self.item_id)
    }
}

/// Result properties of an item after being added to a group.
///
/// This structure contains the server-assigned properties for an item
/// that was successfully added.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemResult {
    /// Handle assigned by the server for this item.
    pub server_handle: ItemHandle,
    /// The actual canonical data type supported by the server for this item.
    pub canonical_data_type: u16,
    /// Access rights for this item (read/write permissions).
    pub access_rights: u32,
    /// Optional opaque blob returned by the server.
    pub blob: Vec<u8>,
}

impl FromNdr for ItemResult {
    type Flat = (Self, u32);

    fn unmarshal_flat(r: &mut NdrReader) -> OpcResult<Self::Flat> {
        let server_handle = ItemHandle(r.read_u32()?);
        let canonical_data_type = r.read_u16()?;
        let _reserved = r.read_u16()?;
        let access_rights = r.read_u32()?;
        let _blob_size = r.read_u32()?;
        let blob = r.read_referent()?;
        Ok((
            Self {
                server_handle,
                canonical_data_type,
                access_rights,
                blob: Vec::new(),
            },
            blob,
        ))
    }

    fn unmarshal_deferred((mut result, blob): Self::Flat, r: &mut NdrReader) -> OpcResult<Self> {
        if blob != 0 {
            let len = r.read_count()?;
            result.blob = r.read_bytes(len)?.to_vec();
        }
        Ok(result)
    }
}

/// Outcome of adding or validating one item, positional with the input.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemAddResult {
    pub status: Status,
    /// Client handle sent for this item.
    pub client_handle: ItemHandle,
    /// `None` when `status` is a failure.
    pub result: Option<ItemResult>,
}

/// Value, quality and timestamp of one item as read.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemValue {
    pub server_handle: ItemHandle,
    pub client_handle: ItemHandle,
    pub status: Status,
    pub quality: Quality,
    pub timestamp: FileTime,
    pub value: Variant,
}

/// Decoded `OPCITEMSTATE`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ItemState {
    pub client_handle: ItemHandle,
    pub timestamp: FileTime,
    pub quality: Quality,
    pub value: Variant,
}

impl FromNdr for ItemState {
    type Flat = (Self, u32);

    fn unmarshal_flat(r: &mut NdrReader) -> OpcResult<Self::Flat> {
        let client_handle = ItemHandle(r.read_u32()?);
        let timestamp = FileTime::unmarshal(r)?;
        let quality = Quality(r.read_u16()?);
        let _reserved = r.read_u16()?;
        let value = r.read_referent()?;
        Ok((
            Self {
                client_handle,
                timestamp,
                quality,
                value: Variant::Empty,
            },
            value,
        ))
    }

    fn unmarshal_deferred((mut state, value): Self::Flat, r: &mut NdrReader) -> OpcResult<Self> {
        if value != 0 {
            state.value = variant::read_variant_body(r)?;
        }
        Ok(state)
    }
}

/// One value to write through `IOPCSyncIO` or `IOPCAsyncIO2`.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemWrite {
    pub server_handle: ItemHandle,
    pub value: Variant,
}

impl ItemWrite {
    pub fn new(server_handle: ItemHandle, value: impl Into<Variant>) -> Self {
        Self {
            server_handle,
            value: value.into(),
        }
    }
}

/// Value with optional quality and timestamp (`OPCITEMVQT`).
#[derive(Debug, Clone, PartialEq)]
pub struct ItemVqt {
    pub value: Variant,
    pub quality: Option<Quality>,
    pub timestamp: Option<FileTime>,
}

impl ItemVqt {
    pub fn value(value: impl Into<Variant>) -> Self {
        Self {
            value: value.into(),
            quality: None,
            timestamp: None,
        }
    }
}

impl ToNdr for ItemVqt {
    fn marshal_flat(&self, w: &mut NdrWriter) -> OpcResult<()> {
        w.write_referent(true);
        w.write_bool(self.quality.is_some());
        w.write_u16(self.quality.unwrap_or_default().0);
        w.write_u16(0);
        w.write_bool(self.timestamp.is_some());
        w.write_u32(0);
        self.timestamp.unwrap_or_default().marshal(w);
        Ok(())
    }

    fn marshal_deferred(&self, w: &mut NdrWriter) -> OpcResult<()> {
        variant::write_variant_body(w, &self.value)
    }
}

/// One item to read through `IOPCItemIO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemIoRead {
    pub item_id: String,
    /// Oldest acceptable cached value, in milliseconds. 0 forces a device
    /// read.
    pub max_age: u32,
}

/// Result of one `IOPCItemIO` read.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemIoValue {
    pub status: Status,
    pub value: Variant,
    pub quality: Quality,
    pub timestamp: FileTime,
}

/// One item to write through `IOPCItemIO::WriteVQT`.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemIoWrite {
    pub item_id: String,
    pub vqt: ItemVqt,
}

/// Well-known OPC item property identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub u32);

impl PropertyId {
    pub const DATATYPE: Self = Self(1);
    pub const VALUE: Self = Self(2);
    pub const QUALITY: Self = Self(3);
    pub const TIMESTAMP: Self = Self(4);
    pub const ACCESS_RIGHTS: Self = Self(5);
    pub const SCAN_RATE: Self = Self(6);
    pub const EU_TYPE: Self = Self(7);
    pub const EU_INFO: Self = Self(8);
    pub const EU_UNITS: Self = Self(100);
    pub const DESCRIPTION: Self = Self(101);
    pub const HIGH_EU: Self = Self(102);
    pub const LOW_EU: Self = Self(103);
    pub const HIGH_IR: Self = Self(104);
    pub const LOW_IR: Self = Self(105);
    pub const CLOSE_LABEL: Self = Self(106);
    pub const OPEN_LABEL: Self = Self(107);
    pub const TIMEZONE: Self = Self(108);
    pub const CONDITION_STATUS: Self = Self(300);
    pub const ALARM_QUICK_HELP: Self = Self(301);
    pub const ALARM_AREA_LIST: Self = Self(302);
    pub const PRIMARY_ALARM_AREA: Self = Self(303);
    pub const CONDITION_LOGIC: Self = Self(304);
    pub const LIMIT_EXCEEDED: Self = Self(305);
    pub const DEADBAND: Self = Self(306);
    pub const HIHI_LIMIT: Self = Self(307);
    pub const HI_LIMIT: Self = Self(308);
    pub const LO_LIMIT: Self = Self(309);
    pub const LOLO_LIMIT: Self = Self(310);
    pub const CHANGE_RATE_LIMIT: Self = Self(311);
    pub const DEVIATION_LIMIT: Self = Self(312);
    pub const SOUND_FILE: Self = Self(313);
    pub const TYPE_SYSTEM_ID: Self = Self(600);
    pub const DICTIONARY_ID: Self = Self(601);
    pub const TYPE_ID: Self = Self(602);
    pub const DICTIONARY: Self = Self(603);
    pub const TYPE_DESCRIPTION: Self = Self(604);
    pub const CONSISTENCY_WINDOW: Self = Self(605);
    pub const WRITE_BEHAVIOR: Self = Self(606);
    pub const UNCONVERTED_ITEM_ID: Self = Self(607);
    pub const UNFILTERED_ITEM_ID: Self = Self(608);
    pub const DATA_FILTER_VALUE: Self = Self(609);

    /// English description for the identifiers defined by the OPC DA
    /// standard.
    pub fn description(self) -> Option<&'static str> {
        Some(match self.0 {
            1 => "Item Canonical Data Type",
            2 => "Item Value",
            3 => "Item Quality",
            4 => "Item Timestamp",
            5 => "Item Access Rights",
            6 => "Server Scan Rate",
            7 => "Item EU Type",
            8 => "Item EU Info",
            100 => "EU Units",
            101 => "Item Description",
            102 => "High EU",
            103 => "Low EU",
            104 => "High Instrument Range",
            105 => "Low Instrument Range",
            106 => "Contact Close Label",
            107 => "Contact Open Label",
            108 => "Item Timezone",
            300 => "Condition Status",
            301 => "Alarm Quick Help",
            302 => "Alarm Area List",
            303 => "Primary Alarm Area",
            304 => "Condition Logic",
            305 => "Limit Exceeded",
            306 => "Deadband",
            307 => "HiHi Limit",
            308 => "Hi Limit",
            309 => "Lo Limit",
            310 => "LoLo Limit",
            311 => "Rate of Change Limit",
            312 => "Deviation Limit",
            313 => "Sound File",
            600 => "Type System ID",
            601 => "Dictionary ID",
            602 => "Type ID",
            603 => "Dictionary",
            604 => "Type Description",
            605 => "Consistency Window",
            606 => "Write Behavior",
            607 => "Unconverted Item ID",
            608 => "Unfiltered Item ID",
            609 => "Data Filter Value",
            _ => return None,
        })
    }
}

/// A property advertised by `QueryAvailableProperties`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub id: PropertyId,
    pub description: String,
    pub data_type: u16,
}

/// One property value returned by `GetItemProperties`.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    pub id: PropertyId,
    pub status: Status,
    pub value: Variant,
}

macro_rules! variant_from {
    ($($ty:ty => $arm:ident),* $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(value: $ty) -> Self {
                    Self::$arm(value)
                }
            }
        )*
    };
}

variant_from! {
    i8 => I1,
    i16 => I2,
    i32 => I4,
    i64 => I8,
    u8 => Ui1,
    u16 => Ui2,
    u32 => Ui4,
    u64 => Ui8,
    f32 => R4,
    f64 => R8,
    bool => Bool,
    String => Bstr,
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Self::Bstr(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_classes() {
        assert!(Quality(0xC0).is_good());
        assert!(Quality(0xD8).is_good());
        assert!(Quality(0x04).is_bad());
        assert!(Quality(0x44).is_uncertain());
        assert_eq!(Quality(0xC0).to_string(), "Good");
    }

    #[test]
    fn test_server_state_labels() {
        assert_eq!(ServerState::from_wire(1).label(), "running");
        assert_eq!(ServerState::from_wire(6).label(), "comm_fault");
        assert_eq!(ServerState::from_wire(42), ServerState::Unknown(42));
        assert_eq!(ServerState::Unknown(42).to_wire(), 42);
        assert_eq!(ServerState::NoConfig.to_string(), "noconfig");
    }

    #[test]
    fn test_item_def_defaults() {
        let def = ItemDef::new("Random.Int4");
        assert!(def.active);
        assert!(def.access_path.is_empty());
        assert_eq!(def.requested_data_type, vt::VT_EMPTY);
        assert!(def.client_handle.is_none());
    }

    #[test]
    fn test_item_def_layout() {
        let def = ItemDef::new("A")
            .with_access_path("P")
            .with_client_handle(ItemHandle(9))
            .with_data_type(vt::VT_R8);
        let mut w = NdrWriter::new();
        w.write_struct(&def).unwrap();
        let mut r = NdrReader::new(w.into_bytes());
        assert_ne!(r.read_referent().unwrap(), 0);
        assert_ne!(r.read_referent().unwrap(), 0);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_u32().unwrap(), 9);
        assert_eq!(r.read_u32().unwrap(), 0);
        assert_eq!(r.read_referent().unwrap(), 0);
        assert_eq!(r.read_u16().unwrap(), vt::VT_R8);
        assert_eq!(r.read_u16().unwrap(), 0);
        assert_eq!(r.read_string().unwrap(), "P");
        assert_eq!(r.read_string().unwrap(), "A");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_item_result_blob_is_deferred() {
        let mut w = NdrWriter::new();
        w.write_u32(2); // count
        for handle in [10, 11] {
            w.write_u32(handle);
            w.write_u16(vt::VT_I4);
            w.write_u16(0);
            w.write_u32(access_rights::READABLE);
            w.write_u32(if handle == 10 { 2 } else { 0 });
            w.write_referent(handle == 10);
        }
        w.write_u32(2);
        w.write_bytes(&[0xAB, 0xCD]);
        let mut r = NdrReader::new(w.into_bytes());
        let results: Vec<ItemResult> = r.read_struct_array(2, "results").unwrap();
        assert_eq!(results[0].server_handle, ItemHandle(10));
        assert_eq!(results[0].blob, vec![0xAB, 0xCD]);
        assert_eq!(results[1].server_handle, ItemHandle(11));
        assert!(results[1].blob.is_empty());
    }

    #[test]
    fn test_property_descriptions() {
        assert_eq!(PropertyId::VALUE.description(), Some("Item Value"));
        assert_eq!(PropertyId(5000).description(), None);
    }

    #[test]
    fn test_variant_from_primitives() {
        assert_eq!(Variant::from(1.5f64), Variant::R8(1.5));
        assert_eq!(Variant::from("x"), Variant::Bstr("x".into()));
        assert_eq!(Variant::from(true), Variant::Bool(true));
    }
}
