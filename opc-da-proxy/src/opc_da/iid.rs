//! Interface identifiers of the remote interfaces this crate speaks.

use uuid::{Uuid, uuid};

pub const IID_IUNKNOWN: Uuid = uuid!("00000000-0000-0000-C000-000000000046");
pub const IID_IENUM_STRING: Uuid = uuid!("00000101-0000-0000-C000-000000000046");

pub const IID_IOPC_COMMON: Uuid = uuid!("F31DFDE2-07B6-11D2-B2D8-0060083BA1FB");

pub const IID_IOPC_SERVER: Uuid = uuid!("39C13A4D-011E-11D0-9675-0020AFD8ADB3");
pub const IID_IOPC_BROWSE_SERVER_ADDRESS_SPACE: Uuid =
    uuid!("39C13A4F-011E-11D0-9675-0020AFD8ADB3");
pub const IID_IOPC_GROUP_STATE_MGT: Uuid = uuid!("39C13A50-011E-11D0-9675-0020AFD8ADB3");
pub const IID_IOPC_SYNC_IO: Uuid = uuid!("39C13A52-011E-11D0-9675-0020AFD8ADB3");
pub const IID_IOPC_ITEM_MGT: Uuid = uuid!("39C13A54-011E-11D0-9675-0020AFD8ADB3");
pub const IID_IOPC_ASYNC_IO2: Uuid = uuid!("39C13A71-011E-11D0-9675-0020AFD8ADB3");
pub const IID_IOPC_ITEM_PROPERTIES: Uuid = uuid!("39C13A72-011E-11D0-9675-0020AFD8ADB3");
pub const IID_IOPC_ITEM_IO: Uuid = uuid!("85C0B427-2893-4CBC-BD78-E5FC5146F08F");

/// Human-readable interface name for logs.
pub fn interface_name(iid: &Uuid) -> &'static str {
    match *iid {
        IID_IUNKNOWN => "IUnknown",
        IID_IENUM_STRING => "IEnumString",
        IID_IOPC_COMMON => "IOPCCommon",
        IID_IOPC_SERVER => "IOPCServer",
        IID_IOPC_BROWSE_SERVER_ADDRESS_SPACE => "IOPCBrowseServerAddressSpace",
        IID_IOPC_GROUP_STATE_MGT => "IOPCGroupStateMgt",
        IID_IOPC_SYNC_IO => "IOPCSyncIO",
        IID_IOPC_ITEM_MGT => "IOPCItemMgt",
        IID_IOPC_ASYNC_IO2 => "IOPCAsyncIO2",
        IID_IOPC_ITEM_PROPERTIES => "IOPCItemProperties",
        IID_IOPC_ITEM_IO => "IOPCItemIO",
        _ => "unknown interface",
    }
}
