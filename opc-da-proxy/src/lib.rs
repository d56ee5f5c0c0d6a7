//! # opc-da-proxy
//!
//! Async OPC DA client proxies over a pluggable remote-object transport.
//!
//! The crate marshals OPC DA 1.0, 2.0 and 3.0 interface calls to NDR and
//! decodes the replies. Connecting to a machine, authentication and the
//! DCOM wire itself belong to the [`RemoteObject`] implementation supplied
//! by the caller.
//!
//! ## Features
//! - `test-support`: Enables `MockRemoteObject` via `mockall` and the
//!   scripted objects in `opc_da::client::testing`

mod helpers;
pub mod opc_da;
pub mod transport;

// Stable public API
pub use helpers::quality_to_string;
pub use opc_da::client::{
    AsyncIo2, BrowseNode, BrowseTree, Browser, Common, GroupKey, GroupStateManager, GroupTarget,
    ItemIo, ItemManager, ItemProperties, PositionChange, Server, StringEnumerator, SyncIo,
};
pub use opc_da::config::{GroupDefaults, GroupOptions, ServerOptions};
pub use opc_da::errors::{OpcError, OpcResult, Status, friendly_error_hint, friendly_status_hint};
pub use opc_da::events::OpcEvent;
pub use opc_da::filetime::FileTime;
pub use opc_da::typedefs::{
    BrowseDirection, BrowseType, DataSource, EnumScope, GroupHandle, GroupState,
    GroupStateUpdate, ItemDef, ItemHandle, ItemValue, ItemWrite, Quality, ServerState,
    ServerStatus,
};
pub use opc_da::variant::Variant;
pub use transport::{CallRequest, CallResponse, RemoteObject, RemoteRef, TransportError};

// Test support re-export
#[cfg(feature = "test-support")]
pub use transport::MockRemoteObject;
