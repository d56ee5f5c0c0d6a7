/// OPC DA client trait definitions.
///
/// One trait per remote interface. Each default method builds the request
/// stub, performs exactly one call through the implementor's interface
/// reference and decodes the out parameters:
///
/// Version independent traits:
/// - CommonTrait: Locale and error text
/// - EnumStringTrait: Paged name lists
///
/// OPC DA 1.0 traits:
/// - ServerTrait: Group lifecycle and server status
/// - GroupStateMgtTrait: Group configuration
/// - ItemMgtTrait: Batched item management
/// - SyncIoTrait: Basic synchronous operations
///
/// OPC DA 2.0 traits:
/// - AsyncIo2Trait: Enhanced asynchronous operations
/// - BrowseServerAddressSpaceTrait: Address space navigation
/// - ItemPropertiesTrait: Item property discovery
///
/// OPC DA 3.0 traits:
/// - ItemIoTrait: Direct item access
mod async_io2;
mod browse_server_address_space;
mod common;
mod enum_string;
mod group_state_mgt;
pub(crate) mod item_mgt;
mod item_io;
mod item_properties;
mod server;
mod sync_io;

pub use async_io2::*;
pub use browse_server_address_space::*;
pub use common::*;
pub use enum_string::*;
pub use group_state_mgt::*;
pub use item_io::*;
pub use item_mgt::ItemMgtTrait;
pub use item_properties::*;
pub use server::*;
pub use sync_io::*;
