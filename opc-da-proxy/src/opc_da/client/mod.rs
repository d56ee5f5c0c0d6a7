//! OPC DA client proxies.
//!
//! [`Server`] is the entry point. Everything else is reached through it,
//! or initialized directly from a remote reference with `init`.
mod async_io2;
mod browser;
mod common;
mod group;
mod item_io;
mod item_manager;
mod item_properties;
mod iterator;
mod remote;
mod server;
mod sync_io;
mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use async_io2::AsyncIo2;
pub use browser::{BrowseNode, BrowseTree, Browser, PositionChange};
pub use common::Common;
pub use group::GroupStateManager;
pub use item_io::ItemIo;
pub use item_manager::ItemManager;
pub use item_properties::ItemProperties;
pub use iterator::StringEnumerator;
pub use server::{GroupKey, GroupTarget, Server};
pub use sync_io::SyncIo;
pub use traits::*;
