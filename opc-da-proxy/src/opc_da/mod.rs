//! OPC DA protocol implementation.
//!
//! The NDR codec and OPC data types, the per-interface call traits, and the
//! proxies built on them.

#![allow(
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::unreadable_literal
)]
pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod filetime;
pub mod iid;
pub mod ndr;
pub mod typedefs;
pub mod variant;
