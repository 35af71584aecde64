#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Networking: peer identity, the external name registry, and gossip.

pub mod gossip;
pub mod identity;
pub mod registry_client;
