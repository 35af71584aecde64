#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Core engine: object identifiers, durable metadata, the object file
//! store, worldview, peer table, and the replication controller.

pub mod metadata;
pub mod object_id;
pub mod object_store;
pub mod peer_table;
pub mod replication;
pub mod worldview;
