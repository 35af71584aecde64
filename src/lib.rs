// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! sPin peer node: a content-addressed object store where a dynamic fleet
//! of homogeneous peers discovers one another through an external name
//! registry and collectively replicates, retrieves, and lazily deletes
//! client-uploaded objects.
//!
//! This crate provides:
//! - Durable metadata (pin table, deletion tombstones) with checkpoint-plus-log persistence
//! - A two-directory content-addressed object store with pull-through caching and eviction
//! - A gossip protocol for learning which peers hold which objects
//! - A replication controller that reconciles worldview against a target replica count
//! - The HTTP request surface (`/add`, `/get`, `/del`, `/info`) tying it all together

/// Runtime configuration.
pub mod config;
/// Core engine: identifiers, metadata, object store, worldview, peer table, replication.
pub mod core;
/// Observability (metrics, structured logging helpers).
pub mod monitoring;
/// Peer identity, the external name registry, and gossip.
pub mod networking;
/// The HTTP request surface.
pub mod server;
/// Shared node state.
pub mod state;
