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

//! Shared node state: the one `Arc<AppState>` handed to every handler and
//! background task.

use std::path::Path;

use anyhow::Context;

use crate::config::Config;
use crate::core::metadata::{PinStore, TombstoneStore};
use crate::core::object_store::ObjectStore;
use crate::core::peer_table::PeerTable;
use crate::core::worldview::Worldview;
use crate::monitoring::metrics::Metrics;
use crate::networking::identity;

/// All mutable, shared state for one node, plus the handles needed to talk
/// to the outside world.
pub struct AppState {
    /// Runtime configuration this node was started with.
    pub config: Config,
    /// This node's identity, as used in peer table entries and gossip.
    pub self_name: String,

    /// Authoritative record of objects this node has pinned.
    pub pins: PinStore,
    /// Tombstones for objects client-deleted from this node.
    pub tombstones: TombstoneStore,
    /// On-disk `pinned/` and `cached/` content.
    pub objects: ObjectStore,
    /// This node's view of which peers hold which objects.
    pub worldview: Worldview,
    /// The current peer fleet, as last learned from the registry.
    pub peers: PeerTable,

    /// Prometheus metrics.
    pub metrics: Metrics,
    /// Shared client for peer-to-peer and registry HTTP calls.
    pub http: reqwest::Client,
}

impl AppState {
    /// Construct the node's state, creating the on-disk layout under
    /// `config.data_dir` if it does not already exist. Failing to establish
    /// identity or required directories is the one class of startup error
    /// that is fatal to the process.
    pub async fn open(config: Config) -> anyhow::Result<Self> {
        let data_dir = Path::new(&config.data_dir);
        let meta_dir = data_dir.join("meta");
        std::fs::create_dir_all(&meta_dir)
            .with_context(|| format!("creating metadata directory {}", meta_dir.display()))?;

        let self_name = identity::load_or_create(&meta_dir).context("loading peer identity")?;

        let pins = PinStore::open(&meta_dir, config.max_pin_log_size)
            .context("opening pin store")?;
        let tombstones = TombstoneStore::open(&meta_dir, config.max_del_log_size)
            .context("opening tombstone store")?;
        let objects = ObjectStore::open(data_dir)
            .await
            .context("opening object store")?;

        // No global timeout: object transfers (add uploads, pull-through
        // downloads) must not be bounded by the short gossip deadline.
        // Gossip and registry calls set their own per-call timeout instead.
        let http = reqwest::Client::builder()
            .build()
            .context("building http client")?;

        let metrics = Metrics::new().context("initializing metrics")?;

        Ok(Self {
            config,
            self_name,
            pins,
            tombstones,
            objects,
            worldview: Worldview::new(),
            peers: PeerTable::new(),
            metrics,
            http,
        })
    }
}
