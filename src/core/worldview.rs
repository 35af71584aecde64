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

//! This peer's belief about which peers hold which objects, populated by
//! inbound `/info` gossip and expired wholesale on each maintenance tick.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::core::object_id::ObjectId;

/// One worldview entry: a peer believed to hold an object, and when we last
/// heard so.
#[derive(Clone, Debug)]
pub struct WorldRecord {
    pub peer: String,
    pub last_heard_from: Instant,
}

/// Not persisted across restarts.
#[derive(Default)]
pub struct Worldview {
    map: RwLock<HashMap<ObjectId, Vec<WorldRecord>>>,
}

impl Worldview {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `peer` claims to hold `object`. Repeated observations of
    /// the same peer append another record rather than updating one in
    /// place; duplicates are harmless since `known_pins` collapses holders
    /// into a set, and the stale copies are dropped on the next expiry pass.
    pub async fn observe(&self, object: ObjectId, peer: String, now: Instant) {
        let mut map = self.map.write().await;
        map.entry(object).or_default().push(WorldRecord {
            peer,
            last_heard_from: now,
        });
    }

    /// Peers known (non-expired) to hold `object`.
    pub async fn known_peers(&self, object: &ObjectId) -> Vec<String> {
        self.map
            .read()
            .await
            .get(object)
            .map(|records| records.iter().map(|r| r.peer.clone()).collect())
            .unwrap_or_default()
    }

    /// Whether `object` has any recorded holders at all.
    pub async fn contains(&self, object: &ObjectId) -> bool {
        self.map
            .read()
            .await
            .get(object)
            .map(|records| !records.is_empty())
            .unwrap_or(false)
    }

    /// Rebuild the whole map, retaining only records younger than `staleness`.
    /// Applied whole-map on each maintenance tick, not per-lookup.
    pub async fn expire(&self, staleness: Duration, now: Instant) {
        let mut map = self.map.write().await;
        map.retain(|_, records| {
            records.retain(|r| now.duration_since(r.last_heard_from) < staleness);
            !records.is_empty()
        });
    }

    /// Snapshot of all `(object, known-holder)` pairs, for the replication controller.
    pub async fn snapshot(&self) -> HashMap<ObjectId, Vec<String>> {
        self.map
            .read()
            .await
            .iter()
            .map(|(id, records)| (id.clone(), records.iter().map(|r| r.peer.clone()).collect()))
            .collect()
    }
}
