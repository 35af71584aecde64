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

//! The peer table: this node's belief about which other nodes are alive,
//! rebuilt wholesale on every registry poll.

use std::collections::HashMap;

use tokio::sync::RwLock;

/// One peer, as reported by the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl PeerInfo {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Not persisted; recreated wholesale each registry poll.
#[derive(Default)]
pub struct PeerTable {
    peers: RwLock<HashMap<String, PeerInfo>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire table atomically.
    pub async fn replace(&self, peers: Vec<PeerInfo>) {
        let map = peers.into_iter().map(|p| (p.name.clone(), p)).collect();
        *self.peers.write().await = map;
    }

    /// Snapshot of all known peers.
    pub async fn snapshot(&self) -> Vec<PeerInfo> {
        self.peers.read().await.values().cloned().collect()
    }

    /// Names of all known peers.
    pub async fn names(&self) -> Vec<String> {
        self.peers.read().await.keys().cloned().collect()
    }

    /// Look up a single peer by name.
    pub async fn get(&self, name: &str) -> Option<PeerInfo> {
        self.peers.read().await.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }
}
