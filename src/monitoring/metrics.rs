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

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A collector failed to register with the registry.
    #[error("prometheus")]
    Prom,
}

/// Metrics container, handed to every task as `Arc<Metrics>`-free `Clone`
/// (prometheus handles themselves are cheap, ref-counted).
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Objects currently pinned by this node.
    pub pins_held: IntGauge,
    /// Peers currently known via the registry.
    pub peers_known: IntGauge,

    /// Successful ADD requests served.
    pub adds_total: IntCounter,
    /// Successful GET requests served (any source: pinned/cached/pull-through).
    pub gets_total: IntCounter,
    /// GETs that required pull-through from another peer.
    pub gets_pull_through_total: IntCounter,
    /// GETs that resulted in 404.
    pub gets_not_found_total: IntCounter,
    /// Successful DEL requests served.
    pub dels_total: IntCounter,

    /// Outbound gossip broadcasts that failed.
    pub gossip_failures_total: IntCounter,
    /// Pin instructions this node initiated as the min-elected peer.
    pub replication_adds_total: IntCounter,
    /// Drop instructions this node initiated as the max-elected peer.
    pub replication_drops_total: IntCounter,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let pins_held = IntGauge::new("spin_pins_held", "Objects currently pinned")
            .map_err(|_| MetricsError::Prom)?;
        let peers_known = IntGauge::new("spin_peers_known", "Peers currently known via the registry")
            .map_err(|_| MetricsError::Prom)?;

        let adds_total = IntCounter::new("spin_adds_total", "Successful ADD requests served")
            .map_err(|_| MetricsError::Prom)?;
        let gets_total = IntCounter::new("spin_gets_total", "Successful GET requests served")
            .map_err(|_| MetricsError::Prom)?;
        let gets_pull_through_total = IntCounter::new(
            "spin_gets_pull_through_total",
            "GETs that required pull-through from another peer",
        )
        .map_err(|_| MetricsError::Prom)?;
        let gets_not_found_total =
            IntCounter::new("spin_gets_not_found_total", "GETs that resulted in 404")
                .map_err(|_| MetricsError::Prom)?;
        let dels_total = IntCounter::new("spin_dels_total", "Successful DEL requests served")
            .map_err(|_| MetricsError::Prom)?;

        let gossip_failures_total = IntCounter::new(
            "spin_gossip_failures_total",
            "Outbound gossip broadcasts that failed",
        )
        .map_err(|_| MetricsError::Prom)?;
        let replication_adds_total = IntCounter::new(
            "spin_replication_adds_total",
            "Pin instructions initiated by this node",
        )
        .map_err(|_| MetricsError::Prom)?;
        let replication_drops_total = IntCounter::new(
            "spin_replication_drops_total",
            "Drop instructions initiated by this node",
        )
        .map_err(|_| MetricsError::Prom)?;

        for metric in [
            Box::new(pins_held.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(peers_known.clone()),
        ] {
            registry.register(metric).map_err(|_| MetricsError::Prom)?;
        }
        for metric in [
            Box::new(adds_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(gets_total.clone()),
            Box::new(gets_pull_through_total.clone()),
            Box::new(gets_not_found_total.clone()),
            Box::new(dels_total.clone()),
            Box::new(gossip_failures_total.clone()),
            Box::new(replication_adds_total.clone()),
            Box::new(replication_drops_total.clone()),
        ] {
            registry.register(metric).map_err(|_| MetricsError::Prom)?;
        }

        Ok(Self {
            registry,
            pins_held,
            peers_known,
            adds_total,
            gets_total,
            gets_pull_through_total,
            gets_not_found_total,
            dels_total,
            gossip_failures_total,
            replication_adds_total,
            replication_drops_total,
        })
    }
}
