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

//! Runtime configuration, read from the environment with the constants of
//! the design as defaults.

use std::time::Duration;

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Fully resolved node configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding `meta/`, `pinned/`, `cached/`.
    pub data_dir: String,
    /// Host:port this node's HTTP server binds to.
    pub bind_addr: String,
    /// Host:port this node advertises to the registry. Empty unless
    /// `SPIN_ADVERTISE_ADDR` is set, in which case the actual bound port
    /// (relevant when `bind_addr` asks for an ephemeral port `:0`) is used.
    pub advertise_addr: String,

    /// Registry UDP/HTTP host.
    pub nameserver_host: String,
    /// Registry UDP/HTTP port.
    pub nameserver_port: u16,
    /// Project tag advertised to and filtered from the registry.
    pub nameserver_type: String,
    /// Owner string advertised to the registry.
    pub nameserver_owner: String,

    /// Interval between registry advertisements and polls.
    pub nameserver_wait: Duration,
    /// Interval between replication-controller ticks.
    pub maintain_interval: Duration,
    /// Maximum age of a registry record before it is dropped.
    pub nameserver_staleness: Duration,
    /// Maximum age of a worldview record before it is purged.
    pub world_staleness: Duration,

    /// Divisor used to compute the target replica count `k`.
    pub k_denom: u64,
    /// Pin log entry count that triggers a checkpoint.
    pub max_pin_log_size: usize,
    /// Tombstone log entry count that triggers truncation.
    pub max_del_log_size: usize,
    /// Cache directory byte-size ceiling.
    pub max_cache_size: u64,

    /// Total deadline for a single outbound gossip POST.
    pub gossip_timeout: Duration,
}

impl Config {
    /// Build configuration from the environment, falling back to the
    /// design's defaults for anything unset.
    pub fn from_env() -> Self {
        let bind_addr = env("SPIN_BIND_ADDR", "0.0.0.0:0");
        let advertise_addr = env("SPIN_ADVERTISE_ADDR", "");

        let base = Duration::from_secs(env_parsed("SPIN_BASE_INTERVAL", 10));

        Self {
            data_dir: env("SPIN_DATA_DIR", "./data"),
            bind_addr,
            advertise_addr,

            nameserver_host: env("SPIN_NAMESERVER_HOST", "catalog.cse.nd.edu"),
            nameserver_port: env_parsed("SPIN_NAMESERVER_PORT", 9097),
            nameserver_type: env("SPIN_NAMESERVER_TYPE", "sPin"),
            nameserver_owner: env("SPIN_NAMESERVER_OWNER", "spin-peer"),

            nameserver_wait: Duration::from_secs(env_parsed(
                "SPIN_NAMESERVER_WAIT_SECS",
                3 * base.as_secs(),
            )),
            maintain_interval: Duration::from_secs(env_parsed(
                "SPIN_MAINTAIN_INTERVAL_SECS",
                9 * base.as_secs(),
            )),
            nameserver_staleness: Duration::from_secs(env_parsed(
                "SPIN_NAMESERVER_STALENESS_SECS",
                6 * base.as_secs(),
            )),
            world_staleness: Duration::from_secs(env_parsed(
                "SPIN_WORLD_STALENESS_SECS",
                30 * base.as_secs(),
            )),

            k_denom: env_parsed("SPIN_K_DENOM", 3),
            max_pin_log_size: env_parsed("SPIN_MAX_PIN_LOG_SIZE", 100),
            max_del_log_size: env_parsed("SPIN_MAX_DEL_LOG_SIZE", 5000),
            max_cache_size: env_parsed("SPIN_MAX_CACHE_SIZE", 10_000_000_000),

            gossip_timeout: Duration::from_secs(5),
        }
    }
}
