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

//! The replication controller: on each maintenance tick, reconcile the
//! worldview against a target replica count per object by electing a drop
//! or an add.
//!
//! The election rule gives every peer the same decision for the same input
//! without coordination: the lexicographically maximum pin among the
//! object's known holders initiates a drop, the minimum initiates an add.
//! Concurrent initiators remain possible only if worldviews diverge, and
//! that is tolerated — the next tick corrects over- or under-replication.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::core::object_id::ObjectId;
use crate::state::AppState;

/// `k = ceil(peers / k_denom)`, the target replica count per object.
pub fn target_replica_count(peer_count: usize, k_denom: u64) -> usize {
    if peer_count == 0 {
        return 0;
    }
    (peer_count as u64).div_ceil(k_denom) as usize
}

/// The pin set `known_pins` for one object, always including self exactly
/// once.
pub fn known_pins(self_name: &str, worldview_holders: &[String]) -> HashSet<String> {
    let mut set: HashSet<String> = worldview_holders.iter().cloned().collect();
    set.insert(self_name.to_string());
    set
}

/// Peers that do not (as far as we know) hold this object.
pub fn not_pins(all_peers: &[String], known: &HashSet<String>) -> Vec<String> {
    all_peers
        .iter()
        .filter(|p| !known.contains(*p))
        .cloned()
        .collect()
}

/// If `self_name` is the lexicographically maximum member of `known`, pick
/// a uniformly random victim from `known` to drop. Only the maximum pin
/// initiates; everyone else returns `None`.
pub fn elect_drop_victim(self_name: &str, known: &HashSet<String>) -> Option<String> {
    let max = known.iter().max()?;
    if max != self_name {
        return None;
    }
    let mut rng = rand::thread_rng();
    let pool: Vec<&String> = known.iter().collect();
    pool.choose(&mut rng).map(|s| s.to_string())
}

/// If `self_name` is the lexicographically minimum member of `known`, pick
/// a uniformly random recipient from `not_pins` to add. Only the minimum
/// pin initiates; everyone else (or an empty `not_pins`) returns `None`.
pub fn elect_add_recipient(
    self_name: &str,
    known: &HashSet<String>,
    not_pins: &[String],
) -> Option<String> {
    let min = known.iter().min()?;
    if min != self_name || not_pins.is_empty() {
        return None;
    }
    let mut rng = rand::thread_rng();
    not_pins.choose(&mut rng).cloned()
}

/// Run one maintenance tick: expire stale worldview records, then reconcile
/// replica counts for every locally pinned object.
pub async fn tick(state: &Arc<AppState>) {
    let now = Instant::now();
    state.worldview.expire(state.config.world_staleness, now).await;

    let peer_names = state.peers.names().await;
    let k = target_replica_count(peer_names.len(), state.config.k_denom);

    let pins = state.pins.snapshot().await;
    for object in pins.keys() {
        reconcile_one(state, object, &peer_names, k).await;
    }

    if let Err(e) = state.objects.evict_cache(state.config.max_cache_size).await {
        warn!(error = %e, "cache eviction failed");
    }
}

async fn reconcile_one(state: &Arc<AppState>, object: &ObjectId, peer_names: &[String], k: usize) {
    let holders = state.worldview.known_peers(object).await;
    let known = known_pins(&state.self_name, &holders);
    let count = known.len();

    if count > k {
        if let Some(victim) = elect_drop_victim(&state.self_name, &known) {
            if victim != state.self_name {
                issue_drop(state, &victim, object).await;
            }
        }
    } else if count < k {
        let not_pins = not_pins(peer_names, &known);
        if let Some(recipient) = elect_add_recipient(&state.self_name, &known, &not_pins) {
            issue_add(state, &recipient, object).await;
        }
    }
}

async fn issue_drop(state: &Arc<AppState>, victim_name: &str, object: &ObjectId) {
    let Some(peer) = state.peers.get(victim_name).await else {
        return;
    };
    let url = format!("http://{}/del/{object}", peer.addr());
    match state
        .http
        .post(&url)
        .timeout(state.config.gossip_timeout)
        .body("drop")
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            info!(%object, peer = %victim_name, "initiated drop");
            state.metrics.replication_drops_total.inc();
        }
        Ok(resp) => warn!(%object, peer = %victim_name, status = %resp.status(), "drop instruction rejected"),
        Err(e) => warn!(%object, peer = %victim_name, error = %e, "drop instruction failed"),
    }
}

async fn issue_add(state: &Arc<AppState>, recipient_name: &str, object: &ObjectId) {
    let Some(peer) = state.peers.get(recipient_name).await else {
        return;
    };
    let hash = object.content_hash();
    let Some(bytes) = state.objects.read_pinned(&hash).await else {
        warn!(%object, "cannot initiate add: local pinned file missing");
        return;
    };

    let url = format!("http://{}/add/{object}", peer.addr());
    let part = reqwest::multipart::Part::bytes(bytes).file_name(hash.as_str().to_string());
    let form = reqwest::multipart::Form::new().part("data", part);

    match state.http.post(&url).multipart(form).send().await {
        Ok(resp) if resp.status().is_success() => {
            info!(%object, peer = %recipient_name, "initiated add");
            state.metrics.replication_adds_total.inc();
        }
        Ok(resp) => warn!(%object, peer = %recipient_name, status = %resp.status(), "add instruction rejected"),
        Err(e) => warn!(%object, peer = %recipient_name, error = %e, "add instruction failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_replica_count_rounds_up() {
        assert_eq!(target_replica_count(3, 3), 1);
        assert_eq!(target_replica_count(4, 3), 2);
        assert_eq!(target_replica_count(6, 3), 2);
        assert_eq!(target_replica_count(0, 3), 0);
    }

    #[test]
    fn known_pins_always_includes_self_once() {
        let known = known_pins("self", &["self".to_string(), "other".to_string()]);
        assert_eq!(known.len(), 2);
        assert!(known.contains("self"));
    }

    #[test]
    fn only_max_pin_initiates_drop() {
        let known: HashSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert!(elect_drop_victim("c", &known).is_some());
        assert!(elect_drop_victim("a", &known).is_none());
        assert!(elect_drop_victim("b", &known).is_none());
    }

    #[test]
    fn only_min_pin_initiates_add() {
        let known: HashSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let not_pins = vec!["d".to_string()];
        assert!(elect_add_recipient("a", &known, &not_pins).is_some());
        assert!(elect_add_recipient("b", &known, &not_pins).is_none());
        assert!(elect_add_recipient("c", &known, &not_pins).is_none());
    }

    #[test]
    fn add_election_with_no_candidates_does_nothing() {
        let known: HashSet<String> = ["a"].iter().map(|s| s.to_string()).collect();
        assert!(elect_add_recipient("a", &known, &[]).is_none());
    }

    #[test]
    fn not_pins_excludes_known_holders() {
        let known: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let all = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(not_pins(&all, &known), vec!["c".to_string()]);
    }
}
