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

//! Outbound gossip: after each registry poll, broadcast this node's full
//! pin set to every known peer's `/info`.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

#[derive(Serialize)]
struct InfoRecord<'a> {
    object: &'a str,
    node: &'a str,
}

/// POST the array of `{object, node}` records for every locally pinned
/// identifier to each known peer's `/info`. Failures are logged and
/// ignored; the next registry-poll tick retries implicitly with fresh
/// data.
pub async fn broadcast(state: &Arc<AppState>) {
    let pins = state.pins.snapshot().await;
    let peers = state.peers.snapshot().await;
    if peers.is_empty() || pins.is_empty() {
        return;
    }

    let payload: Vec<InfoRecord> = pins
        .keys()
        .map(|id| InfoRecord {
            object: id.as_str(),
            node: &state.self_name,
        })
        .collect();

    for peer in peers {
        let url = format!("http://{}/info", peer.addr());
        match state
            .http
            .post(&url)
            .timeout(state.config.gossip_timeout)
            .json(&payload)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                warn!(peer = %peer.name, status = %resp.status(), "gossip broadcast rejected");
                state.metrics.gossip_failures_total.inc();
            }
            Err(e) => {
                warn!(peer = %peer.name, error = %e, "gossip broadcast failed");
                state.metrics.gossip_failures_total.inc();
            }
        }
    }
}
