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

//! The external name registry: periodic UDP self-advertisement, and
//! periodic HTTP polling of the full peer listing.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::core::peer_table::PeerInfo;

/// Advertisement payload sent to the registry over UDP.
#[derive(Serialize)]
struct Advertisement<'a> {
    #[serde(rename = "type")]
    project_type: &'a str,
    owner: &'a str,
    port: u16,
    uuid: &'a str,
}

/// One raw record as returned by the registry's `/query.json`. Every field
/// is optional: the registry's schema is a bag of keys, and a record
/// missing any key we need is dropped rather than aborting the whole poll.
#[derive(Deserialize)]
struct RegistryRecord {
    #[serde(rename = "type")]
    project_type: Option<String>,
    uuid: Option<String>,
    name: Option<String>,
    port: Option<u16>,
    lastheardfrom: Option<f64>,
}

/// Send one UDP advertisement datagram to the registry. The socket is
/// opened per-datagram and closed immediately.
pub async fn advertise(
    host: &str,
    port: u16,
    project_type: &str,
    owner: &str,
    advertise_port: u16,
    self_name: &str,
) -> std::io::Result<()> {
    let payload = Advertisement {
        project_type,
        owner,
        port: advertise_port,
        uuid: self_name,
    };
    let body = serde_json::to_vec(&payload).expect("advertisement serializes");

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect((host, port)).await?;
    socket.send(&body).await?;
    debug!(host, port, "sent registry advertisement");
    Ok(())
}

/// Poll the registry's full listing, keeping only entries for our project
/// tag that are not ourselves and are fresh enough, and deduplicating by
/// uuid (keeping the freshest record per uuid).
pub async fn poll(
    client: &reqwest::Client,
    host: &str,
    port: u16,
    project_type: &str,
    self_name: &str,
    staleness: Duration,
    poll_timeout: Duration,
) -> reqwest::Result<Vec<PeerInfo>> {
    let url = format!("http://{host}:{port}/query.json");
    let raw: Vec<Value> = client
        .get(&url)
        .timeout(poll_timeout)
        .send()
        .await?
        .json()
        .await?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();

    let mut by_uuid: std::collections::HashMap<String, (f64, PeerInfo)> = std::collections::HashMap::new();

    for value in raw {
        let record: RegistryRecord = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "dropping unparsable registry record");
                continue;
            }
        };

        let Some(project_tag) = record.project_type else { continue };
        if project_tag != project_type {
            continue;
        }
        let Some(uuid) = record.uuid else { continue };
        if uuid == self_name {
            continue;
        }
        let Some(host) = record.name else { continue };
        let Some(port) = record.port else { continue };
        let Some(last_heard_from) = record.lastheardfrom else { continue };

        if now - last_heard_from > staleness.as_secs_f64() {
            continue;
        }

        let keep = match by_uuid.get(&uuid) {
            Some((existing_ts, _)) => last_heard_from > *existing_ts,
            None => true,
        };
        if keep {
            by_uuid.insert(
                uuid.clone(),
                (
                    last_heard_from,
                    PeerInfo {
                        name: uuid,
                        host,
                        port,
                    },
                ),
            );
        }
    }

    Ok(by_uuid.into_values().map(|(_, peer)| peer).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_record_ignores_unknown_keys() {
        let v: Value = serde_json::json!({
            "type": "sPin",
            "uuid": "abc",
            "name": "host1",
            "port": 9000,
            "lastheardfrom": 123.0,
            "extra": "ignored",
        });
        let record: RegistryRecord = serde_json::from_value(v).unwrap();
        assert_eq!(record.project_type.as_deref(), Some("sPin"));
        assert_eq!(record.port, Some(9000));
    }

    #[test]
    fn registry_record_tolerates_missing_fields() {
        let v: Value = serde_json::json!({ "type": "sPin" });
        let record: RegistryRecord = serde_json::from_value(v).unwrap();
        assert_eq!(record.uuid, None);
    }
}
