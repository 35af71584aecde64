#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Handlers for the four peer endpoints: `/add`, `/get`, `/del`, `/info`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Multipart, Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::core::object_id::ObjectId;
use crate::state::AppState;

/// `POST /add/{identifier}`. Streams the `data` multipart field to
/// `pinned/<hash>`, then records the pin.
pub async fn add(
    State(state): State<Arc<AppState>>,
    AxumPath(identifier): AxumPath<String>,
    mut multipart: Multipart,
) -> Response {
    let id: ObjectId = match identifier.parse() {
        Ok(id) => id,
        Err(_) => return (StatusCode::BAD_REQUEST, "malformed identifier").into_response(),
    };
    let hash = id.content_hash();

    let mut data: Option<bytes::Bytes> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "malformed multipart body on /add");
                return (StatusCode::BAD_REQUEST, "malformed multipart body").into_response();
            }
        };
        if field.name() == Some("data") {
            data = match field.bytes().await {
                Ok(b) => Some(b),
                Err(e) => {
                    warn!(error = %e, "failed reading data field on /add");
                    return (StatusCode::BAD_REQUEST, "failed reading data field").into_response();
                }
            };
        }
    }

    let Some(data) = data else {
        return (StatusCode::BAD_REQUEST, "missing data field").into_response();
    };

    info!(%id, "receiving new file");

    if let Err(e) = state.objects.write_pinned(&hash, &data).await {
        error!(%id, error = %e, "failed writing pinned file");
        return (StatusCode::INTERNAL_SERVER_ERROR, "write failed").into_response();
    }

    if let Err(e) = state.pins.insert(id.clone(), hash).await {
        error!(%id, error = %e, "failed recording pin");
        return (StatusCode::INTERNAL_SERVER_ERROR, "metadata write failed").into_response();
    }

    state.metrics.adds_total.inc();
    state.metrics.pins_held.set(state.pins.len().await as i64);
    StatusCode::OK.into_response()
}

/// `GET /get/{identifier}`. A body of exactly `peer` marks this request as
/// peer-originated, suppressing the worldview pull-through path so that
/// peer-to-peer GETs never recurse.
pub async fn get(
    State(state): State<Arc<AppState>>,
    AxumPath(identifier): AxumPath<String>,
    body: bytes::Bytes,
) -> Response {
    let id: ObjectId = match identifier.parse() {
        Ok(id) => id,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };
    let from_peer = body.as_ref() == b"peer";

    if let Some(hash) = state.pins.get(&id).await {
        if let Some(bytes) = state.objects.read_pinned(&hash).await {
            state.metrics.gets_total.inc();
            return bytes.into_response();
        }
    }

    let hash = id.content_hash();
    if state.objects.cache_contains(&hash).await {
        if let Some(bytes) = state.objects.read_cached(&hash).await {
            state.metrics.gets_total.inc();
            return bytes.into_response();
        }
    }

    if from_peer {
        return StatusCode::NOT_FOUND.into_response();
    }

    let mut candidates = state.worldview.known_peers(&id).await;
    if candidates.is_empty() {
        state.metrics.gets_not_found_total.inc();
        return StatusCode::NOT_FOUND.into_response();
    }
    candidates.shuffle(&mut rand::thread_rng());

    for peer_name in candidates {
        let Some(peer) = state.peers.get(&peer_name).await else {
            continue;
        };
        let url = format!("http://{}/get/{id}", peer.addr());
        let resp = state.http.get(&url).body("peer").send().await;
        let Ok(resp) = resp else { continue };
        if !resp.status().is_success() {
            continue;
        }
        let Ok(payload) = resp.bytes().await else { continue };

        if let Err(e) = state.objects.write_cached(&hash, &payload).await {
            warn!(%id, error = %e, "failed caching pulled-through object");
            continue;
        }
        state.metrics.gets_total.inc();
        state.metrics.gets_pull_through_total.inc();
        return payload.into_response();
    }

    state.metrics.gets_not_found_total.inc();
    StatusCode::NOT_FOUND.into_response()
}

/// `POST /del/{identifier}`. A body of exactly `drop` is a drop instruction
/// from a peer's replication controller (local replica reduction only);
/// anything else is a client deletion (global tombstone).
pub async fn del(
    State(state): State<Arc<AppState>>,
    AxumPath(identifier): AxumPath<String>,
    body: bytes::Bytes,
) -> Response {
    let id: ObjectId = match identifier.parse() {
        Ok(id) => id,
        Err(_) => return (StatusCode::BAD_REQUEST, "malformed identifier").into_response(),
    };
    let is_drop = body.as_ref() == b"drop";

    info!(%id, is_drop, "deleting");

    if !is_drop {
        if let Err(e) = state.tombstones.add(id.clone()).await {
            error!(%id, error = %e, "failed recording tombstone");
            return (StatusCode::INTERNAL_SERVER_ERROR, "metadata write failed").into_response();
        }
    }

    if state.pins.get(&id).await.is_some() {
        if let Err(e) = state.pins.remove(&id).await {
            error!(%id, error = %e, "failed removing pin");
            return (StatusCode::INTERNAL_SERVER_ERROR, "metadata write failed").into_response();
        }
    }

    let hash = id.content_hash();
    if !state.pins.hash_referenced(&hash).await {
        if let Err(e) = state.objects.unlink_pinned(&hash).await {
            error!(%id, error = %e, "failed unlinking pinned file");
            return (StatusCode::INTERNAL_SERVER_ERROR, "file store write failed").into_response();
        }
    }

    if !is_drop {
        if let Err(e) = state.objects.unlink_cached(&hash).await {
            error!(%id, error = %e, "failed unlinking cached file");
            return (StatusCode::INTERNAL_SERVER_ERROR, "file store write failed").into_response();
        }
    }

    // Deletion does not fan out to other peers here; it propagates lazily
    // via the /info handler below.

    state.metrics.dels_total.inc();
    state.metrics.pins_held.set(state.pins.len().await as i64);
    StatusCode::OK.into_response()
}

#[derive(Deserialize)]
pub struct InfoRecord {
    pub object: String,
    pub node: String,
}

/// `POST /info`. Inbound gossip: for each `{object, node}` record, either
/// reply with a deletion (lazy tombstone propagation) if we've already
/// deleted the object, or record the sender as a known holder.
pub async fn info(
    State(state): State<Arc<AppState>>,
    Json(records): Json<Vec<InfoRecord>>,
) -> Response {
    let recv_time = Instant::now();

    for record in records {
        let Ok(id) = record.object.parse::<ObjectId>() else {
            warn!(object = %record.object, "dropping malformed /info record");
            continue;
        };

        if state.tombstones.contains(&id).await {
            let Some(peer) = state.peers.get(&record.node).await else {
                continue;
            };
            let url = format!("http://{}/del/{id}", peer.addr());
            if let Err(e) = state
                .http
                .post(&url)
                .timeout(state.config.gossip_timeout)
                .send()
                .await
            {
                warn!(%id, peer = %record.node, error = %e, "lazy deletion propagation failed");
            }
        } else {
            state.worldview.observe(id, record.node, recv_time).await;
        }
    }

    StatusCode::OK.into_response()
}
