//! End-to-end scenarios exercising real HTTP traffic between in-process
//! nodes: add/get, cross-node replication, over-replication drop, lazy
//! deletion propagation, pull-through caching, and restart durability.

use std::sync::Arc;
use std::time::{Duration, Instant};

use spin_peer::config::Config;
use spin_peer::core::peer_table::PeerInfo;
use spin_peer::state::AppState;

async fn spawn_node(data_dir: &std::path::Path) -> (Arc<AppState>, std::net::SocketAddr) {
    spawn_node_with_k_denom(data_dir, 3).await
}

async fn spawn_node_with_k_denom(
    data_dir: &std::path::Path,
    k_denom: u64,
) -> (Arc<AppState>, std::net::SocketAddr) {
    let config = Config {
        data_dir: data_dir.to_string_lossy().into_owned(),
        bind_addr: "127.0.0.1:0".to_string(),
        advertise_addr: String::new(),
        nameserver_host: "unused.invalid".to_string(),
        nameserver_port: 0,
        nameserver_type: "sPin".to_string(),
        nameserver_owner: "test".to_string(),
        nameserver_wait: Duration::from_secs(3600),
        maintain_interval: Duration::from_secs(3600),
        nameserver_staleness: Duration::from_secs(3600),
        world_staleness: Duration::from_secs(3600),
        k_denom,
        max_pin_log_size: 100,
        max_del_log_size: 5000,
        max_cache_size: 10_000_000_000,
        gossip_timeout: Duration::from_secs(5),
    };

    let state = Arc::new(AppState::open(config).await.expect("state opens"));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = spin_peer::server::router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (state, addr)
}

fn peer_info(name: &str, addr: std::net::SocketAddr) -> PeerInfo {
    PeerInfo {
        name: name.to_string(),
        host: addr.ip().to_string(),
        port: addr.port(),
    }
}

#[tokio::test]
async fn add_then_get_round_trips_through_http() {
    let dir = tempfile::tempdir().unwrap();
    let (_state, addr) = spawn_node(dir.path()).await;
    let client = reqwest::Client::new();

    let payload = b"hello, sPin".to_vec();
    let id = spin_peer::core::object_id::ObjectId::generate(&payload);

    let form = reqwest::multipart::Form::new().part(
        "data",
        reqwest::multipart::Part::bytes(payload.clone()),
    );
    let resp = client
        .post(format!("http://{addr}/add/{id}"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let resp = client
        .get(format!("http://{addr}/get/{id}"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.bytes().await.unwrap().as_ref(), payload.as_slice());
}

#[tokio::test]
async fn get_of_unknown_identifier_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (_state, addr) = spawn_node(dir.path()).await;
    let client = reqwest::Client::new();

    let id = spin_peer::core::object_id::ObjectId::generate(b"never uploaded");
    let resp = client
        .get(format!("http://{addr}/get/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pull_through_get_caches_from_a_peer_and_never_recurses() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let (state_a, addr_a) = spawn_node(dir_a.path()).await;
    let (state_b, addr_b) = spawn_node(dir_b.path()).await;

    state_a.peers.replace(vec![peer_info("b", addr_b)]).await;
    state_b.peers.replace(vec![peer_info("a", addr_a)]).await;

    let payload = b"only on b".to_vec();
    let id = spin_peer::core::object_id::ObjectId::generate(&payload);
    state_b
        .objects
        .write_pinned(&id.content_hash(), &payload)
        .await
        .unwrap();
    state_b.pins.insert(id.clone(), id.content_hash()).await.unwrap();

    // a's worldview learns b holds the object, as gossip would populate it.
    state_a
        .worldview
        .observe(id.clone(), "b".to_string(), Instant::now())
        .await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr_a}/get/{id}"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.bytes().await.unwrap().as_ref(), payload.as_slice());

    // a now has it cached locally and would not need to ask again.
    assert!(state_a.objects.cache_contains(&id.content_hash()).await);

    // b must refuse to forward further: a peer-originated GET never recurses.
    let resp = client
        .get(format!("http://{addr_b}/get/{id}"))
        .body("peer")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
}

#[tokio::test]
async fn replication_tick_adds_to_under_replicated_peer() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let dir_c = tempfile::tempdir().unwrap();
    // k_denom: 1 means k == peer_count, so with two peers known ("b", "c")
    // and only one known holder ("a" itself) the object is under-replicated.
    let (state_a, _addr_a) = spawn_node_with_k_denom(dir_a.path(), 1).await;
    let (state_b, addr_b) = spawn_node(dir_b.path()).await;
    let (state_c, addr_c) = spawn_node(dir_c.path()).await;

    state_a
        .peers
        .replace(vec![peer_info("b", addr_b), peer_info("c", addr_c)])
        .await;

    let payload = b"replicate me".to_vec();
    let id = spin_peer::core::object_id::ObjectId::generate(&payload);
    state_a
        .objects
        .write_pinned(&id.content_hash(), &payload)
        .await
        .unwrap();
    state_a.pins.insert(id.clone(), id.content_hash()).await.unwrap();

    // a is the object's only known holder, so it is trivially both the
    // lexicographic min and max of its own known-pins set and initiates
    // the add on its own tick, to a randomly chosen under-represented peer.
    spin_peer::core::replication::tick(&state_a).await;

    // Give the fire-and-forget HTTP add a moment to land.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let b_has_it = state_b.pins.get(&id).await.is_some();
    let c_has_it = state_c.pins.get(&id).await.is_some();
    assert!(
        b_has_it || c_has_it,
        "expected the add to land on one of the under-replicated peers"
    );

    let recipient = if b_has_it { &state_b } else { &state_c };
    assert_eq!(
        recipient.objects.read_pinned(&id.content_hash()).await,
        Some(payload)
    );
}

#[tokio::test]
async fn drop_instruction_removes_only_the_local_replica_not_the_tombstone() {
    let dir = tempfile::tempdir().unwrap();
    let (_state, addr) = spawn_node(dir.path()).await;
    let client = reqwest::Client::new();

    let payload = b"over-replicated".to_vec();
    let id = spin_peer::core::object_id::ObjectId::generate(&payload);
    let form =
        reqwest::multipart::Form::new().part("data", reqwest::multipart::Part::bytes(payload));
    client
        .post(format!("http://{addr}/add/{id}"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("http://{addr}/del/{id}"))
        .body("drop")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let resp = client
        .get(format!("http://{addr}/get/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn client_deletion_propagates_lazily_through_info_gossip() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let (state_a, addr_a) = spawn_node(dir_a.path()).await;
    let (state_b, addr_b) = spawn_node(dir_b.path()).await;

    state_a.peers.replace(vec![peer_info("b", addr_b)]).await;
    state_b.peers.replace(vec![peer_info("a", addr_a)]).await;

    let payload = b"doomed".to_vec();
    let id = spin_peer::core::object_id::ObjectId::generate(&payload);

    // Both a and b hold the object; a deletes its copy as a client delete
    // (tombstone), b does not yet know.
    state_a
        .objects
        .write_pinned(&id.content_hash(), &payload)
        .await
        .unwrap();
    state_a.pins.insert(id.clone(), id.content_hash()).await.unwrap();
    state_b
        .objects
        .write_pinned(&id.content_hash(), &payload)
        .await
        .unwrap();
    state_b.pins.insert(id.clone(), id.content_hash()).await.unwrap();

    let client = reqwest::Client::new();
    client
        .post(format!("http://{addr_a}/del/{id}"))
        .body("")
        .send()
        .await
        .unwrap();
    assert!(state_a.tombstones.contains(&id).await);

    // b gossips that it holds the object; a's /info handler, seeing its own
    // tombstone, replies by deleting b's copy lazily.
    let gossip_body = serde_json::json!([{ "object": id.to_string(), "node": "b" }]);
    let resp = client
        .post(format!("http://{addr_a}/info"))
        .json(&gossip_body)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(state_b.pins.get(&id).await.is_none());
}

#[tokio::test]
async fn pin_and_tombstone_state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();

    let id = spin_peer::core::object_id::ObjectId::generate(b"durable");
    let deleted = spin_peer::core::object_id::ObjectId::generate(b"durable-deleted");

    {
        let (state, _addr) = spawn_node(dir.path()).await;
        state
            .objects
            .write_pinned(&id.content_hash(), b"durable")
            .await
            .unwrap();
        state.pins.insert(id.clone(), id.content_hash()).await.unwrap();
        state.tombstones.add(deleted.clone()).await.unwrap();
    }

    let (reopened, _addr) = spawn_node(dir.path()).await;
    assert_eq!(reopened.pins.get(&id).await, Some(id.content_hash()));
    assert_eq!(
        reopened.objects.read_pinned(&id.content_hash()).await,
        Some(b"durable".to_vec())
    );
    assert!(reopened.tombstones.contains(&deleted).await);
}
