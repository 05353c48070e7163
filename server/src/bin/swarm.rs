//! Swarm of headless wandering clients for the plaza server.
//!
//! Each client:
//! - Connects and waits for its `init`
//! - Drives a `ClientSync` at the frame cadence, changing direction now and
//!   then, and sends every position update it produces
//! - Applies every snapshot it receives and counts proxy changes
//!
//! Usage: cargo run --bin swarm -- [OPTIONS]
//!
//! Options:
//!   --clients N      Number of clients to spawn (default: 20)
//!   --duration S     Test duration in seconds (default: 30)
//!   --fps F          Frames (and updates) per second per client (default: 60)
//!   --url URL        Server URL (default: ws://127.0.0.1:8080/ws)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use futures_util::{SinkExt, StreamExt};
use plaza_shared::client::{ClientSync, Direction};
use plaza_shared::config::ClientConfig;
use plaza_shared::protocol::{parse_server_msg, ServerMsg};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Chance per frame that a client picks a new heading
const TURN_CHANCE: f64 = 0.02;

// === Metrics ===

#[derive(Default)]
struct Metrics {
    connected: AtomicU64,
    updates_sent: AtomicU64,
    snapshots_received: AtomicU64,
    proxy_changes: AtomicU64,
    max_players_seen: AtomicU64,
    errors: AtomicU64,
}

// === Client task ===

async fn run_client(
    client_id: u32,
    url: String,
    config: ClientConfig,
    duration: Duration,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    let (mut ws, _) = connect_async(&url)
        .await
        .with_context(|| format!("client {client_id} failed to connect"))?;
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    let mut sync = ClientSync::new(config).map_err(anyhow::Error::msg)?;
    let mut rng = ChaCha8Rng::seed_from_u64(client_id as u64);

    // Wait for init before doing anything else
    let init = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            if let Message::Text(text) = msg? {
                if let Ok(msg @ ServerMsg::Init { .. }) = parse_server_msg(&text) {
                    sync.handle_message(msg);
                    return Ok(true);
                }
            }
        }
        Ok::<_, tokio_tungstenite::tungstenite::Error>(false)
    })
    .await;
    match init {
        Ok(Ok(true)) => {}
        Ok(Ok(false)) => bail!("client {client_id} closed before init"),
        Ok(Err(e)) => bail!("client {client_id} error before init: {e}"),
        Err(_) => bail!("client {client_id} init timeout"),
    }

    let mut frames = tokio::time::interval(config.frame_duration());
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let test_end = Instant::now() + duration;

    while Instant::now() < test_end {
        tokio::select! {
            _ = frames.tick() => {
                if rng.gen_bool(TURN_CHANCE) {
                    let vertical = [Direction::Up, Direction::Down][rng.gen_range(0..2)];
                    let horizontal = [Direction::Left, Direction::Right][rng.gen_range(0..2)];
                    sync.key_down(vertical);
                    sync.key_down(horizontal);
                }
                if let Some(update) = sync.frame(Instant::now()) {
                    let json = serde_json::to_string(&update)?;
                    ws.send(Message::Text(json.into())).await?;
                    metrics.updates_sent.fetch_add(1, Ordering::Relaxed);
                }
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(msg) = parse_server_msg(&text) {
                            if let ServerMsg::Update { players } = &msg {
                                metrics.snapshots_received.fetch_add(1, Ordering::Relaxed);
                                metrics
                                    .max_players_seen
                                    .fetch_max(players.len() as u64, Ordering::Relaxed);
                            }
                            let changes = sync.handle_message(msg);
                            metrics
                                .proxy_changes
                                .fetch_add(changes.len() as u64, Ordering::Relaxed);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        bail!("client {client_id} closed by server")
                    }
                    Some(Err(e)) => bail!("client {client_id} error: {e}"),
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
    Ok(())
}

// === Main ===

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut num_clients: u32 = 20;
    let mut duration_secs: u64 = 30;
    let mut fps: u32 = 60;
    let mut url = "ws://127.0.0.1:8080/ws".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" => {
                i += 1;
                num_clients = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(20);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--fps" => {
                i += 1;
                fps = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(60);
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    let config = ClientConfig {
        target_fps: fps,
        ..Default::default()
    };
    config.validate().map_err(anyhow::Error::msg)?;

    println!("=== Plaza Swarm ===");
    println!("Clients: {}", num_clients);
    println!("Duration: {}s", duration_secs);
    println!("FPS: {}", fps);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::default());
    let duration = Duration::from_secs(duration_secs);

    let mut handles = Vec::with_capacity(num_clients as usize);
    for client_id in 0..num_clients {
        let url = url.clone();
        let metrics = Arc::clone(&metrics);
        handles.push(tokio::spawn(async move {
            let result = run_client(client_id, url, config, duration, Arc::clone(&metrics)).await;
            if let Err(e) = result {
                if client_id < 5 {
                    eprintln!("{e:#}");
                }
                metrics.errors.fetch_add(1, Ordering::Relaxed);
            }
        }));

        // Stagger spawns slightly to avoid thundering herd
        if client_id % 50 == 49 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    for handle in handles {
        let _ = handle.await;
    }

    println!("=== Final Results ===");
    let sent = metrics.updates_sent.load(Ordering::Relaxed);
    let snapshots = metrics.snapshots_received.load(Ordering::Relaxed);
    println!("Updates sent: {}", sent);
    println!("Snapshots received: {}", snapshots);
    println!(
        "Proxy changes applied: {}",
        metrics.proxy_changes.load(Ordering::Relaxed)
    );
    println!(
        "Most players in one snapshot: {}",
        metrics.max_players_seen.load(Ordering::Relaxed)
    );
    println!("Errors: {}", metrics.errors.load(Ordering::Relaxed));

    if sent > 0 {
        // With immediate broadcast every update fans out to every client.
        println!(
            "Snapshots per update: {:.1} (ideal {})",
            snapshots as f64 / sent as f64,
            num_clients
        );
    }
    Ok(())
}
