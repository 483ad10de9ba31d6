//! End-to-end refresh cycles against an in-process RCON server.

use futures::{SinkExt, StreamExt};
use scoreboard_ranker::config::{RconSettings, ScoreDefinition, Timeout};
use scoreboard_ranker::core::dump::StorageDump;
use scoreboard_ranker::core::ranking::{RankingAggregator, RankingItem};
use scoreboard_ranker::error::BoardError;
use scoreboard_ranker::rcon::client::{storage_command, Rcon, RconSession};
use scoreboard_ranker::rcon::codec::{
    Packet, RconCodec, AUTH_FAILED_ID, AUTH_RESPONSE, COMMAND, LOGIN, RESPONSE,
};
use scoreboard_ranker::rcon::ScoreSession;
use scoreboard_ranker::storage::MemoryCache;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{self, sleep};
use tokio_util::codec::Framed;

const PASSWORD: &str = "hunter2";
// Replies are cut in small fragments to exercise reassembly.
const FRAGMENT_LEN: usize = 16;
// Packet id the fake servers use for unsolicited packets.
const STRAY_ID: i32 = 999;

struct FakeServer {
    port: u16,
    handle: JoinHandle<()>,
    // Logged-in connections that have been closed by the client.
    closed_sessions: Arc<AtomicUsize>,
}

async fn spawn_server(dumps: &[(&str, &str)]) -> FakeServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let dumps: Arc<HashMap<String, String>> = Arc::new(
        dumps
            .iter()
            .map(|(key, dump)| (storage_command(key), dump.to_string()))
            .collect(),
    );
    let closed_sessions = Arc::new(AtomicUsize::new(0));

    let closed = closed_sessions.clone();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let dumps = dumps.clone();
            let closed = closed.clone();
            tokio::spawn(async move {
                if serve(stream, &dumps).await {
                    closed.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    FakeServer {
        port,
        handle,
        closed_sessions,
    }
}

// Returns whether the client logged in before hanging up.
async fn serve(stream: TcpStream, dumps: &HashMap<String, String>) -> bool {
    let mut framed = Framed::new(stream, RconCodec);
    let mut logged_in = false;

    while let Some(Ok(packet)) = framed.next().await {
        let replies = match packet.kind {
            LOGIN if packet.payload == PASSWORD => {
                logged_in = true;
                vec![
                    Packet::new(packet.id, RESPONSE, ""),
                    Packet::new(packet.id, AUTH_RESPONSE, ""),
                ]
            }
            LOGIN => vec![Packet::new(AUTH_FAILED_ID, AUTH_RESPONSE, "")],
            COMMAND => {
                // Like the game server, hang up on a client that writes its
                // next packet before the command was answered.
                if time::timeout(Duration::from_millis(50), framed.next())
                    .await
                    .is_ok()
                {
                    return logged_in;
                }
                let reply = dumps
                    .get(&packet.payload)
                    .cloned()
                    .unwrap_or_else(|| "Unknown or incomplete command".to_string());
                reply
                    .as_bytes()
                    .chunks(FRAGMENT_LEN)
                    .map(|chunk| Packet::new(packet.id, RESPONSE, &String::from_utf8_lossy(chunk)))
                    .collect()
            }
            _ => vec![Packet::new(packet.id, RESPONSE, "Unknown request 0")],
        };

        for reply in replies {
            if framed.send(reply).await.is_err() {
                return logged_in;
            }
        }
    }
    logged_in
}

// Answers the login (or not) and then only ever sends stray packets.
async fn spawn_chatty_server(answer_login: bool) -> FakeServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let closed_sessions = Arc::new(AtomicUsize::new(0));

    let closed = closed_sessions.clone();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let closed = closed.clone();
            tokio::spawn(async move {
                if chatter(stream, answer_login).await {
                    closed.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    FakeServer {
        port,
        handle,
        closed_sessions,
    }
}

async fn chatter(stream: TcpStream, answer_login: bool) -> bool {
    let mut framed = Framed::new(stream, RconCodec);
    let mut logged_in = false;
    let mut ticker = time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            packet = framed.next() => match packet {
                Some(Ok(packet)) if packet.kind == LOGIN && answer_login => {
                    logged_in = true;
                    let reply = Packet::new(packet.id, AUTH_RESPONSE, "");
                    if framed.send(reply).await.is_err() {
                        break;
                    }
                }
                Some(Ok(_)) => {}
                _ => break,
            },
            _ = ticker.tick() => {
                if framed.send(Packet::new(STRAY_ID, RESPONSE, "")).await.is_err() {
                    break;
                }
            }
        }
    }
    logged_in
}

fn settings(port: u16, password: &str) -> RconSettings {
    RconSettings {
        host: "127.0.0.1".to_string(),
        port,
        password: password.to_string(),
        timeout: Timeout::from_secs(1),
    }
}

fn score(key: &str, title: &str) -> ScoreDefinition {
    ScoreDefinition {
        key: key.to_string(),
        title: title.to_string(),
        is_duration: false,
        sort_ascending: false,
    }
}

fn item(player: &str, value: i64, display_value: &str) -> RankingItem {
    RankingItem {
        player: player.to_string(),
        value,
        display_value: display_value.to_string(),
    }
}

async fn wait_for(counter: &AtomicUsize, expected: usize) {
    for _ in 0..50 {
        if counter.load(Ordering::SeqCst) == expected {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(counter.load(Ordering::SeqCst), expected);
}

#[tokio::test]
async fn session_reassembles_fragmented_replies() {
    let dump = "Storage syk9lib: has the following contents: [{steve:100,alex:150,notch:200}]";
    let server = spawn_server(&[("kills", dump)]).await;

    let mut session = RconSession::open(&settings(server.port, PASSWORD))
        .await
        .unwrap();
    assert_eq!(session.fetch_raw("kills").await.unwrap(), dump);
    assert_eq!(
        session.fetch_raw("deaths").await.unwrap(),
        "Unknown or incomplete command"
    );

    session.close().await;
    session.close().await;
    assert!(!session.is_open());
    assert!(session.fetch_raw("kills").await.is_err());
    wait_for(&server.closed_sessions, 1).await;
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let server = spawn_server(&[]).await;

    let result = RconSession::open(&settings(server.port, "nope")).await;
    assert!(matches!(result, Err(BoardError::Auth)));
}

#[tokio::test]
async fn rankings_survive_server_going_away() {
    let server = spawn_server(&[
        ("kills", "Storage syk9lib: has the following contents: [{steve:100,alex:150}]"),
        ("time", "[{steve:2450}]"),
    ])
    .await;
    let cache = MemoryCache::new();
    let mut speedrun = score("time", "Fastest");
    speedrun.is_duration = true;

    let aggregator = RankingAggregator::new(
        Rcon::new(settings(server.port, PASSWORD)),
        cache.clone(),
        vec![score("kills", "Kills"), speedrun],
    );

    let live = aggregator.get_rankings().await;
    assert_eq!(
        live.get("Kills").unwrap(),
        &[item("alex", 150, "150"), item("steve", 100, "100")]
    );
    assert_eq!(
        live.get("Fastest").unwrap(),
        &[item("steve", 2450, "0:02:02.50")]
    );
    wait_for(&server.closed_sessions, 1).await;

    server.handle.abort();
    let _ = server.handle.await;

    let stale = aggregator.get_rankings().await;
    assert_eq!(live, stale);
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn silent_server_does_not_block_refresh() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    // Accepts connections and never answers.
    let _handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let cache = MemoryCache::new();
    cache.put("kills", StorageDump::parse("[{steve:7}]"));
    let aggregator = RankingAggregator::new(
        Rcon::new(settings(port, PASSWORD)),
        cache,
        vec![score("kills", "Kills"), score("deaths", "Deaths")],
    );

    let started = Instant::now();
    let rankings = aggregator.get_rankings().await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(rankings.get("Kills").unwrap(), &[item("steve", 7, "7")]);
    assert!(rankings.get("Deaths").unwrap().is_empty());
}

#[tokio::test]
async fn stray_packets_do_not_stall_login() {
    let server = spawn_chatty_server(false).await;

    let started = Instant::now();
    let result = time::timeout(
        Duration::from_secs(5),
        RconSession::open(&settings(server.port, PASSWORD)),
    )
    .await
    .expect("login kept waiting past its timeout");

    assert!(matches!(result, Err(BoardError::Protocol(_))));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn stray_packets_do_not_stall_refresh() {
    let server = spawn_chatty_server(true).await;
    let cache = MemoryCache::new();
    cache.put("kills", StorageDump::parse("[{steve:7}]"));
    let aggregator = RankingAggregator::new(
        Rcon::new(settings(server.port, PASSWORD)),
        cache,
        vec![score("kills", "Kills")],
    );

    let started = Instant::now();
    let rankings = time::timeout(Duration::from_secs(5), aggregator.get_rankings())
        .await
        .expect("refresh kept waiting past its timeout");

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(rankings.get("Kills").unwrap(), &[item("steve", 7, "7")]);
    wait_for(&server.closed_sessions, 1).await;
}

#[tokio::test]
async fn cancelled_refresh_releases_connection() {
    let server = spawn_chatty_server(true).await;
    let aggregator = RankingAggregator::new(
        Rcon::new(settings(server.port, PASSWORD)),
        MemoryCache::new(),
        vec![score("kills", "Kills")],
    );

    // The command is never answered, so the fetch is still in flight.
    let cancelled = time::timeout(Duration::from_millis(300), aggregator.get_rankings()).await;
    assert!(cancelled.is_err());

    wait_for(&server.closed_sessions, 1).await;
}
