use crate::{
    config::RconSettings,
    error::{BoardError, BoardResult},
    rcon::{
        codec::{Packet, RconCodec, AUTH_FAILED_ID, AUTH_RESPONSE, COMMAND, LOGIN, RESPONSE},
        ScoreSession, ScoreSource,
    },
};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    time::{self, Instant},
};
use tokio_util::codec::Framed;
use tracing::debug;

// Storage holding the per-score results, and the path below it.
pub const STORAGE_NAMESPACE: &str = "syk9lib:";
pub const RESULT_PATH: &str = "scoretostorage.result";

pub fn storage_command(score_key: &str) -> String {
    format!("data get storage {STORAGE_NAMESPACE} {RESULT_PATH}.{score_key}")
}

/// Bounded TCP connect, the connection is dropped right away.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> bool {
    match time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!("Probe of {host}:{port} failed. {e}");
            false
        }
        Err(_) => {
            debug!("Probe of {host}:{port} timed out after {timeout:?}");
            false
        }
    }
}

/// Game server console reached over RCON.
#[derive(Debug, Clone)]
pub struct Rcon {
    settings: RconSettings,
}

impl Rcon {
    pub fn new(settings: RconSettings) -> Self {
        Self { settings }
    }
}

impl ScoreSource for Rcon {
    type Session = RconSession;

    async fn probe(&self) -> bool {
        probe(
            &self.settings.host,
            self.settings.port,
            self.settings.timeout(),
        )
        .await
    }

    async fn open(&self) -> BoardResult<RconSession> {
        RconSession::open(&self.settings).await
    }
}

pub struct RconSession {
    // None once closed
    framed: Option<Framed<TcpStream, RconCodec>>,
    last_id: i32,
    timeout: Duration,
    peer: String,
}

impl RconSession {
    pub async fn open(settings: &RconSettings) -> BoardResult<Self> {
        let timeout = settings.timeout();
        let peer = format!("{}:{}", settings.host, settings.port);

        let stream = time::timeout(
            timeout,
            TcpStream::connect((settings.host.as_str(), settings.port)),
        )
        .await
        .map_err(|_| BoardError::Unreachable(format!("{peer}: connect timed out")))?
        .map_err(|e| BoardError::Unreachable(format!("{peer}: {e}")))?;

        let mut session = RconSession {
            framed: Some(Framed::new(stream, RconCodec)),
            last_id: 0,
            timeout,
            peer,
        };
        session.login(&settings.password).await?;
        debug!("Opened RCON session to {}", session.peer);
        Ok(session)
    }

    async fn login(&mut self, password: &str) -> BoardResult<()> {
        let deadline = Instant::now() + self.timeout;
        let id = self.next_id();
        self.send(Packet::new(id, LOGIN, password), deadline).await?;

        // Some servers push an empty RESPONSE ahead of the auth reply.
        loop {
            let reply = self.recv(deadline).await?;
            match (reply.kind, reply.id) {
                (AUTH_RESPONSE, AUTH_FAILED_ID) => return Err(BoardError::Auth),
                (AUTH_RESPONSE, reply_id) if reply_id == id => return Ok(()),
                _ => continue,
            }
        }
    }

    /// Runs one console command and returns its whole textual reply.
    ///
    /// Replies longer than one packet arrive in several fragments sharing the
    /// command id. Once the first fragment is in, a RESPONSE packet is sent:
    /// the server handles packets in order, so its echo marks the end of the
    /// reply. Some servers drop a connection when a single read holds more
    /// than one packet, so the marker never goes out along with the command.
    ///
    /// The whole exchange is bounded by the session timeout.
    pub async fn command(&mut self, command: &str) -> BoardResult<String> {
        let deadline = Instant::now() + self.timeout;
        let id = self.next_id();
        self.send(Packet::new(id, COMMAND, command), deadline).await?;

        let mut reply = String::new();
        let mut sentinel = None;
        loop {
            let packet = self.recv(deadline).await?;
            match packet.id {
                packet_id if packet_id == id => {
                    reply.push_str(&packet.payload);
                    if sentinel.is_none() {
                        let marker = self.next_id();
                        self.send(Packet::new(marker, RESPONSE, ""), deadline).await?;
                        sentinel = Some(marker);
                    }
                }
                packet_id if Some(packet_id) == sentinel => break,
                AUTH_FAILED_ID => return Err(BoardError::Auth),
                other => debug!("Ignoring stray packet {other} from {}", self.peer),
            }
        }
        debug!("'{command}' -> {} bytes", reply.len());
        Ok(reply)
    }

    pub fn is_open(&self) -> bool {
        self.framed.is_some()
    }

    fn next_id(&mut self) -> i32 {
        self.last_id = match self.last_id {
            i32::MAX => 1,
            id => id + 1,
        };
        self.last_id
    }

    async fn send(&mut self, packet: Packet, deadline: Instant) -> BoardResult<()> {
        let framed = self.framed_mut()?;
        time::timeout_at(deadline, framed.send(packet))
            .await
            .map_err(|_| BoardError::Protocol("timed out sending packet".to_string()))?
    }

    async fn recv(&mut self, deadline: Instant) -> BoardResult<Packet> {
        let timeout = self.timeout;
        let framed = self.framed_mut()?;
        match time::timeout_at(deadline, framed.next()).await {
            Ok(Some(packet)) => packet,
            Ok(None) => Err(BoardError::Protocol(
                "connection closed by server".to_string(),
            )),
            Err(_) => Err(BoardError::Protocol(format!(
                "no complete reply within {timeout:?}"
            ))),
        }
    }

    fn framed_mut(&mut self) -> BoardResult<&mut Framed<TcpStream, RconCodec>> {
        self.framed
            .as_mut()
            .ok_or_else(|| BoardError::Protocol("session already closed".to_string()))
    }
}

impl ScoreSession for RconSession {
    async fn fetch_raw(&mut self, score_key: &str) -> BoardResult<String> {
        self.command(&storage_command(score_key)).await
    }

    async fn close(&mut self) {
        if let Some(mut framed) = self.framed.take() {
            if let Err(e) = framed.get_mut().shutdown().await {
                debug!("Error shutting down RCON session to {}. {e}", self.peer);
            }
            debug!("Closed RCON session to {}", self.peer);
        }
    }
}

// Dropping the socket releases the connection on paths that never reached
// `close`, e.g. a cancelled refresh.
impl Drop for RconSession {
    fn drop(&mut self) {
        if self.framed.take().is_some() {
            debug!("RCON session to {} dropped without close", self.peer);
        }
    }
}
