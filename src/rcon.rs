pub mod client;
pub mod codec;

use crate::error::BoardResult;
use std::future::Future;

/// Where score dumps come from: a cheap reachability check and a way to
/// open a session.
pub trait ScoreSource {
    type Session: ScoreSession + Send;

    fn probe(&self) -> impl Future<Output = bool> + Send;

    fn open(&self) -> impl Future<Output = BoardResult<Self::Session>> + Send;
}

/// One open connection. `close` must be safe to call more than once.
pub trait ScoreSession {
    fn fetch_raw(&mut self, score_key: &str) -> impl Future<Output = BoardResult<String>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
