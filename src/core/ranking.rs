use crate::{
    config::ScoreDefinition,
    core::{
        dump::{StorageDump, StorageSlot},
        values::{coerce_value, format_value},
    },
    rcon::{ScoreSession, ScoreSource},
    storage::MemoryCache,
};
use chrono::Utc;
use itertools::Itertools;
use serde::{
    ser::{SerializeMap, Serializer},
    Serialize,
};
use std::ops::Deref;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingItem {
    pub player: String,
    pub value: i64,
    pub display_value: String,
}

type TitledRankings = Vec<(String, Vec<RankingItem>)>;

/// Ranking lists keyed by score title, in configured score order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rankings(TitledRankings);

impl Rankings {
    pub fn get(&self, title: &str) -> Option<&[RankingItem]> {
        self.iter()
            .find(|(t, _)| t == title)
            .map(|(_, items)| items.as_slice())
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(title, _)| title.as_str())
    }

    fn push(&mut self, title: &str, items: Vec<RankingItem>) {
        self.0.push((title.to_string(), items));
    }
}

impl From<TitledRankings> for Rankings {
    fn from(rankings: TitledRankings) -> Self {
        Rankings(rankings)
    }
}

impl Deref for Rankings {
    type Target = TitledRankings;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Serialize for Rankings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (title, items) in self.iter() {
            map.serialize_entry(title, items)?;
        }
        map.end()
    }
}

/// Flattens every slot into ranking items and orders them by value.
///
/// Descending unless the score asks for ascending order. The sort is stable,
/// equal values keep their order of appearance in the dump.
pub fn rank_slots(slots: &[StorageSlot], score: &ScoreDefinition) -> Vec<RankingItem> {
    slots
        .iter()
        .flat_map(|slot| slot.iter())
        .map(|(player, raw)| {
            let value = coerce_value(raw);
            RankingItem {
                player: player.clone(),
                value,
                display_value: format_value(value, score.is_duration),
            }
        })
        .sorted_by(|a, b| match score.sort_ascending {
            true => a.value.cmp(&b.value),
            false => b.value.cmp(&a.value),
        })
        .collect()
}

/// Drives a refresh cycle: probe, one session for all scores, parse, rank,
/// and fall back to the last good dump of a score whenever live data is
/// missing.
pub struct RankingAggregator<S: ScoreSource> {
    source: S,
    cache: MemoryCache,
    scores: Vec<ScoreDefinition>,
}

impl<S: ScoreSource> RankingAggregator<S> {
    pub fn new(source: S, cache: MemoryCache, scores: Vec<ScoreDefinition>) -> Self {
        Self {
            source,
            cache,
            scores,
        }
    }

    /// Never fails: every score degrades on its own to cached or empty data.
    pub async fn get_rankings(&self) -> Rankings {
        let mut session = self.connect().await;

        let mut rankings = Rankings::default();
        for score in self.scores.iter() {
            let slots = self.slots_for(score, session.as_mut()).await;
            rankings.push(&score.title, rank_slots(&slots, score));
        }

        // Paths that never get here drop the session, which frees the socket.
        if let Some(session) = session.as_mut() {
            session.close().await;
        }

        info!(
            "Rankings refreshed for {} score(s), {} cached.",
            rankings.len(),
            self.cache.len()
        );
        rankings
    }

    async fn connect(&self) -> Option<S::Session> {
        if !self.source.probe().await {
            warn!("Score source unreachable, serving cached rankings.");
            return None;
        }

        match self.source.open().await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Could not open a session, serving cached rankings. {e}");
                None
            }
        }
    }

    async fn slots_for(
        &self,
        score: &ScoreDefinition,
        session: Option<&mut S::Session>,
    ) -> Vec<StorageSlot> {
        if let Some(session) = session {
            let fetched = session
                .fetch_raw(&score.key)
                .await
                .and_then(|raw| StorageDump::try_parse(&raw));

            match fetched {
                Ok(slots) if !slots.is_empty() => {
                    debug!("Fetched {} slot(s) for '{}'", slots.len(), score.key);
                    self.cache.put(&score.key, slots.clone());
                    return slots;
                }
                Ok(_) => info!("No entries for '{}'", score.key),
                Err(e) => warn!("Could not refresh '{}'. {e}", score.key),
            }
        }

        match self.cache.entry(&score.key) {
            Some(entry) => {
                info!(
                    "Using cached '{}', {}s old",
                    score.key,
                    entry.age(Utc::now()).num_seconds()
                );
                entry.slots
            }
            None => {
                debug!("Nothing cached for '{}', ranking is empty", score.key);
                vec![]
            }
        }
    }
}
