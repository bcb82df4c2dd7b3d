//! Session-scoped ephemeral knowledge store.
//!
//! Holds embedded chunks of user-supplied URL content, keyed by session id.
//! Nothing here is durable: entries expire after a TTL and the whole store
//! lives in process memory.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::embeddings::cosine_similarity;
use crate::types::{Origin, RetrievedItem};

#[derive(Debug, Clone)]
pub struct EphemeralChunk {
    pub content: String,
    pub source_url: String,
    pub embedding: Vec<f32>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SessionData {
    chunks: Vec<EphemeralChunk>,
    urls: Vec<String>,
}

pub struct EphemeralStore {
    sessions: DashMap<String, SessionData>,
    ttl: Duration,
}

impl EphemeralStore {
    pub fn new(expire_hours: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::hours(expire_hours),
        }
    }

    /// Record embedded chunks for a session. The session entry is created
    /// lazily on first write.
    pub fn add_chunks(
        &self,
        session_id: &str,
        source_url: &str,
        chunks: Vec<(String, Vec<f32>)>,
    ) {
        let expires_at = Utc::now() + self.ttl;
        let mut session = self.sessions.entry(session_id.to_string()).or_default();
        for (content, embedding) in chunks {
            session.chunks.push(EphemeralChunk {
                content,
                source_url: source_url.to_string(),
                embedding,
                expires_at,
            });
        }
        if !session.urls.iter().any(|u| u == source_url) {
            session.urls.push(source_url.to_string());
        }
    }

    /// Cheap check used by the retrieval adapter to skip embedding the query
    /// when the session has nothing stored.
    pub fn has_data(&self, session_id: &str) -> bool {
        let now = Utc::now();
        self.sessions
            .get(session_id)
            .map(|s| s.chunks.iter().any(|c| c.expires_at > now))
            .unwrap_or(false)
    }

    /// Whether this session already ingested `url` (skip re-fetching).
    pub fn has_url(&self, session_id: &str, url: &str) -> bool {
        self.sessions
            .get(session_id)
            .map(|s| s.urls.iter().any(|u| u == url))
            .unwrap_or(false)
    }

    /// Rank the session's live chunks by cosine similarity to the query
    /// embedding. Similarity is clamped at zero so scores stay comparable
    /// with the other adapters' [0, 1] ranges.
    pub fn query(&self, session_id: &str, embedding: &[f32], n_results: usize) -> Vec<RetrievedItem> {
        let now = Utc::now();
        let Some(session) = self.sessions.get(session_id) else {
            return Vec::new();
        };

        let mut scored: Vec<(f32, &EphemeralChunk)> = session
            .chunks
            .iter()
            .filter(|c| c.expires_at > now)
            .map(|c| (cosine_similarity(embedding, &c.embedding).max(0.0), c))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(n_results);

        scored
            .into_iter()
            .map(|(score, chunk)| {
                RetrievedItem::new(&chunk.content, Origin::Ephemeral, &chunk.source_url)
                    .with_score(score)
            })
            .collect()
    }

    /// Drop expired chunks and any sessions left empty. Returns the number
    /// of chunks removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        for mut entry in self.sessions.iter_mut() {
            let before = entry.chunks.len();
            entry.chunks.retain(|c| c.expires_at > now);
            removed += before - entry.chunks.len();
        }
        self.sessions.retain(|_, s| !s.chunks.is_empty());
        removed
    }

    /// Forget everything a session stored.
    pub fn remove_session(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
