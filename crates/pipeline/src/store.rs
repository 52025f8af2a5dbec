//! Process-wide registry of detection sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lifeguard_core::types::{SessionId, Timestamp};
use tokio::sync::RwLock;

use crate::session::DetectionSession;

pub const DEFAULT_CAPACITY: usize = 256;
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_MAX_PROCESSING: Duration = Duration::from_secs(7200);

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of sessions held at once.
    pub capacity: usize,
    /// How long a finished session stays queryable.
    pub ttl: Duration,
    /// Age after which a still-processing session is cancelled and dropped.
    pub max_processing: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl: DEFAULT_TTL,
            max_processing: DEFAULT_MAX_PROCESSING,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Session {0} already exists")]
    Duplicate(SessionId),

    #[error("Too many active sessions (limit {0})")]
    AtCapacity(usize),
}

/// Sessions keyed by id.
///
/// Inserting into a full store evicts the oldest finished session. If every
/// session is still processing the insert is refused.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<DetectionSession>>>,
    config: StoreConfig,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl SessionStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Register a new session under a fresh random id.
    pub async fn create(&self) -> Result<Arc<DetectionSession>, StoreError> {
        self.create_with_id(uuid::Uuid::new_v4()).await
    }

    pub async fn create_with_id(&self, id: SessionId) -> Result<Arc<DetectionSession>, StoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }
        if sessions.len() >= self.config.capacity {
            evict_oldest_finished(&mut sessions).await?;
        }

        let session = Arc::new(DetectionSession::new(id));
        sessions.insert(id, Arc::clone(&session));
        tracing::debug!(session_id = %id, total = sessions.len(), "Session registered");
        Ok(session)
    }

    pub async fn get(&self, id: &SessionId) -> Option<Arc<DetectionSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Drop a session, cancelling its processing if still running.
    pub async fn remove(&self, id: &SessionId) -> Option<Arc<DetectionSession>> {
        let removed = self.sessions.write().await.remove(id);
        if let Some(session) = &removed {
            session.cancel();
            tracing::debug!(session_id = %id, "Session removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Number of sessions still processing.
    pub async fn active_count(&self) -> usize {
        let sessions: Vec<Arc<DetectionSession>> =
            self.sessions.read().await.values().cloned().collect();
        let mut active = 0;
        for session in sessions {
            if !session.status().await.is_terminal() {
                active += 1;
            }
        }
        active
    }

    /// Remove finished sessions older than the TTL and processing sessions
    /// older than the processing limit. Returns how many were removed.
    pub async fn sweep_expired(&self, now: Timestamp) -> usize {
        let snapshot: Vec<Arc<DetectionSession>> =
            self.sessions.read().await.values().cloned().collect();

        let mut expired = Vec::new();
        for session in snapshot {
            let state = session.state().await;
            let is_expired = match state.finished_at {
                Some(finished) => age(now, finished) >= self.config.ttl,
                None => age(now, session.created_at()) >= self.config.max_processing,
            };
            if is_expired {
                expired.push(session.id());
            }
        }

        let mut removed = 0;
        for id in expired {
            if self.remove(&id).await.is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Cancel every session that is still processing.
    pub async fn cancel_all(&self) {
        for session in self.sessions.read().await.values() {
            session.cancel();
        }
    }
}

async fn evict_oldest_finished(
    sessions: &mut HashMap<SessionId, Arc<DetectionSession>>,
) -> Result<(), StoreError> {
    let mut oldest: Option<(SessionId, Timestamp)> = None;
    for (id, session) in sessions.iter() {
        let Some(finished) = session.finished_at().await else {
            continue;
        };
        if oldest.map_or(true, |(_, t)| finished < t) {
            oldest = Some((*id, finished));
        }
    }

    match oldest {
        Some((id, _)) => {
            sessions.remove(&id);
            tracing::debug!(session_id = %id, "Evicted finished session to make room");
            Ok(())
        }
        None => Err(StoreError::AtCapacity(sessions.len())),
    }
}

fn age(now: Timestamp, since: Timestamp) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
