//! Process-wide table of live sessions
//!
//! Lifecycle per id: `create` (Initializing) -> `register` (Active) ->
//! `remove` (Closed). The most recent closed ids are tombstoned: they are
//! never issued again, cannot be re-registered, and every lookup reports
//! `NotFound`. Older tombstones are evicted first-in first-out.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

use super::id::SessionId;

/// Closed ids remembered for `Closed` reporting and re-registration checks
const RETIRED_CAPACITY: usize = 4096;

/// Session registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Session already closed: {0}")]
    Closed(SessionId),

    #[error("Session registry lock poisoned")]
    Poisoned,
}

/// Wire mechanism a session was opened on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Single multiplexed endpoint with a session header
    StreamableHttp,
    /// Long-lived event stream plus side-channel POSTs
    LegacySse,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StreamableHttp => "streamable-http",
            Self::LegacySse => "sse",
        })
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Initializing,
    Active,
    Closed,
}

/// Bookkeeping for one session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub kind: TransportKind,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

struct Entry<H> {
    info: SessionInfo,
    handle: Option<H>,
}

struct Inner<H> {
    sessions: HashMap<SessionId, Entry<H>>,
    retired: HashSet<SessionId>,
    retired_order: VecDeque<SessionId>,
}

impl<H> Inner<H> {
    fn retire(&mut self, id: &SessionId) {
        if !self.retired.insert(id.clone()) {
            return;
        }
        self.retired_order.push_back(id.clone());
        while self.retired_order.len() > RETIRED_CAPACITY {
            if let Some(oldest) = self.retired_order.pop_front() {
                self.retired.remove(&oldest);
            }
        }
    }
}

/// Registry of sessions keyed by id, generic over the per-session handle
pub struct SessionRegistry<H> {
    inner: Mutex<Inner<H>>,
}

impl<H: Clone> SessionRegistry<H> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                retired: HashSet::new(),
                retired_order: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<H>>, SessionError> {
        self.inner.lock().map_err(|_| SessionError::Poisoned)
    }

    /// Allocate a new id, unique across live and closed sessions
    pub fn create(&self, kind: TransportKind) -> Result<SessionId, SessionError> {
        let mut inner = self.lock()?;

        let id = loop {
            let candidate = SessionId::generate();
            if !inner.sessions.contains_key(&candidate) && !inner.retired.contains(&candidate) {
                break candidate;
            }
        };

        let now = Utc::now();
        inner.sessions.insert(
            id.clone(),
            Entry {
                info: SessionInfo {
                    id: id.clone(),
                    kind,
                    state: SessionState::Initializing,
                    created_at: now,
                    last_activity: now,
                },
                handle: None,
            },
        );

        debug!("Session {} created ({})", id, kind);
        Ok(id)
    }

    /// Bind a handle to a created session, making it Active
    ///
    /// Registering again replaces the handle in place.
    pub fn register(&self, id: &SessionId, handle: H) -> Result<(), SessionError> {
        let mut inner = self.lock()?;

        if inner.retired.contains(id) {
            return Err(SessionError::Closed(id.clone()));
        }

        let entry = inner
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;

        entry.handle = Some(handle);
        entry.info.state = SessionState::Active;
        entry.info.last_activity = Utc::now();

        debug!("Session {} active", id);
        Ok(())
    }

    /// Look up the handle of an Active session and mark it as used
    pub fn get(&self, id: &SessionId) -> Result<H, SessionError> {
        let mut inner = self.lock()?;

        match inner.sessions.get_mut(id) {
            Some(Entry {
                info,
                handle: Some(handle),
            }) => {
                info.last_activity = Utc::now();
                Ok(handle.clone())
            }
            _ => Err(SessionError::NotFound(id.clone())),
        }
    }

    /// Bookkeeping for a live session
    pub fn info(&self, id: &SessionId) -> Result<SessionInfo, SessionError> {
        let inner = self.lock()?;
        inner
            .sessions
            .get(id)
            .map(|entry| entry.info.clone())
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    /// Whether the id names a live session
    pub fn contains(&self, id: &SessionId) -> bool {
        self.lock()
            .map(|inner| inner.sessions.contains_key(id))
            .unwrap_or(false)
    }

    /// Close a session, returning its handle if it had one
    ///
    /// Unknown or already-closed ids are a no-op.
    pub fn remove(&self, id: &SessionId) -> Result<Option<H>, SessionError> {
        let mut inner = self.lock()?;

        let Some(entry) = inner.sessions.remove(id) else {
            return Ok(None);
        };
        inner.retire(id);

        debug!(
            "Session {} closed (was {:?})",
            id,
            entry.info.state
        );
        Ok(entry.handle)
    }

    /// Live sessions of one kind whose last activity is before `cutoff`
    pub fn idle_since(
        &self,
        kind: TransportKind,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<SessionId>, SessionError> {
        let inner = self.lock()?;
        Ok(inner
            .sessions
            .values()
            .filter(|entry| entry.info.kind == kind && entry.info.last_activity < cutoff)
            .map(|entry| entry.info.id.clone())
            .collect())
    }

    /// Ids of every live session
    pub fn ids(&self) -> Vec<SessionId> {
        self.lock()
            .map(|inner| inner.sessions.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live sessions (Initializing or Active)
    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.sessions.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current state of an id, `Closed` for tombstoned ids
    pub fn state(&self, id: &SessionId) -> Option<SessionState> {
        let inner = self.lock().ok()?;
        if inner.retired.contains(id) {
            return Some(SessionState::Closed);
        }
        inner.sessions.get(id).map(|entry| entry.info.state)
    }
}

impl<H: Clone> Default for SessionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_lifecycle() {
        let registry: SessionRegistry<u32> = SessionRegistry::new();

        let id = registry.create(TransportKind::StreamableHttp).unwrap();
        assert_eq!(registry.state(&id), Some(SessionState::Initializing));
        assert_eq!(registry.get(&id), Err(SessionError::NotFound(id.clone())));
        assert_eq!(registry.len(), 1);

        registry.register(&id, 7).unwrap();
        assert_eq!(registry.state(&id), Some(SessionState::Active));
        assert_eq!(registry.get(&id), Ok(7));

        assert_eq!(registry.remove(&id), Ok(Some(7)));
        assert_eq!(registry.state(&id), Some(SessionState::Closed));
        assert_eq!(registry.get(&id), Err(SessionError::NotFound(id.clone())));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_replaces_handle() {
        let registry = SessionRegistry::new();
        let id = registry.create(TransportKind::LegacySse).unwrap();

        registry.register(&id, "first").unwrap();
        registry.register(&id, "second").unwrap();

        assert_eq!(registry.get(&id), Ok("second"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_closed_id_cannot_be_registered() {
        let registry = SessionRegistry::new();
        let id = registry.create(TransportKind::LegacySse).unwrap();
        registry.register(&id, 1).unwrap();
        registry.remove(&id).unwrap();

        assert_eq!(registry.register(&id, 2), Err(SessionError::Closed(id.clone())));
        assert!(!registry.contains(&id));
    }

    #[test]
    fn test_tombstones_are_bounded() {
        let registry = SessionRegistry::new();
        let mut closed = Vec::new();
        for i in 0..RETIRED_CAPACITY + 100 {
            let id = registry.create(TransportKind::LegacySse).unwrap();
            registry.register(&id, i).unwrap();
            registry.remove(&id).unwrap();
            closed.push(id);
        }

        {
            let inner = registry.inner.lock().unwrap();
            assert_eq!(inner.retired.len(), RETIRED_CAPACITY);
            assert_eq!(inner.retired_order.len(), RETIRED_CAPACITY);
        }
        assert!(registry.is_empty());

        // Oldest evicted, newest still reported closed
        assert_eq!(registry.state(&closed[0]), None);
        let newest = closed.last().unwrap();
        assert_eq!(registry.state(newest), Some(SessionState::Closed));
        assert_eq!(registry.register(newest, 0), Err(SessionError::Closed(newest.clone())));
    }

    #[test]
    fn test_register_unknown_id() {
        let registry = SessionRegistry::new();
        let id = SessionId::from("never-created");
        assert_eq!(registry.register(&id, 1), Err(SessionError::NotFound(id)));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let registry: SessionRegistry<u32> = SessionRegistry::new();
        assert_eq!(registry.remove(&SessionId::from("missing")), Ok(None));
        assert_eq!(registry.state(&SessionId::from("missing")), None);
    }

    #[test]
    fn test_ids_unique_across_kinds() {
        let registry: SessionRegistry<u32> = SessionRegistry::new();
        let ids: HashSet<_> = (0..100)
            .map(|i| {
                let kind = if i % 2 == 0 {
                    TransportKind::StreamableHttp
                } else {
                    TransportKind::LegacySse
                };
                registry.create(kind).unwrap()
            })
            .collect();
        assert_eq!(ids.len(), 100);
        assert_eq!(registry.len(), 100);
        assert_eq!(registry.ids().len(), 100);
    }

    #[test]
    fn test_idle_since_filters_by_kind() {
        let registry = SessionRegistry::new();
        let streamable = registry.create(TransportKind::StreamableHttp).unwrap();
        let legacy = registry.create(TransportKind::LegacySse).unwrap();
        registry.register(&streamable, 1).unwrap();
        registry.register(&legacy, 2).unwrap();

        let future = Utc::now() + Duration::seconds(60);
        assert_eq!(
            registry.idle_since(TransportKind::StreamableHttp, future),
            Ok(vec![streamable.clone()])
        );

        let past = Utc::now() - Duration::seconds(60);
        assert!(registry
            .idle_since(TransportKind::StreamableHttp, past)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_get_touches_last_activity() {
        let registry = SessionRegistry::new();
        let id = registry.create(TransportKind::StreamableHttp).unwrap();
        registry.register(&id, 1).unwrap();
        let before = registry.info(&id).unwrap().last_activity;

        std::thread::sleep(std::time::Duration::from_millis(5));
        registry.get(&id).unwrap();

        assert!(registry.info(&id).unwrap().last_activity > before);
        assert_eq!(registry.info(&id).unwrap().kind, TransportKind::StreamableHttp);
    }
}
