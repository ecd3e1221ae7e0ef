//! Session records keyed by id.
//!
//! The backing map is injectable so a host can share it or pre-seed it.
//! Records live for the life of the process unless a TTL is set, in which
//! case a record not updated within the TTL reads as absent.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub type SessionMap = Arc<RwLock<HashMap<String, SessionRecord>>>;

#[derive(Clone, Default)]
pub struct SessionStore {
    map: SessionMap,
    ttl: Option<Duration>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(map: SessionMap) -> Self {
        Self { map, ttl: None }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Create or replace a record.
    ///
    /// A missing or blank `id` gets a fresh one. An existing live record
    /// keeps its original `created_at`; otherwise `created_at` is the given
    /// value or now.
    pub fn upsert(
        &self,
        id: Option<String>,
        created_at: Option<DateTime<Utc>>,
        payload: Value,
    ) -> SessionRecord {
        let id = id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let now = Utc::now();

        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        let existing = map
            .get(&id)
            .filter(|r| !self.is_expired(r, now))
            .map(|r| r.created_at);
        let record = SessionRecord {
            created_at: existing.or(created_at).unwrap_or(now),
            updated_at: now,
            id: id.clone(),
            payload,
        };
        map.insert(id, record.clone());
        debug!(session_id = %record.id, updated = existing.is_some(), "session stored");
        record
    }

    pub fn get(&self, id: &str) -> Option<SessionRecord> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        map.get(id)
            .filter(|r| !self.is_expired(r, Utc::now()))
            .cloned()
    }

    /// Drop expired records. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        let before = map.len();
        map.retain(|_, r| !self.is_expired(r, now));
        before - map.len()
    }

    fn is_expired(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        (now - record.updated_at)
            .to_std()
            .is_ok_and(|age| age > ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;

    #[test]
    fn upsert_without_id_generates_one() {
        let store = SessionStore::new();
        let a = store.upsert(None, None, json!({"step": 1}));
        let b = store.upsert(Some("  ".into()), None, json!({"step": 1}));
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
        assert_eq!(store.get(&a.id), Some(a));
    }

    #[test]
    fn existing_id_keeps_created_at() {
        let store = SessionStore::new();
        let first = store.upsert(Some("s1".into()), None, json!({"step": 1}));
        let earlier = first.created_at - TimeDelta::days(3);
        let second = store.upsert(Some("s1".into()), Some(earlier), json!({"step": 2}));
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.payload, json!({"step": 2}));
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn new_id_takes_supplied_created_at() {
        let store = SessionStore::new();
        let at = Utc::now() - TimeDelta::hours(2);
        let record = store.upsert(Some("s1".into()), Some(at), Value::Null);
        assert_eq!(record.created_at, at);
    }

    #[test]
    fn injected_map_is_shared() {
        let map = SessionMap::default();
        let store = SessionStore::with_map(map.clone());
        store.upsert(Some("s1".into()), None, Value::Null);
        assert!(map.read().unwrap().contains_key("s1"));
    }

    #[test]
    fn stale_records_expire_under_ttl() {
        let map = SessionMap::default();
        let stale = Utc::now() - TimeDelta::minutes(10);
        map.write().unwrap().insert(
            "old".into(),
            SessionRecord {
                id: "old".into(),
                payload: Value::Null,
                created_at: stale,
                updated_at: stale,
            },
        );
        let store = SessionStore::with_map(map).with_ttl(Duration::from_secs(60));
        assert_eq!(store.get("old"), None);

        let fresh = store.upsert(Some("old".into()), None, Value::Null);
        assert!(fresh.created_at > stale);

        store.upsert(Some("live".into()), None, Value::Null);
        assert_eq!(store.purge_expired(), 0);
    }

    #[test]
    fn no_ttl_keeps_everything() {
        let map = SessionMap::default();
        let stale = Utc::now() - TimeDelta::days(365);
        map.write().unwrap().insert(
            "old".into(),
            SessionRecord {
                id: "old".into(),
                payload: Value::Null,
                created_at: stale,
                updated_at: stale,
            },
        );
        let store = SessionStore::with_map(map);
        assert!(store.get("old").is_some());
        assert_eq!(store.purge_expired(), 0);
    }
}
