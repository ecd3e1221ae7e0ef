//! Per-user remote snapshot storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use intake_store::StoreSnapshot;
use reqwest::{StatusCode, Url, header};
use tracing::{debug, info};

use crate::SyncError;

/// Whole-document storage keyed by user. `fetch` is `None` for a user that
/// has never pushed.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch(&self, user: &str) -> Result<Option<StoreSnapshot>, SyncError>;
    async fn put(&self, user: &str, snapshot: &StoreSnapshot) -> Result<(), SyncError>;
}

/// Client for the `/api/snapshots/{user}` endpoint.
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpRemoteStore {
    /// `base_url` is the server root, e.g. `http://localhost:4000`.
    pub fn new(base_url: &str) -> Result<Self, SyncError> {
        let invalid = || SyncError::InvalidUrl(base_url.to_string());
        let parsed = Url::parse(base_url.trim_end_matches('/')).map_err(|_| invalid())?;
        if parsed.cannot_be_a_base() {
            return Err(invalid());
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: parsed,
        })
    }

    fn snapshot_url(&self, user: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", "snapshots", user]);
        }
        url
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch(&self, user: &str) -> Result<Option<StoreSnapshot>, SyncError> {
        let url = self.snapshot_url(user);
        debug!(url = %url, user, "fetching remote snapshot");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let snapshot = StoreSnapshot::from_json(&body)?;
        info!(user, count = snapshot.cases.len(), "fetched remote snapshot");
        Ok(Some(snapshot))
    }

    async fn put(&self, user: &str, snapshot: &StoreSnapshot) -> Result<(), SyncError> {
        let url = self.snapshot_url(user);
        let body = snapshot.to_json()?;
        info!(url = %url, user, count = snapshot.cases.len(), "pushing snapshot");
        let resp = self
            .client
            .put(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// In-process remote storage. Backs the server's snapshot endpoint and
/// stands in for a real remote in tests.
#[derive(Default)]
pub struct MemoryRemoteStore {
    snapshots: Mutex<HashMap<String, StoreSnapshot>>,
    fetches: AtomicUsize,
    puts: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(self, user: &str, snapshot: StoreSnapshot) -> Self {
        self.snapshots().insert(user.to_string(), snapshot);
        self
    }

    /// Stored snapshot, without counting as a fetch.
    pub fn get(&self, user: &str) -> Option<StoreSnapshot> {
        self.snapshots().get(user).cloned()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with a 503.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), SyncError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Server {
                status: 503,
                body: "remote unavailable".into(),
            });
        }
        Ok(())
    }

    fn snapshots(&self) -> MutexGuard<'_, HashMap<String, StoreSnapshot>> {
        self.snapshots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch(&self, user: &str) -> Result<Option<StoreSnapshot>, SyncError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.get(user))
    }

    async fn put(&self, user: &str, snapshot: &StoreSnapshot) -> Result<(), SyncError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.snapshots().insert(user.to_string(), snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::Router;
    use axum::extract::{Path, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use intake_core::{Case, IntakeAnswers};

    type Docs = Arc<Mutex<HashMap<String, String>>>;

    async fn serve(docs: Docs) -> String {
        let app = Router::new()
            .route(
                "/api/snapshots/{user}",
                get(
                    |State(docs): State<Docs>, Path(user): Path<String>| async move {
                        match docs.lock().unwrap().get(&user) {
                            Some(body) => (AxumStatus::OK, body.clone()),
                            None => (AxumStatus::NOT_FOUND, String::new()),
                        }
                    },
                )
                .put(
                    |State(docs): State<Docs>, Path(user): Path<String>, body: String| async move {
                        if user == "broken" {
                            return AxumStatus::INTERNAL_SERVER_ERROR;
                        }
                        docs.lock().unwrap().insert(user, body);
                        AxumStatus::NO_CONTENT
                    },
                ),
            )
            .with_state(docs);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn snapshot() -> StoreSnapshot {
        let case = Case::new(IntakeAnswers {
            petitioner_name: Some("Ana".into()),
            ..Default::default()
        });
        StoreSnapshot {
            active_case_id: Some(case.id.clone()),
            cases: vec![case],
            ..Default::default()
        }
    }

    #[test]
    fn snapshot_url_escapes_user() {
        let remote = HttpRemoteStore::new("http://localhost:4000/").unwrap();
        assert_eq!(
            remote.snapshot_url("ana").as_str(),
            "http://localhost:4000/api/snapshots/ana"
        );
        assert_eq!(
            remote.snapshot_url("a/b").as_str(),
            "http://localhost:4000/api/snapshots/a%2Fb"
        );
    }

    #[test]
    fn rejects_unusable_base() {
        assert!(matches!(
            HttpRemoteStore::new("not a url"),
            Err(SyncError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpRemoteStore::new("mailto:someone@example.com"),
            Err(SyncError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn http_put_then_fetch() {
        let docs = Docs::default();
        let remote = HttpRemoteStore::new(&serve(docs.clone()).await).unwrap();

        assert_eq!(remote.fetch("ana").await.unwrap(), None);
        let snapshot = snapshot();
        remote.put("ana", &snapshot).await.unwrap();
        assert!(docs.lock().unwrap().contains_key("ana"));
        assert_eq!(remote.fetch("ana").await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn http_put_error_carries_status() {
        let remote = HttpRemoteStore::new(&serve(Docs::default()).await).unwrap();
        let err = remote.put("broken", &snapshot()).await.unwrap_err();
        assert!(matches!(err, SyncError::Server { status: 500, .. }));
    }

    #[tokio::test]
    async fn memory_store_counts_and_fails_on_demand() {
        let remote = MemoryRemoteStore::new();
        assert_eq!(remote.fetch("ana").await.unwrap(), None);
        remote.put("ana", &snapshot()).await.unwrap();
        assert!(remote.get("ana").is_some());

        remote.set_failing(true);
        assert!(remote.fetch("ana").await.is_err());
        assert!(remote.put("ana", &snapshot()).await.is_err());
        assert_eq!(remote.fetch_count(), 2);
        assert_eq!(remote.put_count(), 2);
    }
}
