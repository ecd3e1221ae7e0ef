//! Cloud sync coordinator.
//!
//! A single task owns the sign-in state and the debounce timer. It listens
//! to store events through an unbounded channel fed by a store listener and
//! to commands from `SyncHandle`:
//!
//! - sign-in pulls the remote snapshot once per transition and restores it
//!   wholesale (last pull wins)
//! - any other store mutation while signed in arms the timer, and further
//!   mutations reset it
//! - when the timer fires the whole snapshot is pushed (last write wins)
//!
//! Remote failures are logged and swallowed. Pushes are awaited inside the
//! task, so a push in flight always completes before the next command runs.

use std::sync::Arc;
use std::time::Duration;

use intake_store::{CaseStore, StoreEvent, SubscriptionId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::{AuthState, RemoteStore, RestoreMarker, SyncError};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet period after the last mutation before a push.
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1500),
        }
    }
}

enum Command {
    SignIn(String, oneshot::Sender<()>),
    SignOut(oneshot::Sender<()>),
    Flush(oneshot::Sender<()>),
    State(oneshot::Sender<AuthState>),
    Shutdown(oneshot::Sender<()>),
}

pub struct SyncCoordinator {
    store: Arc<CaseStore>,
    remote: Arc<dyn RemoteStore>,
    config: SyncConfig,
    auth: AuthState,
    marker: Option<RestoreMarker>,
    deadline: Option<Instant>,
    subscription: SubscriptionId,
}

impl SyncCoordinator {
    /// Subscribe to `store` and start the coordinator task, signed out.
    pub fn spawn(
        store: Arc<CaseStore>,
        remote: Arc<dyn RemoteStore>,
        config: SyncConfig,
    ) -> SyncHandle {
        Self::start(store, remote, config, AuthState::default(), None)
    }

    /// Start from the state recorded in `marker` and keep it current.
    ///
    /// A sign-in for the user the marker names does not restore again.
    pub fn spawn_with_marker(
        store: Arc<CaseStore>,
        remote: Arc<dyn RemoteStore>,
        config: SyncConfig,
        marker: RestoreMarker,
    ) -> Result<SyncHandle, SyncError> {
        let auth = marker.initial_state()?;
        if let Some(user) = auth.user() {
            debug!(user, "resuming restored sign-in");
        }
        Ok(Self::start(store, remote, config, auth, Some(marker)))
    }

    fn start(
        store: Arc<CaseStore>,
        remote: Arc<dyn RemoteStore>,
        config: SyncConfig,
        auth: AuthState,
        marker: Option<RestoreMarker>,
    ) -> SyncHandle {
        let (event_tx, events) = mpsc::unbounded_channel();
        let subscription = store.subscribe(move |_, event| {
            // Closed only once the coordinator has stopped.
            let _ = event_tx.send(event.clone());
        });
        let (commands_tx, commands) = mpsc::channel(16);

        let coordinator = Self {
            store,
            remote,
            config,
            auth,
            marker,
            deadline: None,
            subscription,
        };
        let task = tokio::spawn(coordinator.run(commands, events));
        SyncHandle {
            commands: commands_tx,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<StoreEvent>,
    ) {
        loop {
            let deadline = self.deadline;
            let timer = async move {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;

                Some(event) = events.recv() => self.on_store_event(&event),
                command = commands.recv() => match command {
                    Some(Command::Shutdown(reply)) => {
                        self.deadline = None;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.on_command(command).await,
                    None => break,
                },
                () = timer => {
                    self.deadline = None;
                    self.push().await;
                }
            }
        }
        self.store.unsubscribe(self.subscription);
        debug!("sync coordinator stopped");
    }

    fn on_store_event(&mut self, event: &StoreEvent) {
        if matches!(event, StoreEvent::Restored) {
            return;
        }
        if self.auth.push_target().is_none() {
            return;
        }
        self.deadline = Some(Instant::now() + self.config.debounce);
        debug!(?event, "push scheduled");
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::SignIn(user, reply) => {
                if self.auth.on_sign_in(&user) {
                    self.deadline = None;
                    self.restore(&user).await;
                    self.auth.mark_restored();
                    self.record_marker(Some(&user));
                } else {
                    debug!(user = %user, "already signed in");
                }
                let _ = reply.send(());
            }
            Command::SignOut(reply) => {
                if let Some(user) = self.auth.user() {
                    info!(user, "signed out");
                }
                self.auth.on_sign_out();
                self.deadline = None;
                self.record_marker(None);
                let _ = reply.send(());
            }
            Command::Flush(reply) => {
                if self.deadline.take().is_some() {
                    self.push().await;
                }
                let _ = reply.send(());
            }
            Command::State(reply) => {
                let _ = reply.send(self.auth.clone());
            }
            Command::Shutdown(reply) => {
                let _ = reply.send(());
            }
        }
    }

    async fn restore(&self, user: &str) {
        match self.remote.fetch(user).await {
            Ok(Some(snapshot)) => {
                info!(user, count = snapshot.cases.len(), "restoring remote snapshot");
                self.store.restore(snapshot);
            }
            Ok(None) => debug!(user, "no remote snapshot, keeping local state"),
            Err(e) => warn!(user, error = %e, "remote restore failed, keeping local state"),
        }
    }

    fn record_marker(&self, user: Option<&str>) {
        let Some(marker) = &self.marker else {
            return;
        };
        let result = match user {
            Some(user) => marker.save(user),
            None => marker.clear(),
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to record restore marker");
        }
    }

    async fn push(&self) {
        let Some(user) = self.auth.push_target() else {
            return;
        };
        let snapshot = self.store.snapshot();
        match self.remote.put(user, &snapshot).await {
            Ok(()) => info!(user, count = snapshot.cases.len(), "pushed snapshot"),
            Err(e) => warn!(user, error = %e, "push failed"),
        }
    }
}

/// Handle to a running coordinator. Dropping it stops the coordinator.
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Sign in and wait until the restore for this sign-in has finished.
    pub async fn sign_in(&self, user: impl Into<String>) -> Result<(), SyncError> {
        let user = user.into();
        self.request(|reply| Command::SignIn(user, reply)).await
    }

    /// Sign out, cancelling any scheduled push.
    pub async fn sign_out(&self) -> Result<(), SyncError> {
        self.request(Command::SignOut).await
    }

    /// Run a scheduled push now and wait for it.
    pub async fn flush(&self) -> Result<(), SyncError> {
        self.request(Command::Flush).await
    }

    pub async fn state(&self) -> Result<AuthState, SyncError> {
        self.request(Command::State).await
    }

    /// Stop the coordinator, dropping any scheduled push.
    pub async fn shutdown(self) -> Result<(), SyncError> {
        self.request(Command::Shutdown).await?;
        self.task.await.map_err(|_| SyncError::Stopped)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SyncError::Stopped)?;
        rx.await.map_err(|_| SyncError::Stopped)
    }
}
