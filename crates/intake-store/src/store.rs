//! The case store.
//!
//! Every mutation is one synchronous critical section: the state lock is
//! taken, the change is applied, the lock is released, and only then are
//! listeners told. Mutations are applied in call order and reads never
//! notify.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use intake_core::{
    Case, CaseId, CaseOutputs, CaseStatus, CoachSuggestion, FactSet, IntakeAnswers, merge_facts,
};
use tracing::{debug, info, warn};

use crate::{LocalSnapshotFile, StoreError, StoreSnapshot};

/// A committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    CaseCreated(CaseId),
    FactsUpdated(CaseId),
    OutputsUpdated(CaseId),
    StatusChanged(CaseId, CaseStatus),
    ActiveCaseChanged(Option<CaseId>),
    CaseDeleted(CaseId),
    /// The whole state was replaced from a snapshot.
    Restored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&CaseStore, &StoreEvent) + Send + Sync>;

#[derive(Default)]
struct State {
    cases: Vec<Case>,
    active: Option<CaseId>,
}

impl State {
    fn case_mut(&mut self, id: &CaseId) -> Result<&mut Case, StoreError> {
        self.cases
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn contains(&self, id: &CaseId) -> bool {
        self.cases.iter().any(|c| &c.id == id)
    }
}

/// Authoritative, in-memory collection of cases for one session.
#[derive(Default)]
pub struct CaseStore {
    state: Mutex<State>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
}

impl CaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let snapshot = snapshot.repaired();
        Self {
            state: Mutex::new(State {
                cases: snapshot.cases,
                active: snapshot.active_case_id,
            }),
            ..Default::default()
        }
    }

    /// Open the store backed by `file`: load what is there (or start empty)
    /// and save after every committed mutation.
    pub fn open(file: LocalSnapshotFile) -> Result<Arc<Self>, StoreError> {
        let store = match file.load()? {
            Some(snapshot) => {
                info!(
                    path = %file.path().display(),
                    cases = snapshot.cases.len(),
                    "loaded local snapshot"
                );
                Self::from_snapshot(snapshot)
            }
            None => Self::new(),
        };
        let store = Arc::new(store);
        store.persist_to(file);
        Ok(store)
    }

    // ── Reads ──

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state();
        StoreSnapshot {
            cases: state.cases.clone(),
            active_case_id: state.active.clone(),
            ..Default::default()
        }
    }

    pub fn get(&self, id: &CaseId) -> Option<Case> {
        self.state().cases.iter().find(|c| &c.id == id).cloned()
    }

    /// All cases in creation order.
    pub fn cases(&self) -> Vec<Case> {
        self.state().cases.clone()
    }

    pub fn active_case_id(&self) -> Option<CaseId> {
        self.state().active.clone()
    }

    pub fn active_case(&self) -> Option<Case> {
        let state = self.state();
        let active = state.active.as_ref()?;
        state.cases.iter().find(|c| &c.id == active).cloned()
    }

    // ── Mutations ──

    /// Create a case from the intake answers and make it active.
    pub fn create_case(&self, answers: IntakeAnswers) -> CaseId {
        let case = Case::new(answers);
        let id = case.id.clone();
        {
            let mut state = self.state();
            state.cases.push(case);
            state.active = Some(id.clone());
        }
        info!(case_id = %id, "case created");
        self.notify(&StoreEvent::CaseCreated(id.clone()));
        id
    }

    /// Merge `partial` into the case's facts.
    pub fn update_facts(&self, id: &CaseId, partial: &FactSet) -> Result<(), StoreError> {
        self.mutate(id, StoreEvent::FactsUpdated(id.clone()), |case| {
            case.facts = merge_facts(&case.facts, Some(partial));
        })
    }

    /// Merge the facts a coach turn extracted into the case.
    pub fn apply_suggestion(
        &self,
        id: &CaseId,
        suggestion: &CoachSuggestion,
    ) -> Result<(), StoreError> {
        self.update_facts(id, &suggestion.extracted_facts)
    }

    /// Shallow-merge named outputs into the case.
    pub fn update_outputs(&self, id: &CaseId, partial: CaseOutputs) -> Result<(), StoreError> {
        self.mutate(id, StoreEvent::OutputsUpdated(id.clone()), |case| {
            case.outputs.extend(partial);
        })
    }

    /// Set the case status. Transition order is the caller's responsibility.
    pub fn set_status(&self, id: &CaseId, status: CaseStatus) -> Result<(), StoreError> {
        self.mutate(id, StoreEvent::StatusChanged(id.clone(), status), |case| {
            case.status = status;
        })
    }

    pub fn set_active_case(&self, id: &CaseId) -> Result<(), StoreError> {
        {
            let mut state = self.state();
            if !state.contains(id) {
                return Err(StoreError::NotFound(id.clone()));
            }
            state.active = Some(id.clone());
        }
        self.notify(&StoreEvent::ActiveCaseChanged(Some(id.clone())));
        Ok(())
    }

    pub fn clear_active_case(&self) {
        self.state().active = None;
        self.notify(&StoreEvent::ActiveCaseChanged(None));
    }

    /// Remove a case. Clears the active id when it pointed at this case.
    pub fn delete_case(&self, id: &CaseId) -> Result<(), StoreError> {
        {
            let mut state = self.state();
            let before = state.cases.len();
            state.cases.retain(|c| &c.id != id);
            if state.cases.len() == before {
                return Err(StoreError::NotFound(id.clone()));
            }
            if state.active.as_ref() == Some(id) {
                state.active = None;
            }
        }
        info!(case_id = %id, "case deleted");
        self.notify(&StoreEvent::CaseDeleted(id.clone()));
        Ok(())
    }

    /// Replace the whole state with `snapshot`. No merge with local state.
    pub fn restore(&self, snapshot: StoreSnapshot) {
        let snapshot = snapshot.repaired();
        {
            let mut state = self.state();
            state.cases = snapshot.cases;
            state.active = snapshot.active_case_id;
        }
        info!("store restored from snapshot");
        self.notify(&StoreEvent::Restored);
    }

    // ── Observation ──

    /// Register a listener called once after each committed mutation.
    ///
    /// Listeners run on the mutating thread after the state lock has been
    /// released, so they may read the store.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CaseStore, &StoreEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners().retain(|(sid, _)| *sid != id);
    }

    /// Save a snapshot to `file` after every committed mutation. Save
    /// failures are logged; the in-memory state is unaffected.
    pub fn persist_to(&self, file: LocalSnapshotFile) -> SubscriptionId {
        self.subscribe(move |store, event| {
            if let Err(e) = file.save(&store.snapshot()) {
                warn!(error = %e, ?event, "failed to save local snapshot");
            }
        })
    }

    // ── Internals ──

    fn mutate(
        &self,
        id: &CaseId,
        event: StoreEvent,
        apply: impl FnOnce(&mut Case),
    ) -> Result<(), StoreError> {
        {
            let mut state = self.state();
            let case = state.case_mut(id)?;
            apply(case);
            case.touch();
        }
        debug!(case_id = %id, ?event, "case updated");
        self.notify(&event);
        Ok(())
    }

    fn notify(&self, event: &StoreEvent) {
        let listeners: Vec<Listener> = self
            .listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(self, event);
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
