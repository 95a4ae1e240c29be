//! Application records and the registry the dispatch loop scans.

use std::sync::Arc;

use tracing::debug;

use crate::application::{AppClassId, AppInfo, Application, RecordId, SuiteInfo};
use crate::state::{AppState, StateRequest};

pub(crate) struct AppRecord {
    pub(crate) info: AppInfo,
    pub(crate) app: Arc<dyn Application>,
    pub(crate) state: AppState,
}

/// Work the dispatch loop picked under the lock, to carry out after
/// releasing it.
pub(crate) enum Step {
    /// Registry is empty.
    Finished,
    /// Best state is stable; wait for a change.
    Idle,
    /// Record moved to `Active`; call `start`.
    Start(AppInfo, Arc<dyn Application>),
    /// Record moved to `Paused`; call `pause`.
    Pause(AppInfo, Arc<dyn Application>),
    /// Record moved to `Destroyed`; call `destroy`.
    Destroy(AppInfo, Arc<dyn Application>),
    /// A `Destroyed` record was dropped from the registry.
    Removed(AppInfo),
}

#[derive(Default)]
pub(crate) struct Registry {
    records: Vec<AppRecord>,
    cursor: usize,
    next_id: u64,
    pub(crate) shutting_down: bool,
    pub(crate) suite: Option<SuiteInfo>,
}

impl Registry {
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Add a record in `PausedResume`. Any live record of the same class is
    /// sent to `DestroyPending` first.
    pub(crate) fn insert(&mut self, class: AppClassId, app: Arc<dyn Application>) -> RecordId {
        for record in &mut self.records {
            if record.info.class == class
                && let Some(next) = record.state.on_request(StateRequest::Destroy)
            {
                debug!(app = %record.info, from = %record.state, "Replaced by a new instance");
                record.state = next;
            }
        }

        let id = RecordId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.records.push(AppRecord {
            info: AppInfo { id, class },
            app,
            state: AppState::PausedResume,
        });
        debug!(record = %id, "Registered");
        id
    }

    fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.info.id == id)
    }

    pub(crate) fn state_of(&self, id: RecordId) -> Option<AppState> {
        self.position(id)
            .and_then(|idx| self.records.get(idx))
            .map(|r| r.state)
    }

    /// Apply an external request. `None` if the record is unknown,
    /// `Some(false)` if the request was ignored.
    pub(crate) fn request(&mut self, id: RecordId, request: StateRequest) -> Option<bool> {
        let record = self.records.iter_mut().find(|r| r.info.id == id)?;
        match record.state.on_request(request) {
            Some(next) => {
                debug!(app = %record.info, from = %record.state, to = %next, ?request, "Transition");
                record.state = next;
                Some(true)
            },
            None => {
                debug!(app = %record.info, state = %record.state, ?request, "Ignored request");
                Some(false)
            },
        }
    }

    /// Force `DestroyPending` after a failed callback, unless the record
    /// already reached `Destroyed`.
    pub(crate) fn force_destroy(&mut self, id: RecordId) {
        if let Some(record) = self.records.iter_mut().find(|r| r.info.id == id)
            && !record.state.is_terminal()
        {
            record.state = AppState::DestroyPending;
        }
    }

    /// Send every live record to `DestroyPending`. Returns how many moved.
    pub(crate) fn destroy_all(&mut self) -> usize {
        let mut moved = 0_usize;
        for record in &mut self.records {
            if let Some(next) = record.state.on_request(StateRequest::Destroy) {
                record.state = next;
                moved = moved.saturating_add(1);
            }
        }
        moved
    }

    pub(crate) fn is_scheduled(&self, class: &AppClassId) -> bool {
        self.records.iter().any(|r| {
            r.info.class == *class
                && !matches!(r.state, AppState::DestroyPending | AppState::Destroyed)
        })
    }

    pub(crate) fn snapshot(&self) -> Vec<(AppInfo, AppState)> {
        self.records
            .iter()
            .map(|r| (r.info.clone(), r.state))
            .collect()
    }

    /// Index of the highest-priority record. The scan starts after the last
    /// pick and takes the first record of the best priority, so equal
    /// priorities are served round-robin.
    pub(crate) fn select(&mut self) -> Option<usize> {
        let len = self.records.len();
        if len == 0 {
            return None;
        }
        let start = if self.cursor < len { self.cursor } else { 0 };

        let mut best: Option<(usize, u8)> = None;
        for idx in (start..len).chain(0..start) {
            let Some(record) = self.records.get(idx) else {
                continue;
            };
            let priority = record.state.priority();
            if best.is_none_or(|(_, p)| priority > p) {
                best = Some((idx, priority));
            }
        }

        let (idx, _) = best?;
        self.cursor = idx.saturating_add(1);
        Some(idx)
    }

    /// Take the dispatch decision for the best record.
    pub(crate) fn next_step(&mut self) -> Step {
        let Some(idx) = self.select() else {
            return Step::Finished;
        };
        let Some(state) = self.records.get(idx).map(|r| r.state) else {
            return Step::Finished;
        };

        match state {
            AppState::Paused | AppState::Active => Step::Idle,
            AppState::Destroyed => {
                let record = self.records.swap_remove(idx);
                debug!(app = %record.info, "Unregistered");
                Step::Removed(record.info)
            },
            AppState::PausedResume | AppState::ActivePending => {
                // Single foreground: whoever holds it now must pause.
                for other in &mut self.records {
                    if other.state == AppState::Active {
                        debug!(app = %other.info, "Demoted from foreground");
                        other.state = AppState::PausePending;
                    }
                }
                self.advance(idx, AppState::Active, Step::Start)
            },
            AppState::PausePending => self.advance(idx, AppState::Paused, Step::Pause),
            AppState::DestroyPending => self.advance(idx, AppState::Destroyed, Step::Destroy),
        }
    }

    fn advance(
        &mut self,
        idx: usize,
        to: AppState,
        step: fn(AppInfo, Arc<dyn Application>) -> Step,
    ) -> Step {
        match self.records.get_mut(idx) {
            Some(record) => {
                debug!(app = %record.info, from = %record.state, %to, "Dispatch");
                record.state = to;
                step(record.info.clone(), Arc::clone(&record.app))
            },
            None => Step::Idle,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_state(&mut self, id: RecordId, state: AppState) {
        if let Some(record) = self.records.iter_mut().find(|r| r.info.id == id) {
            record.state = state;
        }
    }

    #[cfg(test)]
    pub(crate) fn active_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.state == AppState::Active)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::AppHandle;
    use crate::error::AppResult;
    use async_trait::async_trait;

    struct Nop;

    #[async_trait]
    impl Application for Nop {
        async fn start(&self, _handle: &AppHandle) -> AppResult<()> {
            Ok(())
        }

        async fn destroy(&self, _handle: &AppHandle, _unconditional: bool) -> AppResult<()> {
            Ok(())
        }
    }

    fn registry(classes: &[&str]) -> (Registry, Vec<RecordId>) {
        let mut registry = Registry::default();
        let ids = classes
            .iter()
            .map(|c| registry.insert(AppClassId::from(*c), Arc::new(Nop)))
            .collect();
        (registry, ids)
    }

    fn picked(registry: &mut Registry) -> RecordId {
        let idx = registry.select().unwrap();
        registry.snapshot()[idx].0.id
    }

    #[test]
    fn test_round_robin_among_equal_priorities() {
        let (mut registry, ids) = registry(&["a", "b", "c"]);
        for id in &ids {
            registry.set_state(*id, AppState::DestroyPending);
        }

        let first: Vec<RecordId> = (0..3).map(|_| picked(&mut registry)).collect();
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, ids, "each record served once before any repeats");

        let second: Vec<RecordId> = (0..3).map(|_| picked(&mut registry)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_priority_beats_position() {
        let (mut registry, ids) = registry(&["paused", "destroy", "resume"]);
        registry.set_state(ids[0], AppState::Paused);
        registry.set_state(ids[1], AppState::DestroyPending);
        registry.set_state(ids[2], AppState::ActivePending);

        assert!(matches!(registry.next_step(), Step::Destroy(info, _) if info.id == ids[1]));
        assert!(matches!(registry.next_step(), Step::Removed(info) if info.id == ids[1]));
        assert!(matches!(registry.next_step(), Step::Start(info, _) if info.id == ids[2]));
        assert!(matches!(registry.next_step(), Step::Idle));
        assert_eq!(registry.state_of(ids[0]), Some(AppState::Paused));
    }

    #[test]
    fn test_activation_demotes_foreground() {
        let (mut registry, ids) = registry(&["a", "b"]);
        registry.set_state(ids[0], AppState::Active);
        registry.set_state(ids[1], AppState::ActivePending);

        assert!(matches!(registry.next_step(), Step::Start(info, _) if info.id == ids[1]));
        assert_eq!(registry.state_of(ids[0]), Some(AppState::PausePending));
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn test_duplicate_class_destroys_previous() {
        let (mut registry, ids) = registry(&["game"]);
        registry.set_state(ids[0], AppState::Active);

        let newer = registry.insert(AppClassId::from("game"), Arc::new(Nop));
        assert_eq!(registry.state_of(ids[0]), Some(AppState::DestroyPending));
        assert_eq!(registry.state_of(newer), Some(AppState::PausedResume));
        assert_eq!(registry.len(), 2);

        // Teardown of the old instance is serviced before the new one starts.
        assert!(matches!(registry.next_step(), Step::Destroy(info, _) if info.id == ids[0]));
    }

    #[test]
    fn test_destroy_all_covers_every_live_state() {
        let (mut registry, ids) = registry(&["active", "paused", "pausing", "gone"]);
        registry.set_state(ids[0], AppState::Active);
        registry.set_state(ids[1], AppState::Paused);
        registry.set_state(ids[2], AppState::PausePending);
        registry.set_state(ids[3], AppState::Destroyed);

        assert_eq!(registry.destroy_all(), 3);
        for id in &ids[..3] {
            assert_eq!(registry.state_of(*id), Some(AppState::DestroyPending));
        }
        assert_eq!(registry.state_of(ids[3]), Some(AppState::Destroyed));
    }

    #[test]
    fn test_requests_on_destroyed_are_ignored() {
        let (mut registry, ids) = registry(&["a"]);
        registry.set_state(ids[0], AppState::Destroyed);
        assert_eq!(registry.request(ids[0], StateRequest::ResumeRequest), Some(false));
        assert_eq!(registry.request(ids[0], StateRequest::Destroy), Some(false));
        registry.force_destroy(ids[0]);
        assert_eq!(registry.state_of(ids[0]), Some(AppState::Destroyed));
        assert_eq!(registry.request(RecordId(99), StateRequest::Pause), None);
    }
}
