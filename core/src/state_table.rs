//! Last pushed run state per script.

use std::collections::HashMap;

use scriptdeck_types::{ScriptId, ScriptState};

/// Run status as far as the client knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// No snapshot has mentioned this script yet.
    Unknown,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptStateTable {
    states: HashMap<ScriptId, ScriptState>,
}

impl ScriptStateTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite every listed script; scripts not listed keep their state.
    ///
    /// Returns the ids whose running flag changed or that were not known before,
    /// in snapshot order.
    pub fn apply_snapshot(
        &mut self,
        snapshot: impl IntoIterator<Item = ScriptState>,
    ) -> Vec<ScriptId> {
        let mut changed = Vec::new();
        for state in snapshot {
            let differs = self
                .states
                .get(&state.id)
                .is_none_or(|known| known.running != state.running);
            if differs && !changed.contains(&state.id) {
                changed.push(state.id.clone());
            }
            self.states.insert(state.id.clone(), state);
        }
        changed
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ScriptState> {
        self.states.get(id)
    }

    #[must_use]
    pub fn status(&self, id: &str) -> RunStatus {
        match self.states.get(id) {
            None => RunStatus::Unknown,
            Some(state) if state.running => RunStatus::Running,
            Some(_) => RunStatus::Stopped,
        }
    }
}
