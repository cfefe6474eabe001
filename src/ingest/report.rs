//! Per-entry outcomes of a package ingestion.

use serde::{Deserialize, Serialize};

use crate::symbols::Signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Module,
    Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntryState {
    /// Written under `key` by this call
    Written { key: String },
    /// An object already existed under `key`; nothing was written
    AlreadyPresent { key: String },
    /// Not published; the reason is the error that stopped it
    Skipped { reason: String },
}

impl EntryState {
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Written { key } | Self::AlreadyPresent { key } => Some(key),
            Self::Skipped { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOutcome {
    /// Entry name inside the package
    pub name: String,
    pub kind: EntryKind,
    pub signature: Option<Signature>,
    pub state: EntryState,
}

/// What one `add_package` call did, in package order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub outcomes: Vec<EntryOutcome>,
}

impl IngestReport {
    pub fn written(&self) -> usize {
        self.count(|s| matches!(s, EntryState::Written { .. }))
    }

    pub fn already_present(&self) -> usize {
        self.count(|s| matches!(s, EntryState::AlreadyPresent { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, EntryState::Skipped { .. }))
    }

    pub fn outcome(&self, name: &str) -> Option<&EntryOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Keys this call wrote, in package order
    pub fn written_keys(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.state {
                EntryState::Written { key } => Some(key.as_str()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&EntryState) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.state)).count()
    }
}
