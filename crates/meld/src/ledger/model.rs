//! In-memory view of a target's ledger.

use std::collections::BTreeMap;

/// A newly applied script waiting to be written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedScript {
    /// Script version.
    pub version: u32,
    /// Script description.
    pub description: String,
    /// Rendered body, batches joined by separator lines.
    pub body: String,
}

/// Merges the versions already recorded for a target with newly applied
/// scripts.
///
/// Recorded versions are never overwritten: a script is staged only when its
/// version is unknown or was recorded without a body.
#[derive(Debug, Clone, Default)]
pub struct VersionLedgerModel {
    number: u32,
    recorded: BTreeMap<u32, Option<String>>,
    staged: BTreeMap<u32, StagedScript>,
}

impl VersionLedgerModel {
    /// Creates an empty model (version 0).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a model from recorded script bodies; the version is the
    /// highest recorded one.
    #[must_use]
    pub fn from_recorded(recorded: BTreeMap<u32, Option<String>>) -> Self {
        let number = recorded.keys().next_back().copied().unwrap_or(0);
        Self {
            number,
            recorded,
            staged: BTreeMap::new(),
        }
    }

    /// Current version: the highest recorded or staged version.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Body recorded for `version`, if any.
    #[must_use]
    pub fn recorded_body(&self, version: u32) -> Option<&str> {
        self.recorded.get(&version)?.as_deref()
    }

    /// Returns whether `version` is recorded, with or without a body.
    #[must_use]
    pub fn is_recorded(&self, version: u32) -> bool {
        self.recorded.contains_key(&version)
    }

    /// Stages newly applied scripts.
    pub fn apply(&mut self, scripts: impl IntoIterator<Item = StagedScript>) {
        for script in scripts {
            if self.recorded_body(script.version).is_some() {
                continue;
            }
            self.number = self.number.max(script.version);
            self.staged.insert(script.version, script);
        }
    }

    /// Moves the staged scripts to the recorded ones once they are written.
    pub fn mark_recorded(&mut self) {
        for (version, script) in std::mem::take(&mut self.staged) {
            self.recorded.insert(version, Some(script.body));
        }
    }

    /// Staged scripts in ascending version order.
    pub fn staged(&self) -> impl Iterator<Item = &StagedScript> {
        self.staged.values()
    }

    /// Returns whether anything is waiting to be written.
    #[must_use]
    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }
}
