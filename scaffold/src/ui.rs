//! Loading/saving flags for view layers.
//!
//! Every fetch and every create holds a token while in flight. A flag is set
//! while at least one token of its kind is outstanding, so overlapping
//! operations cannot clear each other's spinner.

use std::collections::BTreeSet;

use serde::Serialize;

/// The flags a view binds to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UiState {
    pub loading: bool,
    pub saving: bool,
}

/// Outstanding operation tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct InFlight {
    fetches: BTreeSet<u64>,
    saves: BTreeSet<u64>,
}

impl InFlight {
    pub(crate) fn begin_fetch(&mut self, token: u64) {
        self.fetches.insert(token);
    }

    pub(crate) fn end_fetch(&mut self, token: u64) -> bool {
        self.fetches.remove(&token)
    }

    pub(crate) fn begin_save(&mut self, token: u64) {
        self.saves.insert(token);
    }

    pub(crate) fn end_save(&mut self, token: u64) -> bool {
        self.saves.remove(&token)
    }

    pub(crate) fn ui(&self) -> UiState {
        UiState {
            loading: !self.fetches.is_empty(),
            saving: !self.saves.is_empty(),
        }
    }
}
