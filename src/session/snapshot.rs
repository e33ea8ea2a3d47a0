use crate::errors::ErrorKind;
use crate::gateway::{Address, Candidate, CandidateId, Roster, VoteReceipt};
use derive_more::IsVariant;
use serde::Serialize;
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, IsVariant)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    LoadingRoster,
    Ready,
    Voting,
    Voted,
    Errored(ErrorKind),
}

/// What observers see. Everything except `selected` comes from contract reads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ElectionSnapshot {
    pub identity: Option<Address>,
    pub candidates: Vec<Candidate>,
    pub has_voted: bool,
    pub selected: Option<CandidateId>,
    pub phase: ConnectionPhase,
    pub last_error: Option<ErrorKind>,
    pub receipt: Option<VoteReceipt>,
}

impl ElectionSnapshot {
    pub fn selected_candidate(&self) -> Option<&Candidate> {
        self.selected
            .and_then(|id| self.candidates.iter().find(|candidate| candidate.id == id))
    }

    /// Whether `submit_vote` would issue a remote call right now.
    pub fn can_submit(&self) -> bool {
        self.phase.is_ready() && !self.has_voted && self.selected.is_some()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Session data owned by the actor, published as an [`ElectionSnapshot`] after every
/// transition.
#[derive(Debug, Default)]
pub struct SessionView {
    pub identity: Option<Address>,
    pub roster: Roster,
    has_voted: bool,
    pub selected: Option<CandidateId>,
    pub last_error: Option<ErrorKind>,
    pub receipt: Option<VoteReceipt>,
}

impl SessionView {
    pub fn has_voted(&self) -> bool {
        self.has_voted
    }

    /// Once true for an identity, `has_voted` stays true until the view is reset.
    pub fn observe_has_voted(&mut self, has_voted: bool) {
        if self.has_voted && !has_voted {
            warn!(identity = ?self.identity, "contract reports no vote after one was observed, keeping it");
        }
        self.has_voted |= has_voted;
    }

    /// Installs a freshly fetched roster, dropping a selection that no longer exists.
    pub fn replace_roster(&mut self, roster: Roster) {
        if let Some(id) = self.selected.filter(|id| !roster.contains(*id)) {
            warn!(id, "selected candidate missing from the new roster");
            self.selected = None;
        }
        self.roster = roster;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self, phase: ConnectionPhase) -> ElectionSnapshot {
        ElectionSnapshot {
            identity: self.identity.clone(),
            candidates: self.roster.candidates().to_vec(),
            has_voted: self.has_voted,
            selected: self.selected,
            phase,
            last_error: self.last_error,
            receipt: self.receipt.clone(),
        }
    }
}
