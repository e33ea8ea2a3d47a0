use crate::gateway::CandidateId;
use crate::session::ConnectionPhase;
use derive_more::IsVariant;
use serde::Serialize;
use std::{error, fmt, result};
use tokio::sync::{mpsc, oneshot};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    NoWalletProvider,
    AuthorizationDenied(String),
    RemoteRead(String),
    InvalidCandidate(CandidateId),
    NoSelection,
    VoteRejected(String),
    RemoteWrite(String),
    /// the action has no transition out of the current phase
    InvalidPhase(ConnectionPhase),
    /// the pending operation was abandoned by a disconnect, an account change or a shutdown
    Cancelled,
    SessionClosed,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoWalletProvider => ErrorKind::NoWalletProvider,
            Self::AuthorizationDenied(_) => ErrorKind::AuthorizationDenied,
            Self::RemoteRead(_) => ErrorKind::RemoteRead,
            Self::InvalidCandidate(_) => ErrorKind::InvalidCandidate,
            Self::NoSelection => ErrorKind::NoSelection,
            Self::VoteRejected(_) => ErrorKind::VoteRejected,
            Self::RemoteWrite(_) => ErrorKind::RemoteWrite,
            Self::InvalidPhase(_) => ErrorKind::InvalidPhase,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::SessionClosed => ErrorKind::SessionClosed,
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl error::Error for Error {}

impl<T> From<mpsc::error::SendError<T>> for Error {
    fn from(_value: mpsc::error::SendError<T>) -> Self {
        Self::SessionClosed
    }
}

impl From<oneshot::error::RecvError> for Error {
    fn from(_value: oneshot::error::RecvError) -> Self {
        Self::SessionClosed
    }
}

pub type Result<T> = result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, IsVariant)]
pub enum ErrorKind {
    NoWalletProvider,
    AuthorizationDenied,
    RemoteRead,
    InvalidCandidate,
    NoSelection,
    VoteRejected,
    RemoteWrite,
    InvalidPhase,
    Cancelled,
    SessionClosed,
}

/// What a consumer may do after seeing an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, IsVariant)]
pub enum Severity {
    /// nothing changed remotely, the same action can be issued again
    RetrySafe,
    /// the current identity cannot make progress with this action
    FatalForIdentity,
    /// remote state is unknown until vote status has been re-queried
    ResyncRequired,
    /// a local precondition was violated, no remote call was made
    CallerBug,
}

impl ErrorKind {
    pub fn severity(self) -> Severity {
        match self {
            Self::NoWalletProvider
            | Self::AuthorizationDenied
            | Self::RemoteRead
            | Self::Cancelled => Severity::RetrySafe,
            Self::VoteRejected | Self::SessionClosed => Severity::FatalForIdentity,
            Self::RemoteWrite => Severity::ResyncRequired,
            Self::InvalidCandidate | Self::NoSelection | Self::InvalidPhase => Severity::CallerBug,
        }
    }
}
