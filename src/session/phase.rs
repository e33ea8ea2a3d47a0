use crate::errors::{Error, Result};
use crate::gateway::{Address, CandidateId, RosterLoad, SignerHandle, VoteReceipt};
use crate::session::dispatch::{Completion, Outcome};
use crate::session::generation::Ticket;
use crate::session::handle::Handle;
use crate::session::inner::{LocalTask, Message, MessageHandler};
use crate::session::snapshot::ConnectionPhase;
use std::mem;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

type Waiters<T> = Vec<oneshot::Sender<Result<T>>>;

/// The session state machine. Each variant owns what only that phase needs; the
/// shared session data lives in [`Handle`].
#[derive(Debug)]
pub(crate) enum Phase {
    Disconnected,
    Connecting(Connecting),
    Connected(Connected),
    LoadingRoster(LoadingRoster),
    Ready(Ready),
    Voting(Voting),
    Voted,
    Errored(Errored),
    Shutdown,
}

#[derive(Debug)]
pub(crate) struct Connecting {
    ticket: Ticket,
    waiters: Waiters<Address>,
}

#[derive(Debug)]
pub(crate) struct Connected {
    signer: SignerHandle,
    waiters: Waiters<Address>,
}

#[derive(Debug)]
pub(crate) struct LoadingRoster {
    signer: SignerHandle,
    ticket: Ticket,
    attempt: u32,
    waiters: Waiters<Address>,
}

#[derive(Debug)]
pub(crate) struct Ready {
    signer: SignerHandle,
}

#[derive(Debug)]
pub(crate) struct Voting {
    signer: SignerHandle,
    ticket: Ticket,
    candidate: CandidateId,
    waiters: Waiters<VoteReceipt>,
}

/// What has to happen before the session may leave [`Errored`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Recovery {
    ReloadRoster,
    /// the outcome of a vote is unknown until vote status is read back
    Reconcile,
}

#[derive(Debug)]
pub(crate) struct Errored {
    signer: SignerHandle,
    failure: Error,
    recovery: Recovery,
    in_flight: Option<Ticket>,
    attempt: u32,
    /// submitters, answered once vote status is known
    waiters: Waiters<VoteReceipt>,
}

impl Phase {
    pub(crate) fn public(&self) -> ConnectionPhase {
        match self {
            Self::Disconnected | Self::Shutdown => ConnectionPhase::Disconnected,
            Self::Connecting(_) => ConnectionPhase::Connecting,
            Self::Connected(_) => ConnectionPhase::Connected,
            Self::LoadingRoster(_) => ConnectionPhase::LoadingRoster,
            Self::Ready(_) => ConnectionPhase::Ready,
            Self::Voting(_) => ConnectionPhase::Voting,
            Self::Voted => ConnectionPhase::Voted,
            Self::Errored(errored) => ConnectionPhase::Errored(errored.failure.kind()),
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }

    fn awaited(&self) -> Option<&Ticket> {
        match self {
            Self::Connecting(connecting) => Some(&connecting.ticket),
            Self::LoadingRoster(loading) => Some(&loading.ticket),
            Self::Voting(voting) => Some(&voting.ticket),
            Self::Errored(errored) => errored.in_flight.as_ref(),
            _ => None,
        }
    }

    #[instrument(skip_all, fields(phase = ?self.public()), level = "debug")]
    pub(crate) async fn progress(
        self,
        handle: &mut Handle,
        message_handler: &mut MessageHandler,
    ) -> Phase {
        if let Self::Connected(connected) = self {
            return connected.start_loading(handle);
        }
        match message_handler.next_message().await {
            Message::Local(task) => self.on_local_task(task, handle),
            Message::Completion(completion) => self.on_completion(completion, handle),
            Message::Closed => {
                info!("every session handle dropped");
                self.abandon(handle);
                Self::Shutdown
            }
        }
    }

    pub(crate) fn on_local_task(self, task: LocalTask, handle: &mut Handle) -> Phase {
        debug!(?task, "local task");
        match task {
            LocalTask::Connect(sender) => self.connect(sender, handle),
            LocalTask::SelectCandidate { id, sender } => {
                let result = self.select_candidate(id, handle);
                handle.reply(sender, result);
                self
            }
            LocalTask::SubmitVote(sender) => self.submit_vote(sender, handle),
            LocalTask::Retry(sender) => self.retry(sender, handle),
            LocalTask::Disconnect(sender) => {
                handle.reply(sender, ());
                self.abandon(handle)
            }
            LocalTask::AccountsChanged { accounts, sender } => {
                handle.reply(sender, ());
                let changed = handle
                    .view
                    .identity
                    .as_ref()
                    .is_some_and(|identity| accounts.first() != Some(identity));
                if changed {
                    info!(active = ?accounts.first(), "bound account changed externally");
                    self.abandon(handle)
                } else {
                    self
                }
            }
            LocalTask::Shutdown(sender) => {
                handle.reply(sender, ());
                self.abandon(handle);
                Self::Shutdown
            }
        }
    }

    pub(crate) fn on_completion(self, completion: Completion, handle: &mut Handle) -> Phase {
        let Completion { ticket, outcome } = completion;
        if self.awaited() != Some(&ticket) {
            debug!(
                serial = ticket.serial,
                current_epoch = handle.tickets.is_current_epoch(&ticket),
                "discarding stale completion"
            );
            return self;
        }
        match (self, outcome) {
            (Self::Connecting(connecting), Outcome::Bound(result)) => {
                connecting.on_bound(result, handle)
            }
            (Self::LoadingRoster(loading), Outcome::Loaded(result)) => {
                loading.on_loaded(result, handle)
            }
            (Self::Voting(voting), Outcome::Cast(result)) => voting.on_cast(result, handle),
            (Self::Errored(errored), Outcome::VoteStatus(result)) => {
                errored.on_vote_status(result, handle)
            }
            (phase, outcome) => {
                warn!(?outcome, "completion does not fit the phase awaiting it");
                phase
            }
        }
    }

    /// Drops whatever is in progress and forgets the identity. Pending callers get
    /// [`Error::Cancelled`]; a vote already submitted may still land on chain.
    fn abandon(self, handle: &mut Handle) -> Phase {
        match self {
            Self::Connecting(Connecting { waiters, .. })
            | Self::Connected(Connected { waiters, .. })
            | Self::LoadingRoster(LoadingRoster { waiters, .. }) => {
                handle.reply_all(waiters, Err(Error::Cancelled))
            }
            Self::Voting(Voting { waiters, .. }) | Self::Errored(Errored { waiters, .. }) => {
                handle.reply_all(waiters, Err(Error::Cancelled))
            }
            Self::Disconnected | Self::Ready(_) | Self::Voted | Self::Shutdown => {}
        }
        handle.forget_identity();
        Self::Disconnected
    }

    fn connect(self, sender: oneshot::Sender<Result<Address>>, handle: &mut Handle) -> Phase {
        match self {
            Self::Disconnected => Connecting::start(vec![sender], handle),
            Self::Voted => {
                info!("connect after voting starts a fresh session");
                handle.forget_identity();
                Connecting::start(vec![sender], handle)
            }
            Self::Connecting(mut connecting) => {
                debug!("connect already in progress");
                connecting.waiters.push(sender);
                Self::Connecting(connecting)
            }
            Self::LoadingRoster(mut loading) => {
                debug!("connect already in progress");
                loading.waiters.push(sender);
                Self::LoadingRoster(loading)
            }
            Self::Errored(Errored {
                signer,
                recovery: Recovery::ReloadRoster,
                ..
            }) => {
                info!("connect after a failed roster load, reloading");
                Self::Connected(Connected {
                    signer,
                    waiters: vec![sender],
                })
            }
            Self::Ready(_) | Self::Voting(_) | Self::Errored(_) => {
                let result = handle
                    .view
                    .identity
                    .clone()
                    .ok_or(Error::InvalidPhase(self.public()));
                handle.reply(sender, result);
                self
            }
            Self::Connected(_) | Self::Shutdown => {
                handle.reply(sender, Err(Error::InvalidPhase(self.public())));
                self
            }
        }
    }

    fn select_candidate(&self, id: CandidateId, handle: &mut Handle) -> Result<()> {
        if handle.view.has_voted() || !handle.view.roster.contains(id) {
            return Err(Error::InvalidCandidate(id));
        }
        match self {
            Self::Ready(_) => {
                debug!(id, "candidate selected");
                handle.view.selected = Some(id);
                Ok(())
            }
            other => Err(Error::InvalidPhase(other.public())),
        }
    }

    fn submit_vote(self, sender: oneshot::Sender<Result<VoteReceipt>>, handle: &mut Handle) -> Phase {
        let selection = handle
            .view
            .selected
            .filter(|_| !handle.view.has_voted());
        match (self, selection) {
            (Self::Voting(mut voting), _) => {
                debug!("vote already in flight");
                voting.waiters.push(sender);
                Self::Voting(voting)
            }
            (phase, None) => {
                handle.reply(sender, Err(Error::NoSelection));
                phase
            }
            (Self::Ready(Ready { signer }), Some(candidate)) => {
                info!(candidate, "submitting vote");
                handle.view.last_error = None;
                let ticket = handle.cast_vote(&signer, candidate);
                Self::Voting(Voting {
                    signer,
                    ticket,
                    candidate,
                    waiters: vec![sender],
                })
            }
            (phase, Some(_)) => {
                handle.reply(sender, Err(Error::InvalidPhase(phase.public())));
                phase
            }
        }
    }

    fn retry(self, sender: oneshot::Sender<Result<()>>, handle: &mut Handle) -> Phase {
        match self {
            Self::Errored(errored) if errored.in_flight.is_some() => {
                handle.reply(sender, Ok(()));
                Self::Errored(errored)
            }
            Self::Errored(Errored {
                signer,
                recovery: Recovery::ReloadRoster,
                ..
            }) => {
                info!("retrying roster load");
                handle.reply(sender, Ok(()));
                Self::Connected(Connected {
                    signer,
                    waiters: Vec::new(),
                })
            }
            Self::Errored(mut errored) => {
                info!("retrying vote status");
                handle.reply(sender, Ok(()));
                errored.attempt = 1;
                errored.in_flight = Some(handle.query_vote_status(&errored.signer, None));
                Self::Errored(errored)
            }
            other => {
                handle.reply(sender, Err(Error::InvalidPhase(other.public())));
                other
            }
        }
    }
}

impl Connecting {
    fn start(waiters: Waiters<Address>, handle: &mut Handle) -> Phase {
        handle.view.last_error = None;
        let ticket = handle.bind_signer();
        Phase::Connecting(Self { ticket, waiters })
    }

    fn on_bound(self, result: Result<SignerHandle>, handle: &mut Handle) -> Phase {
        match result {
            Ok(signer) => {
                info!(identity = %signer.identity(), "connected");
                handle.view.identity = Some(signer.identity().clone());
                Phase::Connected(Connected {
                    signer,
                    waiters: self.waiters,
                })
            }
            Err(error) => {
                warn!(%error, "connect failed");
                handle.view.last_error = Some(error.kind());
                handle.reply_all(self.waiters, Err(error));
                Phase::Disconnected
            }
        }
    }
}

impl Connected {
    fn start_loading(self, handle: &mut Handle) -> Phase {
        let ticket = handle.load_view(&self.signer, None);
        Phase::LoadingRoster(LoadingRoster {
            signer: self.signer,
            ticket,
            attempt: 1,
            waiters: self.waiters,
        })
    }
}

impl LoadingRoster {
    fn on_loaded(mut self, result: Result<RosterLoad>, handle: &mut Handle) -> Phase {
        match result {
            Ok(RosterLoad { roster, has_voted }) => {
                info!(candidates = roster.len(), has_voted, "roster loaded");
                handle.view.replace_roster(roster);
                handle.view.observe_has_voted(has_voted);
                handle.view.last_error = None;
                handle.reply_all(self.waiters, Ok(self.signer.identity().clone()));
                Phase::Ready(Ready {
                    signer: self.signer,
                })
            }
            Err(error) if self.attempt < handle.config.read_attempts => {
                self.attempt += 1;
                warn!(%error, attempt = self.attempt, "roster load failed, trying again");
                let delay = handle.read_backoff(self.attempt);
                self.ticket = handle.load_view(&self.signer, delay);
                Phase::LoadingRoster(self)
            }
            Err(error) => {
                warn!(%error, "roster load failed");
                handle.view.last_error = Some(error.kind());
                handle.reply_all(self.waiters, Err(error.clone()));
                Phase::Errored(Errored {
                    signer: self.signer,
                    failure: error,
                    recovery: Recovery::ReloadRoster,
                    in_flight: None,
                    attempt: 1,
                    waiters: Vec::new(),
                })
            }
        }
    }
}

impl Voting {
    fn on_cast(self, result: Result<VoteReceipt>, handle: &mut Handle) -> Phase {
        match result {
            Ok(receipt) => {
                info!(tx_hash = %receipt.tx_hash, "vote confirmed");
                handle.view.observe_has_voted(true);
                handle.view.receipt = Some(receipt.clone());
                handle.reply_all(self.waiters, Ok(receipt));
                Phase::Voted
            }
            Err(error) => {
                warn!(%error, candidate = self.candidate, "vote failed, reading vote status back");
                handle.view.last_error = Some(error.kind());
                let in_flight = handle.query_vote_status(&self.signer, None);
                Phase::Errored(Errored {
                    signer: self.signer,
                    failure: error,
                    recovery: Recovery::Reconcile,
                    in_flight: Some(in_flight),
                    attempt: 1,
                    waiters: self.waiters,
                })
            }
        }
    }
}

impl Errored {
    fn on_vote_status(mut self, result: Result<bool>, handle: &mut Handle) -> Phase {
        match result {
            Ok(has_voted) => {
                info!(has_voted, failure = %self.failure, "vote status reconciled");
                handle.view.observe_has_voted(has_voted);
                handle.view.last_error = Some(self.failure.kind());
                handle.reply_all(self.waiters, Err(self.failure));
                Phase::Ready(Ready {
                    signer: self.signer,
                })
            }
            Err(error) if self.attempt < handle.config.read_attempts => {
                self.attempt += 1;
                warn!(%error, attempt = self.attempt, "vote status read failed, trying again");
                let delay = handle.read_backoff(self.attempt);
                self.in_flight = Some(handle.query_vote_status(&self.signer, delay));
                Phase::Errored(self)
            }
            Err(error) => {
                warn!(%error, "vote status unknown, waiting for retry");
                handle.view.last_error = Some(error.kind());
                self.in_flight = None;
                let waiters = mem::take(&mut self.waiters);
                handle.reply_all(waiters, Err(self.failure.clone()));
                Phase::Errored(self)
            }
        }
    }
}
