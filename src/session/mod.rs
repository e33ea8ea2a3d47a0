//! The election session: one actor task owns all session state and walks it through
//!
//! ```plot
//! Disconnected -> Connecting -> Connected -> LoadingRoster -> Ready -> Voting -> Voted
//!                                                 \              \        \
//!                                                  +-> Errored <--+--------+
//! ```
//!
//! [`Session`] is the only way in. Its actions are queued to the actor and answered once
//! the transition they started has settled, so a snapshot read right after an action
//! returns already reflects it.

mod dispatch;
mod generation;
mod handle;
mod inner;
mod phase;
mod snapshot;

pub use snapshot::{ConnectionPhase, ElectionSnapshot};

use crate::config::SessionConfig;
use crate::errors::{Error, Result};
use crate::gateway::{Address, CandidateId, ContractGateway, VoteReceipt};
use dispatch::Dispatcher;
use handle::Handle;
use inner::{Inner, LocalTask, MessageHandler};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};
use tracing::{info_span, Instrument};

/// Handle to a running election session. Cheap to clone; the session stops when the
/// last clone is dropped or [`Session::shutdown`] is called.
#[derive(Clone, Debug)]
pub struct Session {
    tasks: mpsc::Sender<LocalTask>,
    snapshot: watch::Receiver<ElectionSnapshot>,
}

impl Session {
    /// Spawns the session on the current tokio runtime.
    pub fn spawn(gateway: ContractGateway, config: SessionConfig) -> Session {
        let (task_sender, task_receiver) = mpsc::channel(config.task_buffer.max(1));
        let (completion_sender, completion_receiver) = mpsc::unbounded_channel();
        let (snapshot_sender, snapshot_receiver) = watch::channel(ElectionSnapshot::default());
        let handle = Handle::builder()
            .gateway(gateway)
            .config(config)
            .dispatcher(Dispatcher::new(completion_sender))
            .snapshot(snapshot_sender)
            .build();
        let message_handler = MessageHandler::new(
            ReceiverStream::new(task_receiver),
            UnboundedReceiverStream::new(completion_receiver),
        );
        tokio::spawn(
            Inner::new(handle, message_handler)
                .run()
                .instrument(info_span!("session")),
        );
        Session {
            tasks: task_sender,
            snapshot: snapshot_receiver,
        }
    }

    /// Authorizes through the wallet and loads the roster and vote status.
    ///
    /// Resolves once the session is `Ready`. Calls made while a connect is in progress
    /// share its outcome. After a failed roster load the roster is fetched again for
    /// the bound identity; otherwise, when already connected, returns that identity.
    pub async fn connect(&self) -> Result<Address> {
        self.request(LocalTask::Connect).await?
    }

    /// Local only. Fails with [`Error::InvalidCandidate`] if `id` is not on the roster
    /// or a vote was already recorded.
    pub async fn select_candidate(&self, id: CandidateId) -> Result<()> {
        self.request(|sender| LocalTask::SelectCandidate { id, sender })
            .await?
    }

    /// Casts the selected candidate. At most one vote is ever in flight: calls made while
    /// one is pending share its outcome.
    ///
    /// On [`Error::VoteRejected`] or [`Error::RemoteWrite`] the session has re-read vote
    /// status before this returns, so the snapshot tells whether the vote landed.
    pub async fn submit_vote(&self) -> Result<VoteReceipt> {
        self.request(LocalTask::SubmitVote).await?
    }

    /// Restarts the recovery of an errored session.
    pub async fn retry(&self) -> Result<()> {
        self.request(LocalTask::Retry).await?
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.request(LocalTask::Disconnect).await
    }

    /// Reports the wallet's current accounts. The session resets when the active one is
    /// not the bound identity.
    pub async fn accounts_changed(&self, accounts: Vec<Address>) -> Result<()> {
        self.request(|sender| LocalTask::AccountsChanged { accounts, sender })
            .await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.request(LocalTask::Shutdown).await
    }

    pub fn snapshot(&self) -> ElectionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ElectionSnapshot> {
        self.snapshot.clone()
    }

    /// Waits until a published snapshot satisfies `predicate`.
    pub async fn wait_until<F>(&self, predicate: F) -> Result<ElectionSnapshot>
    where
        F: FnMut(&ElectionSnapshot) -> bool,
    {
        let mut receiver = self.subscribe();
        let snapshot = receiver
            .wait_for(predicate)
            .await
            .map_err(|_| Error::SessionClosed)?;
        Ok(snapshot.clone())
    }

    async fn request<F, R>(&self, task_constructor: F) -> Result<R>
    where
        F: FnOnce(oneshot::Sender<R>) -> LocalTask,
    {
        let (sender, receiver) = oneshot::channel();
        self.tasks.send(task_constructor(sender)).await?;
        Ok(receiver.await?)
    }
}
