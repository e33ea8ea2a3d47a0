use crate::errors::Result;
use crate::gateway::{Address, CandidateId, VoteReceipt};
use crate::session::dispatch::Completion;
use crate::session::handle::Handle;
use crate::session::phase::Phase;
use derive_new::new;
use futures::{future, pin_mut, stream, StreamExt};
use futures_concurrency::stream::Merge;
use std::fmt::{Debug, Formatter};
use tokio::sync::oneshot;
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};
use tracing::info;

/// Requests from [`Session`](crate::session::Session) handles.
pub enum LocalTask {
    Connect(oneshot::Sender<Result<Address>>),
    SelectCandidate {
        id: CandidateId,
        sender: oneshot::Sender<Result<()>>,
    },
    SubmitVote(oneshot::Sender<Result<VoteReceipt>>),
    Retry(oneshot::Sender<Result<()>>),
    Disconnect(oneshot::Sender<()>),
    AccountsChanged {
        accounts: Vec<Address>,
        sender: oneshot::Sender<()>,
    },
    Shutdown(oneshot::Sender<()>),
}

impl Debug for LocalTask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect(_) => f.write_str("Connect"),
            Self::SelectCandidate { id, .. } => f.debug_tuple("SelectCandidate").field(id).finish(),
            Self::SubmitVote(_) => f.write_str("SubmitVote"),
            Self::Retry(_) => f.write_str("Retry"),
            Self::Disconnect(_) => f.write_str("Disconnect"),
            Self::AccountsChanged { accounts, .. } => {
                f.debug_tuple("AccountsChanged").field(accounts).finish()
            }
            Self::Shutdown(_) => f.write_str("Shutdown"),
        }
    }
}

pub(crate) enum Message {
    Local(LocalTask),
    Completion(Completion),
    /// every handle is gone, nothing can reach the session any more
    Closed,
}

#[derive(new)]
pub(crate) struct MessageHandler {
    local_tasks: ReceiverStream<LocalTask>,
    completions: UnboundedReceiverStream<Completion>,
}

impl Debug for MessageHandler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHandler").finish()
    }
}

impl MessageHandler {
    pub async fn next_message(&mut self) -> Message {
        let local_tasks = self
            .local_tasks
            .by_ref()
            .map(Message::Local)
            .chain(stream::once(future::ready(Message::Closed)));
        let completions = self.completions.by_ref().map(Message::Completion);
        let messages = (local_tasks, completions).merge();
        pin_mut!(messages);
        messages.next().await.unwrap_or(Message::Closed)
    }
}

#[derive(new)]
pub(crate) struct Inner {
    handle: Handle,
    message_handler: MessageHandler,
}

impl Inner {
    /// Drives the phases until shutdown. The snapshot is published after every step,
    /// before any caller waiting on that step is answered.
    pub async fn run(mut self) {
        let mut phase = Phase::Disconnected;
        self.handle.publish(phase.public());
        while !phase.is_shutdown() {
            phase = phase
                .progress(&mut self.handle, &mut self.message_handler)
                .await;
            self.handle.publish(phase.public());
            self.handle.flush_replies();
        }
        info!("session stopped");
    }
}
