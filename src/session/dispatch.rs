use crate::errors::Result;
use crate::gateway::{RosterLoad, SignerHandle, VoteReceipt};
use crate::session::generation::Ticket;
use derive_new::new;
use std::future::Future;
use tokio::select;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{trace, Instrument};

#[derive(Debug)]
pub enum Outcome {
    Bound(Result<SignerHandle>),
    Loaded(Result<RosterLoad>),
    Cast(Result<VoteReceipt>),
    VoteStatus(Result<bool>),
}

#[derive(Debug, new)]
pub struct Completion {
    pub ticket: Ticket,
    pub outcome: Outcome,
}

/// Runs gateway calls off the session loop and hands their outcomes back as
/// [`Completion`]s, so the loop keeps serving local tasks while calls are pending.
#[derive(Clone, Debug, new)]
pub struct Dispatcher {
    sender: UnboundedSender<Completion>,
}

impl Dispatcher {
    /// The call is dropped unanswered once `cancellation` fires.
    pub fn read<F>(&self, ticket: Ticket, cancellation: CancellationToken, call: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        self.spawn(ticket, async move {
            select! {
                _ = cancellation.cancelled() => None,
                outcome = call => Some(outcome),
            }
        });
    }

    /// Writes are never cancelled: once submitted they may land regardless of what the
    /// session does next, and their completion is judged by its ticket alone.
    pub fn write<F>(&self, ticket: Ticket, call: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        self.spawn(ticket, async move { Some(call.await) });
    }

    fn spawn<F>(&self, ticket: Ticket, call: F)
    where
        F: Future<Output = Option<Outcome>> + Send + 'static,
    {
        let sender = self.sender.clone();
        tokio::spawn(
            async move {
                match call.await {
                    Some(outcome) => {
                        if sender.send(Completion::new(ticket, outcome)).is_err() {
                            trace!("session stopped, completion dropped");
                        }
                    }
                    None => trace!("call cancelled"),
                }
            }
            .instrument(tracing::trace_span!("dispatch", serial = ticket.serial)),
        );
    }
}
