use crate::config::SessionConfig;
use crate::gateway::roster::load_session_view;
use crate::gateway::{CandidateId, ContractGateway, SignerHandle};
use crate::session::dispatch::{Dispatcher, Outcome};
use crate::session::generation::{Ticket, TicketIssuer};
use crate::session::snapshot::{ConnectionPhase, ElectionSnapshot, SessionView};
use std::fmt::{Debug, Formatter};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::sleep;
use typed_builder::TypedBuilder;

type Reply = Box<dyn FnOnce() + Send>;

/// Everything a phase may touch while it handles a message.
#[derive(TypedBuilder)]
pub struct Handle {
    pub gateway: ContractGateway,
    pub config: SessionConfig,
    #[builder(default)]
    pub view: SessionView,
    #[builder(default)]
    pub tickets: TicketIssuer,
    dispatcher: Dispatcher,
    snapshot: watch::Sender<ElectionSnapshot>,
    /// answers for callers, released only after the snapshot they depend on is published
    #[builder(default)]
    replies: Vec<Reply>,
}

impl Debug for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("view", &self.view)
            .field("tickets", &self.tickets)
            .field("pending_replies", &self.replies.len())
            .finish()
    }
}

/// replies
impl Handle {
    pub fn reply<T: Send + 'static>(&mut self, sender: oneshot::Sender<T>, value: T) {
        self.replies.push(Box::new(move || {
            let _ = sender.send(value);
        }));
    }

    pub fn reply_all<T: Clone + Send + 'static>(
        &mut self,
        senders: Vec<oneshot::Sender<T>>,
        value: T,
    ) {
        for sender in senders {
            self.reply(sender, value.clone());
        }
    }

    pub fn publish(&self, phase: ConnectionPhase) {
        self.snapshot.send_replace(self.view.snapshot(phase));
    }

    pub fn flush_replies(&mut self) {
        for reply in self.replies.drain(..) {
            reply();
        }
    }
}

/// gateway calls, each returns the ticket its completion will carry
impl Handle {
    pub fn bind_signer(&mut self) -> Ticket {
        let ticket = self.tickets.issue();
        let gateway = self.gateway.clone();
        self.dispatcher
            .read(ticket, self.tickets.cancellation(), async move {
                Outcome::Bound(gateway.bind_signer().await)
            });
        ticket
    }

    pub fn load_view(&mut self, signer: &SignerHandle, delay: Option<Duration>) -> Ticket {
        let ticket = self.tickets.issue();
        let gateway = self.gateway.clone();
        let config = self.config.clone();
        let signer = signer.clone();
        self.dispatcher
            .read(ticket, self.tickets.cancellation(), async move {
                if let Some(delay) = delay {
                    sleep(delay).await;
                }
                Outcome::Loaded(load_session_view(&gateway, &signer, &config).await)
            });
        ticket
    }

    pub fn query_vote_status(&mut self, signer: &SignerHandle, delay: Option<Duration>) -> Ticket {
        let ticket = self.tickets.issue();
        let gateway = self.gateway.clone();
        let signer = signer.clone();
        self.dispatcher
            .read(ticket, self.tickets.cancellation(), async move {
                if let Some(delay) = delay {
                    sleep(delay).await;
                }
                Outcome::VoteStatus(gateway.fetch_has_voted(&signer, signer.identity()).await)
            });
        ticket
    }

    pub fn cast_vote(&mut self, signer: &SignerHandle, candidate: CandidateId) -> Ticket {
        let ticket = self.tickets.issue();
        let gateway = self.gateway.clone();
        let signer = signer.clone();
        self.dispatcher.write(ticket, async move {
            Outcome::Cast(gateway.cast_vote(&signer, candidate).await)
        });
        ticket
    }

    /// Forgets the bound identity: outstanding tickets go stale, reads are cancelled.
    pub fn forget_identity(&mut self) {
        self.tickets.new_epoch();
        self.view.reset();
    }

    /// The backoff before attempt number `attempt` (1-based) of a read family.
    pub fn read_backoff(&self, attempt: u32) -> Option<Duration> {
        (attempt > 1).then(|| self.config.retry_backoff())
    }
}
