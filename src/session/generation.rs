use derive_new::new;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use uuid::Uuid;

/// Tags one dispatched gateway call. A completion is applied only if the phase that
/// is current when it arrives still awaits exactly this ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, new)]
pub struct Ticket {
    pub epoch: Uuid,
    pub serial: u64,
}

/// Issues tickets for the current epoch. An epoch spans one bound identity; starting a
/// new one invalidates every ticket issued before and cancels the reads still running.
#[derive(Debug)]
pub struct TicketIssuer {
    epoch: Uuid,
    serial: u64,
    cancellation: CancellationToken,
}

impl Default for TicketIssuer {
    fn default() -> Self {
        Self {
            epoch: Uuid::new_v4(),
            serial: 0,
            cancellation: CancellationToken::new(),
        }
    }
}

impl TicketIssuer {
    pub fn issue(&mut self) -> Ticket {
        self.serial += 1;
        trace!(epoch = %self.epoch, serial = self.serial, "issue ticket");
        Ticket::new(self.epoch, self.serial)
    }

    pub fn new_epoch(&mut self) {
        self.cancellation.cancel();
        *self = Self::default();
        trace!(epoch = %self.epoch, "new epoch");
    }

    pub fn is_current_epoch(&self, ticket: &Ticket) -> bool {
        ticket.epoch == self.epoch
    }

    /// Cancelled when the epoch ends.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}
