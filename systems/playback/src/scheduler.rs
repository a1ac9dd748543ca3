//! Cancellable frame scheduling used to pace running playback.

/// Handle identifying one requested frame callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameTicket(u64);

impl FrameTicket {
    /// Wraps a raw ticket identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw identifier of the ticket.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Hands out tickets that become due before the next repaint.
pub trait Scheduler {
    /// Requests a callback before the next repaint.
    fn request_frame(&mut self) -> FrameTicket;

    /// Withdraws a previously requested callback. Unknown tickets are ignored.
    fn cancel(&mut self, ticket: FrameTicket);

    /// Takes the oldest ticket whose frame has arrived, if any.
    fn poll(&mut self) -> Option<FrameTicket>;
}

/// Scheduler whose requested tickets become due on the next [`Scheduler::poll`].
#[derive(Clone, Debug, Default)]
pub struct FrameScheduler {
    next_id: u64,
    pending: Vec<FrameTicket>,
}

impl FrameScheduler {
    /// Creates a scheduler without pending tickets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tickets waiting to become due.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Scheduler for FrameScheduler {
    fn request_frame(&mut self) -> FrameTicket {
        let ticket = FrameTicket::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.pending.push(ticket);
        ticket
    }

    fn cancel(&mut self, ticket: FrameTicket) {
        self.pending.retain(|pending| *pending != ticket);
    }

    fn poll(&mut self) -> Option<FrameTicket> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_are_due_in_request_order() {
        let mut scheduler = FrameScheduler::new();
        let first = scheduler.request_frame();
        let second = scheduler.request_frame();
        assert_ne!(first, second);
        assert_eq!(scheduler.poll(), Some(first));
        assert_eq!(scheduler.poll(), Some(second));
        assert_eq!(scheduler.poll(), None);
    }

    #[test]
    fn cancelled_tickets_never_become_due() {
        let mut scheduler = FrameScheduler::new();
        let ticket = scheduler.request_frame();
        scheduler.cancel(ticket);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.poll(), None);
    }
}
