use tokio::task::AbortHandle;

/// Proof that an operation was started; compared against the slot's current
/// generation before any side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Last-request-wins bookkeeping for one class of operation.
#[derive(Debug, Default)]
pub struct TaskSlot {
    generation: u64,
    pending: Option<u64>,
    handle: Option<AbortHandle>,
}

impl TaskSlot {
    /// Starts a new instance. Any older ticket becomes stale.
    pub fn begin(&mut self) -> Ticket {
        self.generation += 1;
        self.pending = Some(self.generation);
        Ticket(self.generation)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.pending == Some(ticket.0)
    }

    /// Ends `ticket`'s run. Returns false if it was superseded meanwhile.
    pub fn complete(&mut self, ticket: Ticket) -> bool {
        if self.is_current(ticket) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Stores the handle of a spawned run, aborting the previous one.
    pub fn attach(&mut self, handle: AbortHandle) {
        if let Some(previous) = self.handle.replace(handle) {
            previous.abort();
        }
    }

    /// Invalidates whatever is running and aborts its task, if spawned.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.pending = None;
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
