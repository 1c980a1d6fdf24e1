use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::core::types::{PatientId, TicketId};
use crate::error::EngineError;

/// Queue discipline of a resource's waiting line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    /// Pure arrival order; any rank passed to `request` is ignored.
    Fifo,
    /// Ascending rank, lower rank served first; ties in arrival order.
    Priority,
}

/// A claim on one unit of a resource's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    id: TicketId,
}

impl Ticket {
    pub fn id(&self) -> TicketId {
        self.id
    }
}

/// Outcome of a capacity request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// Capacity was free; the caller holds a unit as of this scheduler step.
    Granted(Ticket),
    /// The request joined the waiting queue.
    Queued(Ticket),
}

/// A waiter promoted to holder by a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub ticket: Ticket,
    pub owner: PatientId,
}

#[derive(Debug)]
struct Waiting {
    rank: u8,
    sequence_num: u64,
    ticket: TicketId,
    owner: PatientId,
}

impl PartialEq for Waiting {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.sequence_num == other.sequence_num
    }
}

impl Eq for Waiting {}

impl PartialOrd for Waiting {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waiting {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap; rank first, then arrival order
        other
            .rank
            .cmp(&self.rank)
            .then_with(|| other.sequence_num.cmp(&self.sequence_num))
    }
}

/// Finite-capacity server with a waiting queue.
///
/// `in_use <= capacity` holds at every instant. A grant transfers capacity
/// inside the same scheduler step as the request or release that caused it,
/// so there is no window where a free unit and a waiter coexist.
pub struct Resource {
    name: &'static str,
    discipline: Discipline,
    capacity: u32,
    in_use: u32,
    queue: BinaryHeap<Waiting>,
    /// Tickets currently waiting. The heap may additionally hold entries for
    /// withdrawn tickets; those are skipped when the head is taken.
    queued: HashSet<TicketId>,
    withdrawn: HashSet<TicketId>,
    granted: HashSet<TicketId>,
    next_ticket: TicketId,
    sequence_counter: u64,
}

impl Resource {
    pub fn fifo(name: &'static str, capacity: u32) -> Self {
        Self::new(name, capacity, Discipline::Fifo)
    }

    pub fn priority(name: &'static str, capacity: u32) -> Self {
        Self::new(name, capacity, Discipline::Priority)
    }

    fn new(name: &'static str, capacity: u32, discipline: Discipline) -> Self {
        Self {
            name,
            discipline,
            capacity,
            in_use: 0,
            queue: BinaryHeap::new(),
            queued: HashSet::new(),
            withdrawn: HashSet::new(),
            granted: HashSet::new(),
            next_ticket: 0,
            sequence_counter: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn in_use(&self) -> u32 {
        self.in_use
    }

    /// Number of requests currently waiting (withdrawn tickets excluded).
    pub fn queue_len(&self) -> usize {
        self.queued.len()
    }

    /// Claim one unit of capacity, or join the waiting queue.
    ///
    /// `rank` orders the queue for priority resources and is ignored for
    /// FIFO ones. Lower rank is served first.
    pub fn request(&mut self, owner: PatientId, rank: u8) -> Acquired {
        let ticket = self.mint_ticket();
        if self.in_use < self.capacity {
            self.in_use += 1;
            self.granted.insert(ticket.id);
            debug_assert!(self.in_use <= self.capacity);
            return Acquired::Granted(ticket);
        }

        let rank = match self.discipline {
            Discipline::Fifo => 0,
            Discipline::Priority => rank,
        };
        self.queue.push(Waiting {
            rank,
            sequence_num: self.sequence_counter,
            ticket: ticket.id,
            owner,
        });
        self.sequence_counter += 1;
        self.queued.insert(ticket.id);
        Acquired::Queued(ticket)
    }

    /// Return a held unit of capacity.
    ///
    /// If anyone is waiting, the head of the queue takes over the unit and is
    /// returned so the caller can schedule its wakeup. Releasing a ticket
    /// that is not currently granted is an invariant fault.
    pub fn release(&mut self, ticket: Ticket) -> Result<Option<Grant>, EngineError> {
        if !self.granted.remove(&ticket.id) {
            return Err(EngineError::ReleaseNotGranted {
                resource: self.name,
                ticket: ticket.id,
            });
        }

        if let Some(next) = self.take_head() {
            // Capacity hands over directly; in_use is unchanged
            self.granted.insert(next.ticket);
            return Ok(Some(Grant {
                ticket: Ticket { id: next.ticket },
                owner: next.owner,
            }));
        }

        self.in_use -= 1;
        debug_assert!(self.in_use <= self.capacity);
        Ok(None)
    }

    /// Remove a still-waiting request from the queue (abandonment).
    ///
    /// Withdrawing a ticket that was already granted, withdrawn, or never
    /// issued is an invariant fault.
    pub fn withdraw(&mut self, ticket: Ticket) -> Result<(), EngineError> {
        if !self.queued.remove(&ticket.id) {
            return Err(EngineError::WithdrawNotQueued {
                resource: self.name,
                ticket: ticket.id,
            });
        }
        self.withdrawn.insert(ticket.id);
        Ok(())
    }

    fn mint_ticket(&mut self) -> Ticket {
        let ticket = Ticket {
            id: self.next_ticket,
        };
        self.next_ticket += 1;
        ticket
    }

    fn take_head(&mut self) -> Option<Waiting> {
        while let Some(waiting) = self.queue.pop() {
            if self.withdrawn.remove(&waiting.ticket) {
                continue;
            }
            self.queued.remove(&waiting.ticket);
            return Some(waiting);
        }
        None
    }
}
