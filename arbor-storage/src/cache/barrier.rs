//! Drain-and-exclude arbitration for the TTL cache.
//!
//! Normal operations enter through [`DrainBarrier::enter`] and run in
//! parallel with each other. An exclusive request ([`DrainBarrier::exclusive`])
//! closes admission, waits for the in-flight count to reach zero, and then
//! holds the barrier alone. Exclusive requests are granted strictly in
//! arrival order; admission reopens only when none are queued.
//!
//! ```text
//!            enter()                  exclusive() queued
//!   Idle ─────────────→ Busy ─────────────────────────→ Draining
//!    ↑                   │ last guard dropped             │ in_flight == 0
//!    └───────────────────┘                                ↓
//!    ↑                                              holder runs alone
//!    └──────────── queue empty after release ─────────────┘
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

/// Observable state of the barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierStatus {
    /// No operation in flight and no exclusive request pending.
    Idle,
    /// At least one normal operation in flight.
    Busy,
    /// An exclusive request is waiting for, or holding, exclusivity.
    Draining,
}

#[derive(Debug, Default)]
struct BarrierState {
    in_flight: usize,
    queue: VecDeque<u64>,
    holder: Option<u64>,
    next_ticket: u64,
}

impl BarrierState {
    fn status(&self) -> BarrierStatus {
        if self.holder.is_some() || !self.queue.is_empty() {
            BarrierStatus::Draining
        } else if self.in_flight > 0 {
            BarrierStatus::Busy
        } else {
            BarrierStatus::Idle
        }
    }

    fn admits(&self) -> bool {
        self.status() != BarrierStatus::Draining
    }

    /// Hand the barrier to the oldest queued request if it is free.
    fn try_grant(&mut self) -> bool {
        if self.holder.is_some() || self.in_flight > 0 {
            return false;
        }
        match self.queue.pop_front() {
            Some(ticket) => {
                self.holder = Some(ticket);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<BarrierState>,
    changed: Notify,
}

impl Shared {
    // Guards release from Drop, so a poisoned lock is recovered rather than
    // propagated: the state is a counter and a queue, both always valid.
    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Arbitrates between parallel normal operations and exclusive sweeps.
#[derive(Debug, Clone, Default)]
pub struct DrainBarrier {
    shared: Arc<Shared>,
}

impl DrainBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> BarrierStatus {
        self.shared.lock().status()
    }

    /// Number of normal operations currently admitted.
    pub fn in_flight(&self) -> usize {
        self.shared.lock().in_flight
    }

    /// Number of exclusive requests queued behind the current holder.
    pub fn pending_exclusive(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Register a normal operation, waiting while the barrier is draining.
    pub async fn enter(&self) -> AdmissionGuard {
        loop {
            let notified = self.shared.changed.notified();
            {
                let mut state = self.shared.lock();
                if state.admits() {
                    state.in_flight += 1;
                    return AdmissionGuard {
                        shared: Arc::clone(&self.shared),
                    };
                }
            }
            notified.await;
        }
    }

    /// Request exclusivity and wait until it is granted.
    pub async fn exclusive(&self) -> ExclusiveGuard {
        let (ticket, granted) = {
            let mut state = self.shared.lock();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.queue.push_back(ticket);
            (ticket, state.try_grant())
        };
        if granted {
            self.shared.changed.notify_waiters();
        }

        // Constructed before waiting so that a dropped waiter leaves the queue.
        let guard = ExclusiveGuard {
            shared: Arc::clone(&self.shared),
            ticket,
        };
        loop {
            let notified = self.shared.changed.notified();
            if self.shared.lock().holder == Some(ticket) {
                return guard;
            }
            notified.await;
        }
    }
}

/// Proof of admission for a normal operation. Dropping it deregisters.
#[derive(Debug)]
pub struct AdmissionGuard {
    shared: Arc<Shared>,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        let granted = {
            let mut state = self.shared.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.try_grant()
        };
        if granted {
            self.shared.changed.notify_waiters();
        }
    }
}

/// Exclusive hold on the barrier. Dropping it passes exclusivity to the
/// next queued request or reopens admission.
#[derive(Debug)]
pub struct ExclusiveGuard {
    shared: Arc<Shared>,
    ticket: u64,
}

impl Drop for ExclusiveGuard {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            if state.holder == Some(self.ticket) {
                state.holder = None;
            } else {
                state.queue.retain(|ticket| *ticket != self.ticket);
            }
            state.try_grant();
        }
        self.shared.changed.notify_waiters();
    }
}
