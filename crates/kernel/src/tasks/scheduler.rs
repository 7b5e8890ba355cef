// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use ahash::AHasher;
use rand::Rng;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use mushq_common::model::WorldState;
use mushq_common::tasks::{Pid, QueueError};
use mushq_common::Obj;

use crate::config::Config;
use crate::tasks::ready_q::ReadyQ;
use crate::tasks::semaphore::SemaphoreQ;
use crate::tasks::store::{ContinuationStore, QueueEntry, QueueSlot, adjust_attribute_counter};
use crate::tasks::wait_q::WaitQ;
use crate::tasks::{Continuation, EntryDescription, Priority, QueueDepths, QueueKind};

/// Responsible for holding, ordering and dispatching every deferred command in the world.
/// There should be only one per server. It is driven from a single thread by the event loop,
/// which calls [`Scheduler::next_wakeup`], [`Scheduler::promote_and_sweep`] and
/// [`Scheduler::run_ready`] each time around.
pub struct Scheduler {
    pub(crate) config: Arc<Config>,
    pub(crate) world: Box<dyn WorldState>,
    pub(crate) store: ContinuationStore,
    pub(crate) wait_q: WaitQ,
    pub(crate) semaphore_q: SemaphoreQ,
    pub(crate) ready_q: ReadyQ,
    /// Outstanding entries per owner, for the `queue_max` limit.
    pub(crate) owner_counts: HashMap<Obj, usize, BuildHasherDefault<AHasher>>,
    pub(crate) dequeue_enabled: bool,
}

impl Scheduler {
    pub fn new(config: Arc<Config>, world: Box<dyn WorldState>) -> Self {
        Self {
            store: ContinuationStore::new(config.max_qpid),
            wait_q: WaitQ::default(),
            semaphore_q: SemaphoreQ::default(),
            ready_q: ReadyQ::default(),
            owner_counts: HashMap::default(),
            dequeue_enabled: config.dequeue_enabled,
            world,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn world(&self) -> &dyn WorldState {
        self.world.as_ref()
    }

    pub fn world_mut(&mut self) -> &mut dyn WorldState {
        self.world.as_mut()
    }

    pub fn dequeue_enabled(&self) -> bool {
        self.dequeue_enabled
    }

    pub fn set_dequeue_enabled(&mut self, enabled: bool) {
        self.dequeue_enabled = enabled;
    }

    /// Number of entries `owner` currently has queued.
    pub fn owner_count(&self, owner: Obj) -> usize {
        self.owner_counts.get(&owner).copied().unwrap_or(0)
    }

    fn bump_owner_count(&mut self, owner: Obj) -> usize {
        let count = self.owner_counts.entry(owner).or_insert(0);
        *count += 1;
        *count
    }

    fn drop_owner_count(&mut self, owner: Obj, by: usize) {
        if let Some(count) = self.owner_counts.get_mut(&owner) {
            *count = count.saturating_sub(by);
            if *count == 0 {
                self.owner_counts.remove(&owner);
            }
        }
    }

    /// Charge `actor` for queueing a command and count it against its owner's limit.
    ///
    /// Each command costs `wait_cost`, plus one more penny one time in `machine_cost`. An owner
    /// going over `queue_max` is a runaway: everything it has queued is halted, the actor is
    /// flagged halted and the charge is returned.
    fn reserve(&mut self, actor: Obj) -> Result<(), QueueError> {
        if self.world.is_halted(actor) {
            return Err(QueueError::Halted(actor));
        }

        let mut cost = self.config.wait_cost;
        if cost > 0
            && self.config.machine_cost > 0
            && rand::rng().random_range(0..self.config.machine_cost) == 0
        {
            cost += 1;
        }
        if !self.world.pay(actor, cost) {
            debug!(%actor, cost, "can't afford to queue");
            return Err(QueueError::InsufficientFunds(actor));
        }

        let owner = self.world.owner_of(actor);
        if self.bump_owner_count(owner) > self.config.queue_max {
            warn!(%owner, %actor, limit = self.config.queue_max, "runaway objects, halting owner");
            self.world.give(actor, cost);
            self.halt(Some(owner), None);
            self.world.set_halted(actor, true);
            return Err(QueueError::Runaway(owner));
        }
        Ok(())
    }

    /// Pay for and allocate a new, detached entry.
    pub(crate) fn create_entry(&mut self, continuation: &Continuation<'_>) -> Result<Pid, QueueError> {
        let actor = continuation.actor;
        self.reserve(actor)?;
        match self.store.create(continuation) {
            Some(pid) => {
                trace!(pid, %actor, command = continuation.command, "created queue entry");
                Ok(pid)
            }
            None => {
                warn!(%actor, max_qpid = self.config.max_qpid, "queue is full");
                self.refund(actor);
                Err(QueueError::QueueFull)
            }
        }
    }

    /// Give back an entry's deposit and release its slot against the owner's limit.
    pub(crate) fn refund(&mut self, actor: Obj) {
        self.world.give(actor, self.config.wait_cost);
        let owner = self.world.owner_of(actor);
        self.drop_owner_count(owner, 1);
    }

    pub(crate) fn set_slot(&mut self, pid: Pid, slot: QueueSlot) {
        if let Some(entry) = self.store.get_mut(pid) {
            entry.slot = slot;
        }
    }

    /// Pull an entry out of whichever queues hold it, leaving it in the store. Returns where it
    /// was, or `None` for an unknown PID.
    pub(crate) fn unlink(&mut self, pid: Pid) -> Option<QueueSlot> {
        let entry = self.store.get_mut(pid)?;
        let slot = std::mem::replace(&mut entry.slot, QueueSlot::Detached);
        match slot {
            QueueSlot::Detached => {}
            QueueSlot::Waiting(key) => {
                self.wait_q.remove(key);
            }
            QueueSlot::Blocked { timeout, .. } => {
                self.semaphore_q.remove(pid);
                if let Some(key) = timeout {
                    self.wait_q.remove(key);
                }
            }
            QueueSlot::Ready(priority) => {
                self.ready_q.remove(pid, priority);
            }
        }
        Some(slot)
    }

    /// Unlink an entry and take it out of the store, returning ownership of it along with where
    /// it was queued.
    pub(crate) fn detach(&mut self, pid: Pid) -> Option<(QueueEntry, QueueSlot)> {
        let slot = self.unlink(pid)?;
        let entry = self.store.take(pid)?;
        Some((entry, slot))
    }

    /// Destroy one entry, wherever it is queued. A blocked entry gives back its hold on the
    /// semaphore counter; the deposit goes back to the actor.
    pub fn halt_pid(&mut self, pid: Pid) -> Result<(), QueueError> {
        let (entry, slot) = self.detach(pid).ok_or(QueueError::PidNotFound(pid))?;
        if let QueueSlot::Blocked { semaphore, .. } = slot {
            adjust_attribute_counter(
                self.world.as_mut(),
                entry.actor,
                semaphore.object,
                -1,
                semaphore.counter_attr(),
            );
        }
        self.refund(entry.actor);
        debug!(pid, actor = %entry.actor, "halted queue entry");
        Ok(())
    }

    /// Cancel an entry by PID. False if there was no such entry.
    pub fn cancel(&mut self, pid: Pid) -> bool {
        self.halt_pid(pid).is_ok()
    }

    /// Destroy every entry whose actor is owned by `owner` and/or is `object`. With neither
    /// filter, everything goes. Returns how many entries were removed.
    pub fn halt(&mut self, owner: Option<Obj>, object: Option<Obj>) -> usize {
        let wanted: Vec<Pid> = self
            .store
            .iter()
            .filter(|e| {
                self.world.valid(e.actor)
                    && owner.is_none_or(|o| self.world.owner_of(e.actor) == o)
                    && object.is_none_or(|o| e.actor == o)
            })
            .map(|e| e.pid)
            .collect();

        let halt_all = owner.is_none() && object.is_none();
        let mut per_owner: HashMap<Obj, usize, BuildHasherDefault<AHasher>> = HashMap::default();
        for pid in &wanted {
            let Some((entry, slot)) = self.detach(*pid) else {
                continue;
            };
            if let QueueSlot::Blocked { semaphore, .. } = slot {
                adjust_attribute_counter(
                    self.world.as_mut(),
                    entry.actor,
                    semaphore.object,
                    -1,
                    semaphore.counter_attr(),
                );
            }
            *per_owner.entry(self.world.owner_of(entry.actor)).or_insert(0) += 1;
        }
        let halted = wanted.len();

        if halt_all {
            for (owner, count) in per_owner {
                self.world.give(owner, self.config.wait_cost * count as i64);
            }
            self.owner_counts.clear();
        } else if let Some(target) = owner.or_else(|| object.map(|o| self.world.owner_of(o))) {
            self.world.give(target, self.config.wait_cost * halted as i64);
            if object.is_none() {
                self.owner_counts.remove(&target);
            } else {
                self.drop_owner_count(target, halted);
            }
        }
        debug!(?owner, ?object, halted, "halted queue entries");
        halted
    }

    pub fn queue_depths(&self) -> QueueDepths {
        let timed_semaphores = self
            .semaphore_q
            .iter()
            .filter(|pid| self.store.get(*pid).is_some_and(|e| e.wait_key().is_some()))
            .count();
        QueueDepths {
            player: self.ready_q.len(Priority::High),
            object: self.ready_q.len(Priority::Low),
            wait: self.wait_q.len().saturating_sub(timed_semaphores),
            semaphore: self.semaphore_q.len(),
        }
    }

    /// Whether anything is waiting on a clock, including semaphore waits with a timeout.
    pub fn has_pending_timeouts(&self) -> bool {
        !self.wait_q.is_empty()
    }

    /// Describe the entries in one queue, in the order they will be released. Timed semaphore
    /// waits are listed with the semaphore queue.
    pub fn entries(&self, kind: QueueKind) -> Vec<EntryDescription> {
        let pids: Vec<Pid> = match kind {
            QueueKind::Player => self.ready_q.iter(Priority::High).collect(),
            QueueKind::Object => self.ready_q.iter(Priority::Low).collect(),
            QueueKind::Wait => self
                .wait_q
                .iter()
                .filter(|pid| {
                    self.store
                        .get(*pid)
                        .is_some_and(|e| matches!(e.slot, QueueSlot::Waiting(_)))
                })
                .collect(),
            QueueKind::Semaphore => self.semaphore_q.iter().collect(),
        };
        pids.into_iter()
            .filter_map(|pid| self.store.get(pid))
            .map(|e| describe_entry(e, kind))
            .collect()
    }

    /// Describe a single entry.
    pub fn describe(&self, pid: Pid) -> Option<EntryDescription> {
        let entry = self.store.get(pid)?;
        let queue = match entry.slot {
            QueueSlot::Waiting(_) => QueueKind::Wait,
            QueueSlot::Blocked { .. } => QueueKind::Semaphore,
            QueueSlot::Ready(Priority::High) => QueueKind::Player,
            QueueSlot::Ready(Priority::Low) => QueueKind::Object,
            QueueSlot::Detached => return None,
        };
        Some(describe_entry(entry, queue))
    }

    /// Total live entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }
}

fn describe_entry(entry: &QueueEntry, queue: QueueKind) -> EntryDescription {
    EntryDescription {
        pid: entry.pid,
        queue,
        actor: entry.actor,
        cause: entry.cause,
        command: entry.command.clone(),
        args: entry.args.clone(),
        ready_at: entry.wait_key().map(|k| k.ready_at),
        semaphore: entry.semaphore(),
    }
}
