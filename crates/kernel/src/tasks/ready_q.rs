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

use std::collections::VecDeque;

use tracing::{debug, trace};

use mushq_common::tasks::Pid;

use crate::tasks::interpreter::{CommandInterpreter, Invocation};
use crate::tasks::scheduler::Scheduler;
use crate::tasks::store::{QueueEntry, QueueSlot};
use crate::tasks::Priority;

/// The player (high) and object (low) run queues.
#[derive(Default)]
pub(crate) struct ReadyQ {
    high: VecDeque<Pid>,
    low: VecDeque<Pid>,
}

impl ReadyQ {
    fn queue_mut(&mut self, priority: Priority) -> &mut VecDeque<Pid> {
        match priority {
            Priority::High => &mut self.high,
            Priority::Low => &mut self.low,
        }
    }

    pub(crate) fn push(&mut self, pid: Pid, priority: Priority) {
        self.queue_mut(priority).push_back(pid);
    }

    /// Next to run: the head of the player queue, or failing that of the object queue.
    pub(crate) fn pop(&mut self) -> Option<Pid> {
        self.high.pop_front().or_else(|| self.low.pop_front())
    }

    pub(crate) fn remove(&mut self, pid: Pid, priority: Priority) -> bool {
        let queue = self.queue_mut(priority);
        match queue.iter().position(|p| *p == pid) {
            Some(idx) => queue.remove(idx).is_some(),
            None => false,
        }
    }

    /// Move the whole object queue onto the tail of the player queue, returning what moved.
    pub(crate) fn promote_low(&mut self) -> Vec<Pid> {
        let moved: Vec<Pid> = self.low.drain(..).collect();
        self.high.extend(moved.iter().copied());
        moved
    }

    pub(crate) fn iter(&self, priority: Priority) -> impl Iterator<Item = Pid> + '_ {
        match priority {
            Priority::High => self.high.iter(),
            Priority::Low => self.low.iter(),
        }
        .copied()
    }

    pub(crate) fn is_empty_high(&self) -> bool {
        self.high.is_empty()
    }

    pub(crate) fn is_empty_low(&self) -> bool {
        self.low.is_empty()
    }

    pub(crate) fn len(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high.len(),
            Priority::Low => self.low.len(),
        }
    }
}

impl Scheduler {
    /// Make a detached entry runnable. Commands caused by a player go on the player queue,
    /// anything else on the object queue.
    pub(crate) fn enqueue_ready(&mut self, pid: Pid) {
        let Some(entry) = self.store.get_mut(pid) else {
            return;
        };
        let priority = if self.world.is_player(entry.cause) {
            Priority::High
        } else {
            Priority::Low
        };
        entry.slot = QueueSlot::Ready(priority);
        self.ready_q.push(pid, priority);
        trace!(pid, %priority, "ready");
    }

    pub(crate) fn promote_object_queue(&mut self) {
        for pid in self.ready_q.promote_low() {
            self.set_slot(pid, QueueSlot::Ready(Priority::High));
        }
    }

    /// Run up to `max_commands` ready commands, all of the player queue before any of the object
    /// queue. Does nothing while dequeueing is disabled. Returns how many entries were taken off
    /// the ready queues, including any that were skipped because their actor was halted or gone.
    pub fn run_ready(
        &mut self,
        max_commands: usize,
        interpreter: &mut dyn CommandInterpreter,
    ) -> usize {
        if !self.dequeue_enabled {
            return 0;
        }
        self.run_batch(max_commands, interpreter)
    }

    pub(crate) fn run_batch(
        &mut self,
        max_commands: usize,
        interpreter: &mut dyn CommandInterpreter,
    ) -> usize {
        let mut processed = 0;
        while processed < max_commands {
            let Some(pid) = self.ready_q.pop() else {
                break;
            };
            self.set_slot(pid, QueueSlot::Detached);
            let Some(entry) = self.store.take(pid) else {
                continue;
            };
            processed += 1;
            self.run_entry(entry, interpreter);
        }
        if processed > 0 {
            trace!(processed, "ran ready batch");
        }
        processed
    }

    fn run_entry(&mut self, entry: QueueEntry, interpreter: &mut dyn CommandInterpreter) {
        let actor = entry.actor;
        if !self.world.valid(actor) {
            debug!(pid = entry.pid, %actor, "discarding entry for invalid actor");
            return;
        }
        self.refund(actor);
        if self.world.is_halted(actor) {
            debug!(pid = entry.pid, %actor, "skipping entry for halted actor");
            return;
        }
        let invocation = Invocation {
            pid: entry.pid,
            actor,
            cause: entry.cause,
            command: entry.command,
            args: entry.args,
            registers: entry.registers.unwrap_or_default(),
        };
        interpreter.execute(self, invocation);
    }
}
