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

//! Semaphore waits (`@wait <obj>[/<attr>]`) and their release by `@notify` and `@drain`.

use ahash::AHasher;
use indexmap::IndexSet;
use std::hash::BuildHasherDefault;
use strum::Display;
use tracing::{debug, trace};

use mushq_common::tasks::{Pid, QueueError};
use mushq_common::util::parse_int_strict;
use mushq_common::{AttrId, Obj};

use crate::tasks::scheduler::Scheduler;
use crate::tasks::store::{QueueSlot, adjust_attribute_counter};
use crate::tasks::{Continuation, Semaphore, Timestamp};

/// Blocked PIDs in the order they started waiting.
#[derive(Default)]
pub(crate) struct SemaphoreQ {
    waiting: IndexSet<Pid, BuildHasherDefault<AHasher>>,
}

impl SemaphoreQ {
    pub(crate) fn push(&mut self, pid: Pid) {
        self.waiting.insert(pid);
    }

    pub(crate) fn remove(&mut self, pid: Pid) -> bool {
        self.waiting.shift_remove(&pid)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        self.waiting.iter().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.waiting.len()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Display)]
pub enum ReleaseMode {
    /// Run up to `count` waiters.
    Notify,
    /// Throw away every waiter, refunding them.
    Drain,
}

impl Scheduler {
    /// Block a command on `semaphore`, optionally giving up after `timeout` seconds.
    ///
    /// The semaphore's counter goes up by one. If that leaves it at or below zero, it had already
    /// been notified ahead of time and the command is made ready at once instead of blocking.
    pub fn semaphore_wait(
        &mut self,
        continuation: Continuation<'_>,
        semaphore: Semaphore,
        timeout: Option<i64>,
        now: Timestamp,
    ) -> Result<Pid, QueueError> {
        let pid = self.create_entry(&continuation)?;
        let count = adjust_attribute_counter(
            self.world.as_mut(),
            continuation.actor,
            semaphore.object,
            1,
            semaphore.counter_attr(),
        );
        if count <= 0 {
            trace!(pid, object = %semaphore.object, count, "semaphore already notified");
            self.enqueue_ready(pid);
            return Ok(pid);
        }

        let timeout = timeout
            .filter(|secs| *secs != 0)
            .map(|secs| self.wait_q.insert(now.plus_seconds(secs), pid));
        self.semaphore_q.push(pid);
        self.set_slot(pid, QueueSlot::Blocked { semaphore, timeout });
        trace!(pid, object = %semaphore.object, count, "blocked on semaphore");
        Ok(pid)
    }

    /// Release waiters on `object`. An unspecified `attr` releases waiters on any attribute of
    /// the object; a specific one releases only waiters on that attribute, and only if that
    /// attribute's counter is currently positive.
    ///
    /// In [`ReleaseMode::Notify`] up to `count` waiters are made ready, oldest first, and the
    /// counter drops by `count`. In [`ReleaseMode::Drain`] all of them are destroyed with their
    /// cost refunded, and the counter is cleared.
    ///
    /// Returns how many waiters were released or drained.
    pub fn release(
        &mut self,
        notifier: Obj,
        object: Obj,
        attr: AttrId,
        mode: ReleaseMode,
        count: u32,
    ) -> usize {
        let counter_attr = attr.or_semaphore();
        let gate_open = attr.is_unspecified()
            || self
                .world
                .attribute(object, attr)
                .and_then(|v| parse_int_strict(&v))
                .is_some_and(|v| v > 0);

        let mut released = 0;
        if gate_open {
            let matching: Vec<Pid> = self
                .semaphore_q
                .iter()
                .filter(|pid| {
                    self.store
                        .get(*pid)
                        .and_then(|e| e.semaphore())
                        .is_some_and(|s| s.released_by(object, attr))
                })
                .collect();

            for pid in matching {
                if mode == ReleaseMode::Notify && released >= count as usize {
                    break;
                }
                match mode {
                    ReleaseMode::Notify => {
                        self.unlink(pid);
                        self.enqueue_ready(pid);
                    }
                    ReleaseMode::Drain => {
                        if let Some((entry, _)) = self.detach(pid) {
                            self.refund(entry.actor);
                        }
                    }
                }
                released += 1;
            }
        }

        match mode {
            ReleaseMode::Notify => {
                let delta = i32::try_from(count).map_or(i32::MIN, |c| -c);
                adjust_attribute_counter(self.world.as_mut(), notifier, object, delta, counter_attr);
            }
            ReleaseMode::Drain => {
                let owner = self.world.owner_of(notifier);
                self.world.set_attribute(object, counter_attr, None, owner);
            }
        }
        debug!(%object, %mode, count, released, "released semaphore");
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SchedulerFixture;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_over_notified_runs_at_once() {
        let mut f = SchedulerFixture::new();
        let (player, room) = (f.player, f.thing);
        let sem = Semaphore::new(room, AttrId::SEMAPHORE);

        assert_eq!(
            f.scheduler
                .release(player, room, AttrId::SEMAPHORE, ReleaseMode::Notify, 1),
            0
        );
        assert_eq!(f.counter(room, AttrId::SEMAPHORE), Some("-1".to_string()));

        f.scheduler
            .semaphore_wait(Continuation::new(player, player, "go"), sem, None, f.now)
            .unwrap();
        let depths = f.scheduler.queue_depths();
        assert_eq!((depths.player, depths.semaphore), (1, 0));
        assert_eq!(f.counter(room, AttrId::SEMAPHORE), None);
    }

    #[test]
    fn test_notify_on_closed_gate_releases_nothing() {
        let mut f = SchedulerFixture::new();
        let (player, room) = (f.player, f.thing);
        let sem = Semaphore::new(room, AttrId::SEMAPHORE);
        f.scheduler
            .semaphore_wait(Continuation::new(player, player, "go"), sem, None, f.now)
            .unwrap();

        // Someone zeroed the counter behind the scheduler's back.
        f.set_counter(room, AttrId::SEMAPHORE, None);
        assert_eq!(
            f.scheduler
                .release(player, room, AttrId::SEMAPHORE, ReleaseMode::Notify, 1),
            0
        );
        assert_eq!(f.scheduler.queue_depths().semaphore, 1);
        assert_eq!(f.counter(room, AttrId::SEMAPHORE), Some("-1".to_string()));
    }

    #[test]
    fn test_drain_refunds() {
        let mut f = SchedulerFixture::new();
        let (player, room) = (f.player, f.thing);
        let sem = Semaphore::new(room, AttrId::SEMAPHORE);
        let before = f.pennies(player);
        for _ in 0..3 {
            f.scheduler
                .semaphore_wait(Continuation::new(player, player, "go"), sem, Some(60), f.now)
                .unwrap();
        }
        assert_eq!(f.scheduler.queue_depths().wait, 0);
        assert_eq!(f.scheduler.owner_count(player), 3);

        assert_eq!(
            f.scheduler
                .release(player, room, AttrId::SEMAPHORE, ReleaseMode::Drain, 1),
            3
        );
        let depths = f.scheduler.queue_depths();
        assert_eq!((depths.semaphore, depths.wait), (0, 0));
        assert_eq!(f.scheduler.owner_count(player), 0);
        assert_eq!(f.pennies(player), before);
        assert_eq!(f.counter(room, AttrId::SEMAPHORE), None);
    }

    #[test]
    fn test_timed_semaphore_expires() {
        let mut f = SchedulerFixture::new();
        let (player, room) = (f.player, f.thing);
        let sem = Semaphore::new(room, AttrId::SEMAPHORE);
        let now = f.now;
        f.scheduler
            .semaphore_wait(Continuation::new(player, player, "go"), sem, Some(10), now)
            .unwrap();
        assert_eq!(f.counter(room, AttrId::SEMAPHORE), Some("1".to_string()));

        assert_eq!(f.scheduler.promote_and_sweep(now.plus_seconds(10)), 1);
        let depths = f.scheduler.queue_depths();
        assert_eq!((depths.player, depths.semaphore, depths.wait), (1, 0, 0));
        assert_eq!(f.counter(room, AttrId::SEMAPHORE), None);
    }
}
