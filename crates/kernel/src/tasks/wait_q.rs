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

//! The timed wait queue, and the once-a-second sweep which promotes what has come due.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, trace};

use mushq_common::tasks::{Pid, QueueError};

use crate::tasks::scheduler::Scheduler;
use crate::tasks::store::{QueueSlot, adjust_attribute_counter};
use crate::tasks::{Continuation, Timestamp};

/// Position in the wait queue. Entries sharing a wake time keep the order they were queued in.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct WaitKey {
    pub(crate) ready_at: Timestamp,
    seq: u64,
}

/// PIDs ordered by wake time.
#[derive(Default)]
pub(crate) struct WaitQ {
    entries: BTreeMap<WaitKey, Pid>,
    next_seq: u64,
}

impl WaitQ {
    pub(crate) fn insert(&mut self, ready_at: Timestamp, pid: Pid) -> WaitKey {
        let key = WaitKey {
            ready_at,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(key, pid);
        key
    }

    pub(crate) fn remove(&mut self, key: WaitKey) -> Option<Pid> {
        self.entries.remove(&key)
    }

    pub(crate) fn earliest(&self) -> Option<Timestamp> {
        self.entries.keys().next().map(|k| k.ready_at)
    }

    /// Pop the head of the queue if it is due at `now`.
    pub(crate) fn pop_expired(&mut self, now: Timestamp) -> Option<Pid> {
        let entry = self.entries.first_entry()?;
        if entry.key().ready_at > now {
            return None;
        }
        Some(entry.remove())
    }

    /// Take everything out, in wake order.
    pub(crate) fn drain(&mut self) -> Vec<(WaitKey, Pid)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        self.entries.values().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How `@wait/pid` moves an entry's wake time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WaitAdjustment {
    /// An absolute epoch time. Negative means "now".
    Until(i64),
    /// Seconds from now.
    FromNow(i64),
    /// Seconds added to (or, if negative, taken off) the entry's current wake time.
    Relative(i64),
}

impl WaitAdjustment {
    fn resolve(self, current: Option<Timestamp>, now: Timestamp) -> Timestamp {
        match self {
            WaitAdjustment::Until(at) if at < 0 => now,
            WaitAdjustment::Until(at) => Timestamp(at),
            WaitAdjustment::FromNow(delta) => {
                let at = now.plus_seconds(delta);
                if at.0 < 0 { Timestamp::FAR_FUTURE } else { at }
            }
            WaitAdjustment::Relative(delta) => {
                let at = current.unwrap_or(now).plus_seconds(delta);
                match (at.0 < 0, delta < 0) {
                    (false, _) => at,
                    (true, true) => now,
                    (true, false) => Timestamp::FAR_FUTURE,
                }
            }
        }
    }
}

impl Scheduler {
    /// Queue a command to run after `delay` seconds. A delay of zero or less puts it straight on
    /// the ready queue.
    pub fn wait(
        &mut self,
        continuation: Continuation<'_>,
        delay: i64,
        now: Timestamp,
    ) -> Result<Pid, QueueError> {
        let pid = self.create_entry(&continuation)?;
        if delay <= 0 {
            self.enqueue_ready(pid);
        } else {
            self.enqueue_timed(pid, now.plus_seconds(delay));
        }
        Ok(pid)
    }

    /// Place a detached entry in the wait queue.
    pub(crate) fn enqueue_timed(&mut self, pid: Pid, ready_at: Timestamp) {
        let Some(entry) = self.store.get_mut(pid) else {
            return;
        };
        debug_assert_eq!(entry.slot, QueueSlot::Detached);
        let key = self.wait_q.insert(ready_at, pid);
        entry.slot = QueueSlot::Waiting(key);
        trace!(pid, %ready_at, "queued timed wait");
    }

    /// How long the event loop may block before something here needs attention.
    ///
    /// Zero if a player-caused command is ready, one second if only object-caused work is ready.
    /// Otherwise one second short of the earliest timed wake-up, never less than one second and
    /// capped by the configured maximum.
    pub fn next_wakeup(&self, now: Timestamp) -> Duration {
        if !self.ready_q.is_empty_high() {
            return Duration::ZERO;
        }
        if !self.ready_q.is_empty_low() {
            return Duration::from_secs(1);
        }
        let max = self.config.max_wakeup().as_secs();
        let Some(earliest) = self.wait_q.earliest() else {
            return Duration::from_secs(max.saturating_sub(1).max(1));
        };
        let until = earliest.seconds_since(now);
        if until <= 2 {
            return Duration::from_secs(1);
        }
        let until = u64::try_from(until).unwrap_or(max).min(max);
        Duration::from_secs(until.saturating_sub(1).max(1))
    }

    /// The once-a-second sweep: moves leftover object-queue work behind the player queue (if so
    /// configured), then promotes every timed wait due at `now` in wake order. Timed semaphore
    /// waits that come due give up their semaphore. Does nothing while dequeueing is disabled.
    ///
    /// Returns the number of entries promoted from the wait queue.
    pub fn promote_and_sweep(&mut self, now: Timestamp) -> usize {
        if !self.dequeue_enabled {
            return 0;
        }
        self.sweep(now, self.config.promote_object_queue)
    }

    pub(crate) fn sweep(&mut self, now: Timestamp, promote_low: bool) -> usize {
        if promote_low {
            self.promote_object_queue();
        }

        let mut promoted = 0;
        while let Some(pid) = self.wait_q.pop_expired(now) {
            let Some(entry) = self.store.get_mut(pid) else {
                continue;
            };
            let actor = entry.actor;
            let previous = std::mem::replace(&mut entry.slot, QueueSlot::Detached);
            if let QueueSlot::Blocked { semaphore, .. } = previous {
                self.semaphore_q.remove(pid);
                adjust_attribute_counter(
                    self.world.as_mut(),
                    actor,
                    semaphore.object,
                    -1,
                    semaphore.counter_attr(),
                );
                trace!(pid, object = %semaphore.object, "semaphore wait timed out");
            }
            self.enqueue_ready(pid);
            promoted += 1;
        }
        if promoted > 0 {
            trace!(promoted, %now, "promoted timed waits");
        }
        promoted
    }

    /// Change when an entry wakes up, returning the new wake time.
    ///
    /// Entries on a ready queue are pulled back into the wait queue. Semaphore waits can only be
    /// moved if they were given a timeout, and stay blocked on their semaphore.
    pub fn adjust_wait(
        &mut self,
        pid: Pid,
        adjustment: WaitAdjustment,
        now: Timestamp,
    ) -> Result<Timestamp, QueueError> {
        let entry = self.store.get(pid).ok_or(QueueError::PidNotFound(pid))?;
        let slot = entry.slot;
        let ready_at = adjustment.resolve(entry.wait_key().map(|k| k.ready_at), now);

        match slot {
            QueueSlot::Blocked { timeout: None, .. } => {
                return Err(QueueError::NoWaitTime(pid));
            }
            QueueSlot::Waiting(key) => {
                self.wait_q.remove(key);
                let key = self.wait_q.insert(ready_at, pid);
                self.set_slot(pid, QueueSlot::Waiting(key));
            }
            QueueSlot::Blocked {
                semaphore,
                timeout: Some(key),
            } => {
                self.wait_q.remove(key);
                let key = self.wait_q.insert(ready_at, pid);
                self.set_slot(
                    pid,
                    QueueSlot::Blocked {
                        semaphore,
                        timeout: Some(key),
                    },
                );
            }
            QueueSlot::Ready(_) | QueueSlot::Detached => {
                self.unlink(pid);
                self.enqueue_timed(pid, ready_at);
            }
        }
        debug!(pid, %ready_at, "adjusted wait time");
        Ok(ready_at)
    }

    /// Move an entry to wake at `ready_at`. False if there is no such entry or it can't be moved.
    pub fn reschedule(&mut self, pid: Pid, ready_at: Timestamp, now: Timestamp) -> bool {
        self.adjust_wait(pid, WaitAdjustment::Until(ready_at.0), now)
            .is_ok()
    }

    /// Advance the clock of every timed wait by `seconds` (or turn it back, if negative), then
    /// run a sweep. The sweep runs even while dequeueing is disabled, and always appends the
    /// object queue to the player queue.
    pub fn warp(&mut self, seconds: i64, now: Timestamp) -> usize {
        for (key, pid) in self.wait_q.drain() {
            let new_key = self
                .wait_q
                .insert(key.ready_at.plus_seconds(seconds.saturating_neg()), pid);
            let Some(entry) = self.store.get_mut(pid) else {
                continue;
            };
            match &mut entry.slot {
                QueueSlot::Waiting(k) => *k = new_key,
                QueueSlot::Blocked {
                    timeout: Some(k), ..
                } => *k = new_key,
                _ => {}
            }
        }
        debug!(seconds, "warped wait queue");
        self.sweep(now, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tasks::QueueKind;
    use crate::testing::SchedulerFixture;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wait_key_ties_keep_queue_order() {
        let mut q = WaitQ::default();
        q.insert(Timestamp(10), 1);
        q.insert(Timestamp(5), 2);
        q.insert(Timestamp(10), 3);

        let mut order = vec![];
        while let Some(pid) = q.pop_expired(Timestamp(10)) {
            order.push(pid);
        }
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn test_resolve_adjustments() {
        let now = Timestamp(1000);
        let current = Some(Timestamp(1010));
        assert_eq!(WaitAdjustment::Until(-1).resolve(current, now), now);
        assert_eq!(
            WaitAdjustment::Until(2000).resolve(current, now),
            Timestamp(2000)
        );
        assert_eq!(
            WaitAdjustment::FromNow(5).resolve(current, now),
            Timestamp(1005)
        );
        assert_eq!(
            WaitAdjustment::Relative(-5).resolve(current, now),
            Timestamp(1005)
        );
        assert_eq!(WaitAdjustment::Relative(-5000).resolve(current, now), now);
        assert_eq!(
            WaitAdjustment::FromNow(-5000).resolve(current, now),
            Timestamp::FAR_FUTURE
        );
    }

    #[test]
    fn test_zero_delay_goes_straight_to_ready() {
        let mut f = SchedulerFixture::new();
        let player = f.player;
        f.scheduler
            .wait(Continuation::new(player, player, "look"), 0, f.now)
            .unwrap();
        let depths = f.scheduler.queue_depths();
        assert_eq!((depths.player, depths.wait), (1, 0));
    }

    #[test]
    fn test_next_wakeup() {
        let mut f = SchedulerFixture::new();
        let (player, thing) = (f.player, f.thing);
        let now = f.now;

        // Nothing queued: the configured maximum, less the one-second margin.
        assert_eq!(f.scheduler.next_wakeup(now), Duration::from_secs(999));

        f.scheduler
            .wait(Continuation::new(thing, thing, "a"), 30, now)
            .unwrap();
        assert_eq!(f.scheduler.next_wakeup(now), Duration::from_secs(29));
        assert_eq!(
            f.scheduler.next_wakeup(now.plus_seconds(29)),
            Duration::from_secs(1)
        );

        f.scheduler
            .wait(Continuation::new(thing, thing, "b"), 0, now)
            .unwrap();
        assert_eq!(f.scheduler.next_wakeup(now), Duration::from_secs(1));

        f.scheduler
            .wait(Continuation::new(player, player, "c"), 0, now)
            .unwrap();
        assert_eq!(f.scheduler.next_wakeup(now), Duration::ZERO);
    }

    #[test]
    fn test_adjust_wait_moves_entry() {
        let mut f = SchedulerFixture::new();
        let thing = f.thing;
        let now = f.now;
        let pid = f
            .scheduler
            .wait(Continuation::new(thing, thing, "a"), 100, now)
            .unwrap();

        let at = f
            .scheduler
            .adjust_wait(pid, WaitAdjustment::Relative(-95), now)
            .unwrap();
        assert_eq!(at, now.plus_seconds(5));
        assert_eq!(f.scheduler.promote_and_sweep(now.plus_seconds(4)), 0);
        assert_eq!(f.scheduler.promote_and_sweep(now.plus_seconds(5)), 1);

        // Now on a ready queue; rescheduling pulls it back into the wait queue.
        assert!(f.scheduler.reschedule(pid, now.plus_seconds(50), now));
        let depths = f.scheduler.queue_depths();
        assert_eq!((depths.object, depths.wait), (0, 1));
    }

    #[test]
    fn test_adjust_unknown_pid() {
        let mut f = SchedulerFixture::new();
        assert_eq!(
            f.scheduler
                .adjust_wait(99, WaitAdjustment::FromNow(1), f.now),
            Err(QueueError::PidNotFound(99))
        );
    }

    #[test]
    fn test_warp_promotes_and_works_while_disabled() {
        let mut f = SchedulerFixture::new();
        let thing = f.thing;
        let now = f.now;
        f.scheduler.set_dequeue_enabled(false);
        f.scheduler
            .wait(Continuation::new(thing, thing, "soon"), 10, now)
            .unwrap();
        f.scheduler
            .wait(Continuation::new(thing, thing, "later"), 100, now)
            .unwrap();

        assert_eq!(f.scheduler.promote_and_sweep(now.plus_seconds(500)), 0);
        assert_eq!(f.scheduler.warp(10, now), 1);
        assert_eq!(f.scheduler.queue_depths().wait, 1);
    }

    fn run_order(f: &mut SchedulerFixture) -> Vec<String> {
        let mut interp = crate::testing::RecordingInterpreter::default();
        f.scheduler.run_ready(usize::MAX, &mut interp);
        interp.commands()
    }

    fn object_then_player_across_a_sweep(f: &mut SchedulerFixture) {
        let (player, thing) = (f.player, f.thing);
        let now = f.now;
        f.scheduler
            .wait(Continuation::new(thing, thing, "object-caused"), 0, now)
            .unwrap();
        f.scheduler.promote_and_sweep(now.plus_seconds(1));
        f.scheduler
            .wait(Continuation::new(player, player, "player-caused"), 0, now)
            .unwrap();
    }

    #[test]
    fn test_sweep_keeps_object_work_behind_player_work() {
        let mut f = SchedulerFixture::new();
        object_then_player_across_a_sweep(&mut f);
        let depths = f.scheduler.queue_depths();
        assert_eq!((depths.player, depths.object), (1, 1));
        assert_eq!(run_order(&mut f), vec!["player-caused", "object-caused"]);
    }

    #[test]
    fn test_sweep_promotes_object_queue_when_configured() {
        let mut f = SchedulerFixture::with_config(Config {
            machine_cost: 0,
            promote_object_queue: true,
            ..Config::default()
        });
        object_then_player_across_a_sweep(&mut f);
        let depths = f.scheduler.queue_depths();
        assert_eq!((depths.player, depths.object), (2, 0));
        assert_eq!(run_order(&mut f), vec!["object-caused", "player-caused"]);
    }

    #[test]
    fn test_warp_always_appends_object_queue() {
        let mut f = SchedulerFixture::new();
        let thing = f.thing;
        f.scheduler
            .wait(Continuation::new(thing, thing, "automated"), 0, f.now)
            .unwrap();
        assert_eq!(f.scheduler.warp(0, f.now), 0);
        let depths = f.scheduler.queue_depths();
        assert_eq!((depths.player, depths.object), (1, 0));
    }

    #[test]
    fn test_warp_by_most_negative_offset_saturates() {
        let mut f = SchedulerFixture::new();
        let thing = f.thing;
        let now = f.now;
        let pid = f
            .scheduler
            .wait(Continuation::new(thing, thing, "x"), 10, now)
            .unwrap();
        assert_eq!(f.scheduler.warp(i64::MIN, now), 0);
        assert_eq!(
            f.scheduler.describe(pid).and_then(|d| d.ready_at),
            Some(Timestamp(i64::MAX))
        );
    }

    #[test]
    fn test_adjust_timed_semaphore_stays_blocked() {
        let mut f = SchedulerFixture::new();
        let (player, room) = (f.player, f.thing);
        let now = f.now;
        let sem = crate::tasks::Semaphore::new(room, mushq_common::AttrId::SEMAPHORE);
        let pid = f
            .scheduler
            .semaphore_wait(Continuation::new(player, player, "gated"), sem, Some(30), now)
            .unwrap();

        let at = f
            .scheduler
            .adjust_wait(pid, WaitAdjustment::FromNow(5), now)
            .unwrap();
        assert_eq!(at, now.plus_seconds(5));
        let listed = f.scheduler.describe(pid).unwrap();
        assert_eq!(listed.queue, QueueKind::Semaphore);
        assert_eq!(listed.ready_at, Some(at));
        assert_eq!(f.scheduler.queue_depths().semaphore, 1);

        // The old 30 second timeout is gone; the new one fires at 5.
        assert_eq!(f.scheduler.promote_and_sweep(now.plus_seconds(4)), 0);
        assert_eq!(f.scheduler.promote_and_sweep(now.plus_seconds(5)), 1);
        assert_eq!(f.scheduler.queue_depths().semaphore, 0);
        assert_eq!(f.scheduler.promote_and_sweep(now.plus_seconds(30)), 0);
        assert_eq!(run_order(&mut f), vec!["gated"]);
    }
}
