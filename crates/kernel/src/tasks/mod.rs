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

//! The command queue.
//!
//! Every command that isn't run on the spot is captured as a continuation (command text, its
//! arguments and a copy of its registers) and parked in one of four queues:
//!
//!   * the *player* and *object* ready queues, FIFO, drained player-first by [`scheduler::Scheduler::run_ready`]
//!   * the *wait* queue, ordered by wake time, swept once a second
//!   * the *semaphore* queue, in arrival order, released by `@notify` / `@drain`
//!
//! Entries live in the [`store::ContinuationStore`]; queues only hold their PIDs.

use crate::tasks::registers::RegisterContext;
use mushq_common::tasks::Pid;
use mushq_common::{AttrId, Obj};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use strum::Display;

pub mod commands;
pub mod interpreter;
pub mod ready_q;
pub mod registers;
pub mod scheduler;
pub mod semaphore;
pub mod store;
pub mod wait_q;

/// Wall-clock time in whole seconds since the Unix epoch.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Where `@wait/pid` parks entries whose computed time went out of range.
    pub const FAR_FUTURE: Timestamp = Timestamp(i32::MAX as i64);

    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(i64::try_from(secs).unwrap_or(i64::MAX))
    }

    #[must_use]
    pub fn plus_seconds(self, seconds: i64) -> Self {
        Self(self.0.saturating_add(seconds))
    }

    pub fn seconds_since(self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which of the two ready queues an entry runs from. Commands caused by a player go ahead of
/// commands caused by objects.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Display)]
pub enum Priority {
    High,
    Low,
}

/// The four queues, as shown by `@ps`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Display)]
pub enum QueueKind {
    Player,
    Object,
    Wait,
    Semaphore,
}

/// The `(object, attribute)` pair a blocked entry waits on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Semaphore {
    pub object: Obj,
    pub attr: AttrId,
}

impl Semaphore {
    pub fn new(object: Obj, attr: AttrId) -> Self {
        Self { object, attr }
    }

    /// The attribute holding this semaphore's counter.
    pub fn counter_attr(&self) -> AttrId {
        self.attr.or_semaphore()
    }

    /// Whether a release on `(object, attr)` applies to a waiter on this semaphore.
    /// An unspecified release attribute matches waiters on any attribute; a specific one only
    /// matches waiters that named that same attribute.
    pub fn released_by(&self, object: Obj, attr: AttrId) -> bool {
        self.object == object && (self.attr == attr || attr.is_unspecified())
    }
}

/// What a command hands over to be queued. Borrowed: the store takes its own copies, so the
/// caller's live registers are never shared with the queued entry.
#[derive(Copy, Clone, Debug)]
pub struct Continuation<'a> {
    pub actor: Obj,
    pub cause: Obj,
    pub command: &'a str,
    pub args: &'a [String],
    pub registers: Option<&'a RegisterContext>,
}

impl<'a> Continuation<'a> {
    pub fn new(actor: Obj, cause: Obj, command: &'a str) -> Self {
        Self {
            actor,
            cause,
            command,
            args: &[],
            registers: None,
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: &'a [String]) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_registers(mut self, registers: &'a RegisterContext) -> Self {
        self.registers = Some(registers);
        self
    }
}

/// Current number of entries in each queue.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct QueueDepths {
    pub player: usize,
    pub object: usize,
    pub wait: usize,
    pub semaphore: usize,
}

impl QueueDepths {
    pub fn ready(&self) -> usize {
        self.player + self.object
    }

    pub fn total(&self) -> usize {
        self.player + self.object + self.wait + self.semaphore
    }
}

/// External description of a queued entry, for `@ps`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EntryDescription {
    pub pid: Pid,
    pub queue: QueueKind,
    pub actor: Obj,
    pub cause: Obj,
    pub command: String,
    pub args: Vec<String>,
    pub ready_at: Option<Timestamp>,
    pub semaphore: Option<Semaphore>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semaphore_release_matching() {
        let room = Obj::mk_id(7);
        let gate = AttrId(300);

        let default_waiter = Semaphore::new(room, AttrId::SEMAPHORE);
        let gate_waiter = Semaphore::new(room, gate);
        let unspecified_waiter = Semaphore::new(room, AttrId::UNSPECIFIED);

        // A wildcard release reaches everyone on the object.
        assert!(default_waiter.released_by(room, AttrId::UNSPECIFIED));
        assert!(gate_waiter.released_by(room, AttrId::UNSPECIFIED));
        assert!(unspecified_waiter.released_by(room, AttrId::UNSPECIFIED));

        // A specific release only reaches waiters on exactly that attribute.
        assert!(gate_waiter.released_by(room, gate));
        assert!(!default_waiter.released_by(room, gate));
        assert!(!unspecified_waiter.released_by(room, AttrId::SEMAPHORE));

        // Never across objects.
        assert!(!gate_waiter.released_by(Obj::mk_id(8), gate));

        assert_eq!(unspecified_waiter.counter_attr(), AttrId::SEMAPHORE);
        assert_eq!(gate_waiter.counter_attr(), gate);
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let t = Timestamp(100);
        assert_eq!(t.plus_seconds(5), Timestamp(105));
        assert_eq!(Timestamp(i64::MAX).plus_seconds(1), Timestamp(i64::MAX));
        assert_eq!(Timestamp(105).seconds_since(t), 5);
    }
}
