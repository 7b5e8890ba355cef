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
use std::collections::HashMap;
use std::hash::BuildHasherDefault;

use mushq_common::model::WorldState;
use mushq_common::tasks::Pid;
use mushq_common::util::saturating_parse_i32;
use mushq_common::{AttrId, Obj};

use crate::tasks::registers::RegisterContext;
use crate::tasks::wait_q::WaitKey;
use crate::tasks::{Continuation, Priority, Semaphore};

/// Positional arguments (`%0`-`%9`) kept with a continuation.
pub const MAX_ARGS: usize = 10;

/// Which queue(s) currently hold an entry. An entry is in exactly one of these states; a blocked
/// entry with a timeout is additionally indexed in the wait queue under `timeout`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum QueueSlot {
    /// In the store but in no queue. Only seen transiently while being moved or destroyed.
    Detached,
    Waiting(WaitKey),
    Blocked {
        semaphore: Semaphore,
        timeout: Option<WaitKey>,
    },
    Ready(Priority),
}

/// A queued continuation.
#[derive(Debug)]
pub struct QueueEntry {
    pub(crate) pid: Pid,
    pub(crate) actor: Obj,
    pub(crate) cause: Obj,
    pub(crate) command: String,
    pub(crate) args: Vec<String>,
    pub(crate) registers: Option<RegisterContext>,
    pub(crate) slot: QueueSlot,
}

impl QueueEntry {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn actor(&self) -> Obj {
        self.actor
    }

    pub fn cause(&self) -> Obj {
        self.cause
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn semaphore(&self) -> Option<Semaphore> {
        match self.slot {
            QueueSlot::Blocked { semaphore, .. } => Some(semaphore),
            _ => None,
        }
    }

    pub(crate) fn wait_key(&self) -> Option<WaitKey> {
        match self.slot {
            QueueSlot::Waiting(key) => Some(key),
            QueueSlot::Blocked { timeout, .. } => timeout,
            _ => None,
        }
    }
}

/// Owns every live entry, keyed by PID. Queues refer to entries by PID only, so the map doubles as
/// the PID index, and removing an entry from it is the one and only way to destroy it.
pub(crate) struct ContinuationStore {
    entries: HashMap<Pid, QueueEntry, BuildHasherDefault<AHasher>>,
    next_pid: Pid,
    max_pid: Pid,
}

impl ContinuationStore {
    pub(crate) fn new(max_pid: Pid) -> Self {
        Self {
            entries: HashMap::default(),
            next_pid: 1,
            max_pid: max_pid.max(1),
        }
    }

    /// Find the next free PID, scanning upward from the last one issued and wrapping to 1.
    /// `None` when every PID up to `max_pid` is in use.
    fn issue_pid(&mut self) -> Option<Pid> {
        let mut pid = self.next_pid;
        for _ in 0..self.max_pid {
            if pid > self.max_pid {
                pid = 1;
            }
            if !self.entries.contains_key(&pid) {
                self.next_pid = pid + 1;
                return Some(pid);
            }
            pid += 1;
        }
        None
    }

    /// Create a detached entry. Registers are deep-copied and arguments beyond `%9` dropped.
    pub(crate) fn create(&mut self, continuation: &Continuation<'_>) -> Option<Pid> {
        let pid = self.issue_pid()?;
        let entry = QueueEntry {
            pid,
            actor: continuation.actor,
            cause: continuation.cause,
            command: continuation.command.to_string(),
            args: continuation.args.iter().take(MAX_ARGS).cloned().collect(),
            registers: continuation.registers.and_then(RegisterContext::capture),
            slot: QueueSlot::Detached,
        };
        self.entries.insert(pid, entry);
        Some(pid)
    }

    pub(crate) fn get(&self, pid: Pid) -> Option<&QueueEntry> {
        self.entries.get(&pid)
    }

    pub(crate) fn get_mut(&mut self, pid: Pid) -> Option<&mut QueueEntry> {
        self.entries.get_mut(&pid)
    }

    /// Remove an entry from the store and hand it to the caller. The caller must already have
    /// unlinked it from its queues.
    pub(crate) fn take(&mut self, pid: Pid) -> Option<QueueEntry> {
        let entry = self.entries.remove(&pid)?;
        debug_assert_eq!(entry.slot, QueueSlot::Detached, "pid {pid} taken while queued");
        Some(entry)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Add `delta` to the integer stored in `attr` on `target` and return the result.
///
/// A missing or non-numeric value counts as 0 and the arithmetic saturates at the `i32` bounds. A
/// result of exactly 0 clears the attribute. The new value is owned by `doer`'s owner.
pub fn adjust_attribute_counter(
    world: &mut dyn WorldState,
    doer: Obj,
    target: Obj,
    delta: i32,
    attr: AttrId,
) -> i32 {
    let current = world
        .attribute(target, attr)
        .map(|v| saturating_parse_i32(&v))
        .unwrap_or(0);
    let updated = current.saturating_add(delta);
    let owner = world.owner_of(doer);
    let value = (updated != 0).then(|| updated.to_string());
    world.set_attribute(target, attr, value, owner);
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::registers::RegisterKey;
    use mushq_common::model::{AttributeStore, MemoryWorld};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pids_issue_upward_and_wrap() {
        let mut store = ContinuationStore::new(3);
        let actor = Obj::mk_id(1);
        let c = Continuation::new(actor, actor, "think hi");

        let a = store.create(&c).unwrap();
        let b = store.create(&c).unwrap();
        let d = store.create(&c).unwrap();
        assert_eq!((a, b, d), (1, 2, 3));
        assert_eq!(store.create(&c), None);

        // Freeing a PID makes it available again, found by wrapping around.
        store.take(2).unwrap();
        assert_eq!(store.create(&c), Some(2));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_create_copies_registers_and_caps_args() {
        let mut store = ContinuationStore::new(100);
        let actor = Obj::mk_id(1);
        let mut regs = RegisterContext::new();
        regs.set(RegisterKey::Numbered(0), "x");
        let args: Vec<String> = (0..15).map(|i| i.to_string()).collect();

        let pid = store
            .create(
                &Continuation::new(actor, actor, "say %0")
                    .with_args(&args)
                    .with_registers(&regs),
            )
            .unwrap();
        regs.set(RegisterKey::Numbered(0), "mutated");

        let entry = store.get(pid).unwrap();
        assert_eq!(entry.args.len(), MAX_ARGS);
        assert_eq!(
            entry
                .registers
                .as_ref()
                .and_then(|r| r.get(&RegisterKey::Numbered(0)))
                .map(|v| v.to_string_lossy()),
            Some("x".to_string())
        );
    }

    #[test]
    fn test_take_removes_from_index() {
        let mut store = ContinuationStore::new(100);
        let actor = Obj::mk_id(1);
        let pid = store
            .create(&Continuation::new(actor, actor, "look"))
            .unwrap();
        assert!(store.take(pid).is_some());
        assert!(store.take(pid).is_none());
        assert!(store.get(pid).is_none());
    }

    #[test]
    fn test_counter_adjustment() {
        let mut world = MemoryWorld::new();
        let player = world.create_player(100);
        let room = world.create_thing(player);
        let sem = AttrId::SEMAPHORE;

        assert_eq!(adjust_attribute_counter(&mut world, player, room, 1, sem), 1);
        assert_eq!(adjust_attribute_counter(&mut world, player, room, 2, sem), 3);
        assert_eq!(world.attribute(room, sem).as_deref(), Some("3"));

        // Hitting exactly zero clears the attribute.
        assert_eq!(adjust_attribute_counter(&mut world, player, room, -3, sem), 0);
        assert_eq!(world.attribute(room, sem), None);

        // Garbage reads as zero.
        world.set_attribute(room, sem, Some("lots".into()), player);
        assert_eq!(adjust_attribute_counter(&mut world, player, room, -1, sem), -1);

        // Saturation rather than wrap.
        world.set_attribute(room, sem, Some(i32::MAX.to_string()), player);
        assert_eq!(
            adjust_attribute_counter(&mut world, player, room, 5, sem),
            i32::MAX
        );
    }
}
