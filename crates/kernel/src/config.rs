// Copyright (C) 2024 Ryan Daum <ryan.daum@gmail.com>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Config is created by the host daemon, and passed into the scheduler, whereupon it is
//! available to all queue components. Used to hold things typically configured by CLI flags, etc.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Highest PID handed out. PIDs are issued upward from 1 and wrap back to 1 past this.
    pub max_qpid: usize,
    /// Deposit charged when a command is queued. Returned when it runs, or is halted or drained.
    pub wait_cost: i64,
    /// One queued command in this many (chosen at random) costs an extra, non-refundable penny.
    /// Zero disables the surcharge.
    pub machine_cost: i64,
    /// Most commands a single owner may have queued at once. Going over halts the owner.
    pub queue_max: usize,
    /// Commands run per loop iteration when there was no network activity.
    pub queue_chunk: usize,
    /// Commands run per loop iteration when there was network activity.
    pub active_queue_chunk: usize,
    /// Longest the event loop is told to sleep when nothing is scheduled.
    pub max_wakeup_seconds: u64,
    /// Whether the per-second sweep and batches run at all. `@queue` can still force them.
    pub dequeue_enabled: bool,
    /// Whether the per-second sweep moves whatever is left on the object (low priority) queue to
    /// the tail of the player queue. Off by default: once promoted, object-caused work runs ahead
    /// of player-caused work queued after the sweep. `@queue/warp` always promotes.
    pub promote_object_queue: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_qpid: 10_000,
            wait_cost: 10,
            machine_cost: 64,
            queue_max: 100,
            queue_chunk: 10,
            active_queue_chunk: 10,
            max_wakeup_seconds: 1000,
            dequeue_enabled: true,
            promote_object_queue: false,
        }
    }
}

impl Config {
    pub fn max_wakeup(&self) -> Duration {
        Duration::from_secs(self.max_wakeup_seconds.max(1))
    }
}
