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

use crate::model::Obj;
use crate::tasks::Pid;
use thiserror::Error;

/// Reasons the queue refuses a request. The display text is what the requesting player sees.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Not enough money to queue command.")]
    InsufficientFunds(Obj),
    #[error("Run away objects: too many commands queued.  Halted.")]
    Runaway(Obj),
    #[error("Could not queue command. The queue is full.")]
    QueueFull,
    #[error("{0} is halted and cannot queue commands.")]
    Halted(Obj),
    #[error("That is not a valid PID.")]
    InvalidPid,
    #[error("That PID is not associated with an active queue entry.")]
    PidNotFound(Pid),
    #[error("That semaphore does not have a wait time.")]
    NoWaitTime(Pid),
    #[error("Invalid count value.")]
    InvalidCount,
    #[error("Invalid number of commands.")]
    InvalidCommandCount,
    #[error("Invalid wait time.")]
    InvalidWaitTime,
    #[error("Invalid time value.")]
    InvalidTimeValue,
    #[error("Invalid attribute.")]
    InvalidAttribute,
    #[error("Permission denied.")]
    PermissionDenied,
    #[error("No match.")]
    NoMatch,
    #[error("Illegal combination of switches.")]
    IllegalSwitches,
    #[error("Can't specify a target and /all")]
    TargetWithAll,
}
