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

use mushq_common::Obj;
use mushq_common::tasks::Pid;

use crate::tasks::registers::RegisterContext;
use crate::tasks::scheduler::Scheduler;

/// A dequeued command, handed to the interpreter by value. By the time it is built the entry is
/// gone from every queue and from the PID index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub pid: Pid,
    /// Who runs the command.
    pub actor: Obj,
    /// Who caused it (the enactor).
    pub cause: Obj,
    pub command: String,
    /// `%0`-`%9`.
    pub args: Vec<String>,
    pub registers: RegisterContext,
}

/// The softcode evaluator. Running a command may itself queue, notify or halt, so the
/// interpreter is handed the scheduler back.
pub trait CommandInterpreter {
    fn execute(&mut self, scheduler: &mut Scheduler, invocation: Invocation);
}

impl<F> CommandInterpreter for F
where
    F: FnMut(&mut Scheduler, Invocation),
{
    fn execute(&mut self, scheduler: &mut Scheduler, invocation: Invocation) {
        self(scheduler, invocation)
    }
}
