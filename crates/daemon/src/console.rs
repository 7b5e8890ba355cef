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

//! The daemon's stand-in for a softcode interpreter. Queue commands (`@wait`, `@notify`, `@ps`
//! and friends) go back into the scheduler; anything else is echoed as the actor's output.

use std::io::Write;

use tracing::{debug, warn};

use mushq_common::Obj;
use mushq_kernel::tasks::commands::{self, CommandContext, QueueCommand};
use mushq_kernel::tasks::registers::RegisterContext;
use mushq_kernel::{CommandInterpreter, Invocation, Scheduler, Timestamp};

/// Split an input line of the form `#actor command` into its parts.
pub fn parse_input(line: &str) -> Option<(Obj, &str)> {
    let line = line.trim();
    let (actor, command) = line.split_once(char::is_whitespace)?;
    let actor = Obj::parse_literal(actor)?;
    let command = command.trim_start();
    (!command.is_empty()).then_some((actor, command))
}

pub struct ConsoleInterpreter<W: Write> {
    out: W,
}

impl<W: Write> ConsoleInterpreter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// A line typed at the console runs immediately, as if the actor had entered it.
    pub fn handle_input(&mut self, scheduler: &mut Scheduler, line: &str) {
        let Some((actor, command)) = parse_input(line) else {
            warn!(line, "ignoring malformed input; expected `#actor command`");
            return;
        };
        if !scheduler.world().valid(actor) {
            self.emit(actor, &format!("I don't know who {actor} is."));
            return;
        }
        self.dispatch(scheduler, actor, actor, command, &[], None, Timestamp::now());
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &mut self,
        scheduler: &mut Scheduler,
        actor: Obj,
        cause: Obj,
        command: &str,
        args: &[String],
        registers: Option<&RegisterContext>,
        now: Timestamp,
    ) {
        let Some(parsed) = QueueCommand::parse(command) else {
            self.emit(actor, command);
            return;
        };
        let reply = match parsed {
            Ok(parsed) => {
                let ctx = CommandContext {
                    player: actor,
                    cause,
                    args,
                    registers,
                    now,
                };
                commands::execute(scheduler, ctx, &parsed, &mut *self)
            }
            Err(e) => Err(e),
        };
        match reply {
            Ok(lines) => {
                for line in lines {
                    self.emit(actor, &line);
                }
            }
            Err(e) => {
                debug!(%actor, command, error = %e, "queue command refused");
                self.emit(actor, &e.to_string());
            }
        }
    }

    fn emit(&mut self, actor: Obj, text: &str) {
        if let Err(e) = writeln!(self.out, "[{actor}] {text}") {
            warn!(error = %e, "unable to write output");
        }
    }
}

impl<W: Write> CommandInterpreter for ConsoleInterpreter<W> {
    fn execute(&mut self, scheduler: &mut Scheduler, invocation: Invocation) {
        debug!(pid = invocation.pid, actor = %invocation.actor, command = %invocation.command, "running");
        let registers = (!invocation.registers.is_empty()).then_some(&invocation.registers);
        self.dispatch(
            scheduler,
            invocation.actor,
            invocation.cause,
            &invocation.command,
            &invocation.args,
            registers,
            Timestamp::now(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed_world;
    use mushq_kernel::config::Config;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn scheduler() -> Scheduler {
        let config = Config {
            machine_cost: 0,
            ..Config::default()
        };
        Scheduler::new(Arc::new(config), Box::new(seed_world(1000)))
    }

    fn lines(out: Vec<u8>) -> Vec<String> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("#1 say hi"), Some((Obj::mk_id(1), "say hi")));
        assert_eq!(parse_input("  #2   @ps  "), Some((Obj::mk_id(2), "@ps")));
        assert_eq!(parse_input("#1"), None);
        assert_eq!(parse_input("me say hi"), None);
    }

    #[test]
    fn test_plain_commands_echo_and_queue_commands_reply() {
        let mut scheduler = scheduler();
        let mut console = ConsoleInterpreter::new(Vec::new());
        console.handle_input(&mut scheduler, "#1 say hello");
        console.handle_input(&mut scheduler, "#1 @wait 0=say later");
        console.handle_input(&mut scheduler, "#9 say who");
        assert_eq!(scheduler.len(), 1);

        assert_eq!(scheduler.run_ready(10, &mut console), 1);
        assert_eq!(
            lines(console.into_inner()),
            vec![
                "[#1] say hello".to_string(),
                "[#9] I don't know who #9 is.".to_string(),
                "[#1] say later".to_string(),
            ]
        );
    }

    #[test]
    fn test_queued_queue_commands_run_against_scheduler() {
        let mut scheduler = scheduler();
        let mut console = ConsoleInterpreter::new(Vec::new());
        console.handle_input(&mut scheduler, "#1 @wait #2=say released");
        console.handle_input(&mut scheduler, "#1 @wait 0=@notify #2");
        assert_eq!(scheduler.queue_depths().semaphore, 1);

        // The queued @notify releases the waiter, which then runs in the same batch.
        assert_eq!(scheduler.run_ready(10, &mut console), 2);
        assert!(scheduler.is_empty());
        let out = lines(console.into_inner());
        assert_eq!(out.last().map(String::as_str), Some("[#1] say released"));
        assert!(out.contains(&"[#1] Notified.".to_string()));
    }
}
