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

//! The queue's user-facing commands: `@wait`, `@notify`, `@drain`, `@halt`, `@ps` and `@queue`.
//!
//! Objects are named by `#dbref` literal or `me`. Every count, PID and time is parsed strictly;
//! anything malformed is refused rather than defaulted.

use std::fmt::Write;

use mushq_common::model::{AttributeStore, WorldState};
use mushq_common::tasks::{Pid, QueueError};
use mushq_common::util::{is_integer, parse_int_strict};
use mushq_common::{AttrId, Obj};

use crate::tasks::interpreter::CommandInterpreter;
use crate::tasks::registers::RegisterContext;
use crate::tasks::scheduler::Scheduler;
use crate::tasks::semaphore::ReleaseMode;
use crate::tasks::wait_q::WaitAdjustment;
use crate::tasks::{Continuation, EntryDescription, QueueKind, Semaphore, Timestamp};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PsMode {
    Brief,
    Long,
    Summary,
}

/// A parsed queue command. Arguments are kept as written; they are validated when executed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum QueueCommand {
    /// `@wait[/until] <seconds | obj[/<timeout | attr>]>=<command>`
    Wait {
        until: bool,
        event: String,
        command: String,
    },
    /// `@wait/pid[/until] <pid>=<[+|-]seconds>`
    WaitPid {
        until: bool,
        pid: String,
        time: String,
    },
    /// `@notify <obj>[/<attr>][=<count>]` and `@drain <obj>[/<attr>]`
    Release {
        mode: ReleaseMode,
        target: String,
        count: Option<String>,
    },
    /// `@halt[/all] [<obj>]`
    Halt { all: bool, target: Option<String> },
    /// `@halt/pid <pid>`
    HaltPid { pid: String },
    /// `@ps[/brief|/long|/summary][/all] [<obj>]`
    Ps {
        mode: PsMode,
        all: bool,
        target: Option<String>,
    },
    /// `@queue/kick <n>`
    Kick { count: String },
    /// `@queue/warp <seconds>`
    Warp { seconds: String },
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

impl QueueCommand {
    /// Parse a command line. `None` if it isn't a queue command at all.
    pub fn parse(line: &str) -> Option<Result<QueueCommand, QueueError>> {
        let line = line.trim();
        let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let mut parts = head.split('/');
        let name = parts.next()?.to_ascii_lowercase();
        let switches: Vec<String> = parts.map(|s| s.to_ascii_lowercase()).collect();
        let rest = rest.trim();
        let (lhs, rhs) = match rest.split_once('=') {
            Some((l, r)) => (l.trim(), Some(r.trim())),
            None => (rest, None),
        };

        let has = |switch: &str| switches.iter().any(|s| s == switch);
        let only = |allowed: &[&str]| switches.iter().all(|s| allowed.contains(&s.as_str()));

        let command = match name.as_str() {
            "@wait" => {
                if !only(&["until", "pid"]) {
                    return Some(Err(QueueError::IllegalSwitches));
                }
                if has("pid") {
                    QueueCommand::WaitPid {
                        until: has("until"),
                        pid: lhs.to_string(),
                        time: rhs.unwrap_or_default().to_string(),
                    }
                } else {
                    QueueCommand::Wait {
                        until: has("until"),
                        event: lhs.to_string(),
                        command: rhs.unwrap_or_default().to_string(),
                    }
                }
            }
            "@notify" | "@drain" => {
                if !switches.is_empty() {
                    return Some(Err(QueueError::IllegalSwitches));
                }
                let mode = if name == "@drain" {
                    ReleaseMode::Drain
                } else {
                    ReleaseMode::Notify
                };
                QueueCommand::Release {
                    mode,
                    target: lhs.to_string(),
                    count: rhs.and_then(non_empty),
                }
            }
            "@halt" => {
                if !only(&["all", "pid"]) || (has("all") && has("pid")) {
                    return Some(Err(QueueError::IllegalSwitches));
                }
                if has("pid") {
                    QueueCommand::HaltPid {
                        pid: lhs.to_string(),
                    }
                } else {
                    QueueCommand::Halt {
                        all: has("all"),
                        target: non_empty(lhs),
                    }
                }
            }
            "@ps" => {
                if !only(&["brief", "long", "summary", "all"]) {
                    return Some(Err(QueueError::IllegalSwitches));
                }
                let modes: Vec<PsMode> = [
                    ("brief", PsMode::Brief),
                    ("long", PsMode::Long),
                    ("summary", PsMode::Summary),
                ]
                .into_iter()
                .filter(|(s, _)| has(*s))
                .map(|(_, m)| m)
                .collect();
                let mode = match modes.as_slice() {
                    [] => PsMode::Brief,
                    [mode] => *mode,
                    _ => return Some(Err(QueueError::IllegalSwitches)),
                };
                QueueCommand::Ps {
                    mode,
                    all: has("all"),
                    target: non_empty(lhs),
                }
            }
            "@queue" => match switches.as_slice() {
                [s] if s == "kick" => QueueCommand::Kick {
                    count: lhs.to_string(),
                },
                [s] if s == "warp" => QueueCommand::Warp {
                    seconds: lhs.to_string(),
                },
                _ => return Some(Err(QueueError::IllegalSwitches)),
            },
            _ => return None,
        };
        Some(Ok(command))
    }
}

/// Who is issuing a queue command, and the environment any command it queues should capture.
#[derive(Copy, Clone, Debug)]
pub struct CommandContext<'a> {
    pub player: Obj,
    pub cause: Obj,
    pub args: &'a [String],
    pub registers: Option<&'a RegisterContext>,
    pub now: Timestamp,
}

impl<'a> CommandContext<'a> {
    pub fn new(player: Obj, cause: Obj, now: Timestamp) -> Self {
        Self {
            player,
            cause,
            args: &[],
            registers: None,
            now,
        }
    }

    fn continuation(&self, command: &'a str) -> Continuation<'a> {
        let continuation = Continuation::new(self.player, self.cause, command).with_args(self.args);
        match self.registers {
            Some(registers) => continuation.with_registers(registers),
            None => continuation,
        }
    }
}

/// Run a queue command, returning the lines to show the player.
pub fn execute(
    scheduler: &mut Scheduler,
    ctx: CommandContext<'_>,
    command: &QueueCommand,
    interpreter: &mut dyn CommandInterpreter,
) -> Result<Vec<String>, QueueError> {
    match command {
        QueueCommand::Wait {
            until,
            event,
            command,
        } => wait(scheduler, ctx, *until, event, command),
        QueueCommand::WaitPid { until, pid, time } => wait_pid(scheduler, ctx, *until, pid, time),
        QueueCommand::Release {
            mode,
            target,
            count,
        } => release(scheduler, ctx, *mode, target, count.as_deref()),
        QueueCommand::Halt { all, target } => halt(scheduler, ctx, *all, target.as_deref()),
        QueueCommand::HaltPid { pid } => halt_pid(scheduler, ctx, pid),
        QueueCommand::Ps { mode, all, target } => ps(scheduler, ctx, *mode, *all, target.as_deref()),
        QueueCommand::Kick { count } => kick(scheduler, ctx, count, interpreter),
        QueueCommand::Warp { seconds } => warp(scheduler, ctx, seconds),
    }
}

fn match_object(world: &dyn WorldState, player: Obj, name: &str) -> Result<Obj, QueueError> {
    let obj = if name.eq_ignore_ascii_case("me") {
        player
    } else {
        Obj::parse_literal(name.trim()).ok_or(QueueError::NoMatch)?
    };
    if world.valid(obj) {
        Ok(obj)
    } else {
        Err(QueueError::NoMatch)
    }
}

fn match_controlled(world: &dyn WorldState, player: Obj, name: &str) -> Result<Obj, QueueError> {
    let obj = match_object(world, player, name)?;
    if world.controls(player, obj) {
        Ok(obj)
    } else {
        Err(QueueError::PermissionDenied)
    }
}

fn parse_pid(scheduler: &Scheduler, pid: &str) -> Result<Pid, QueueError> {
    parse_int_strict(pid)
        .and_then(|pid| Pid::try_from(pid).ok())
        .filter(|pid| (1..=scheduler.config().max_qpid).contains(pid))
        .ok_or(QueueError::InvalidPid)
}

/// Turn a `/until` epoch time into a delay from now.
fn delay_until(at: i32, now: Timestamp) -> i64 {
    let until = i64::from(at) - now.0;
    until.clamp(0, i64::from(i32::MAX))
}

fn wait(
    scheduler: &mut Scheduler,
    ctx: CommandContext<'_>,
    until: bool,
    event: &str,
    command: &str,
) -> Result<Vec<String>, QueueError> {
    let to_delay = |secs: &str| -> Result<i64, QueueError> {
        let secs = parse_int_strict(secs).ok_or(QueueError::InvalidWaitTime)?;
        Ok(if until {
            delay_until(secs, ctx.now)
        } else {
            i64::from(secs)
        })
    };

    if is_integer(event) {
        let delay = to_delay(event)?;
        scheduler.wait(ctx.continuation(command), delay, ctx.now)?;
        return Ok(vec![]);
    }

    let (what, qualifier) = match event.split_once('/') {
        Some((what, qualifier)) => (what, Some(qualifier.trim())),
        None => (event, None),
    };
    let object = match_controlled(scheduler.world(), ctx.player, what)?;
    let (attr, timeout) = match qualifier.filter(|q| !q.is_empty()) {
        Some(q) if is_integer(q) => (AttrId::SEMAPHORE, Some(to_delay(q)?)),
        Some(name) => {
            let attr = scheduler
                .world_mut()
                .define_attr(name)
                .ok_or(QueueError::InvalidAttribute)?;
            (attr, None)
        }
        None => (AttrId::SEMAPHORE, None),
    };
    scheduler.semaphore_wait(
        ctx.continuation(command),
        Semaphore::new(object, attr),
        timeout,
        ctx.now,
    )?;
    Ok(vec![])
}

fn wait_pid(
    scheduler: &mut Scheduler,
    ctx: CommandContext<'_>,
    until: bool,
    pid: &str,
    time: &str,
) -> Result<Vec<String>, QueueError> {
    let pid = parse_pid(scheduler, pid)?;
    let secs = parse_int_strict(time).ok_or(QueueError::InvalidWaitTime)?;
    let actor = scheduler
        .describe(pid)
        .map(|d| d.actor)
        .ok_or(QueueError::PidNotFound(pid))?;
    if !scheduler.world().controls(ctx.player, actor) {
        return Err(QueueError::PermissionDenied);
    }
    let adjustment = if until {
        WaitAdjustment::Until(i64::from(secs))
    } else if time.starts_with(['+', '-']) {
        WaitAdjustment::Relative(i64::from(secs))
    } else {
        WaitAdjustment::FromNow(i64::from(secs))
    };
    scheduler.adjust_wait(pid, adjustment, ctx.now)?;
    Ok(vec![format!("Adjusted wait time for queue entry PID {pid}.")])
}

fn release(
    scheduler: &mut Scheduler,
    ctx: CommandContext<'_>,
    mode: ReleaseMode,
    target: &str,
    count: Option<&str>,
) -> Result<Vec<String>, QueueError> {
    let (what, attr_name) = match target.split_once('/') {
        Some((what, attr)) => (what, Some(attr.trim()).filter(|a| !a.is_empty())),
        None => (target, None),
    };
    let object = match_controlled(scheduler.world(), ctx.player, what)?;
    let attr = attr_name
        .and_then(|name| scheduler.world().attr_named(name))
        .unwrap_or(AttrId::SEMAPHORE);
    let count = match count {
        Some(count) => parse_int_strict(count).ok_or(QueueError::InvalidCount)?,
        None => 1,
    };
    let Ok(count) = u32::try_from(count) else {
        return Ok(vec![]);
    };
    if count == 0 {
        return Ok(vec![]);
    }
    scheduler.release(ctx.player, object, attr, mode, count);
    let reply = match mode {
        ReleaseMode::Notify => "Notified.",
        ReleaseMode::Drain => "Drained.",
    };
    Ok(vec![reply.to_string()])
}

fn halt_pid(
    scheduler: &mut Scheduler,
    ctx: CommandContext<'_>,
    pid: &str,
) -> Result<Vec<String>, QueueError> {
    let pid = parse_pid(scheduler, pid)?;
    let actor = scheduler
        .describe(pid)
        .map(|d| d.actor)
        .ok_or(QueueError::PidNotFound(pid))?;
    let world = scheduler.world();
    if !(world.controls(ctx.player, actor) || world.is_wizard(ctx.player)) {
        return Err(QueueError::PermissionDenied);
    }
    scheduler.halt_pid(pid)?;
    Ok(vec![format!("Halted queue entry PID {pid}.")])
}

/// Work out the `(owner, object)` filter for `@halt` and `@ps`. With no target that is the
/// caller's own queue (or, with `/all`, everything); a player target selects everything they
/// own, any other target just that object.
fn queue_filter(
    world: &dyn WorldState,
    player: Obj,
    all: bool,
    target: Option<&str>,
) -> Result<(Option<Obj>, Option<Obj>), QueueError> {
    let Some(target) = target else {
        if all {
            return Ok((None, None));
        }
        let object = (!world.is_player(player)).then_some(player);
        return Ok((Some(world.owner_of(player)), object));
    };
    let obj = if world.is_wizard(player) {
        match_object(world, player, target)?
    } else {
        match_controlled(world, player, target)?
    };
    if all {
        return Err(QueueError::TargetWithAll);
    }
    if world.is_player(obj) {
        Ok((Some(obj), None))
    } else {
        Ok((None, Some(obj)))
    }
}

fn halt(
    scheduler: &mut Scheduler,
    ctx: CommandContext<'_>,
    all: bool,
    target: Option<&str>,
) -> Result<Vec<String>, QueueError> {
    if all && !scheduler.world().is_wizard(ctx.player) {
        return Err(QueueError::PermissionDenied);
    }
    let (owner, object) = queue_filter(scheduler.world(), ctx.player, all, target)?;
    let halted = scheduler.halt(owner, object);
    Ok(vec![format!("{halted} queue entries removed.")])
}

fn ps_line(world: &dyn WorldState, entry: &EntryDescription, now: Timestamp) -> String {
    let prefix = match (entry.semaphore, entry.ready_at) {
        (Some(sem), Some(at)) => format!("[{}/{}] ", sem.object, at.seconds_since(now)),
        (None, Some(at)) => format!("[{}] ", at.seconds_since(now)),
        (Some(sem), None) if sem.attr == AttrId::SEMAPHORE || sem.attr.is_unspecified() => {
            format!("[{}] ", sem.object)
        }
        (Some(sem), None) => match world.attr_name(sem.attr) {
            Some(name) => format!("[{}/{name}] ", sem.object),
            None => format!("[{}] ", sem.object),
        },
        (None, None) => String::new(),
    };
    format!("{prefix}{}:{}:{}", entry.pid, entry.actor, entry.command)
}

fn ps_long_line(entry: &EntryDescription) -> String {
    let mut line = format!("   Enactor: {}", entry.cause);
    for (i, arg) in entry.args.iter().enumerate() {
        if !arg.is_empty() {
            let _ = write!(line, "; Arg{i}='{arg}'");
        }
    }
    line
}

fn ps(
    scheduler: &mut Scheduler,
    ctx: CommandContext<'_>,
    mode: PsMode,
    all: bool,
    target: Option<&str>,
) -> Result<Vec<String>, QueueError> {
    let world = scheduler.world();
    if all && !world.is_wizard(ctx.player) {
        return Err(QueueError::PermissionDenied);
    }
    let (owner, object) = queue_filter(world, ctx.player, all, target)?;

    let mut lines = vec![];
    let mut totals = vec![];
    for kind in [
        QueueKind::Player,
        QueueKind::Object,
        QueueKind::Wait,
        QueueKind::Semaphore,
    ] {
        let entries = scheduler.entries(kind);
        let wanted: Vec<&EntryDescription> = entries
            .iter()
            .filter(|e| {
                world.valid(e.actor)
                    && owner.is_none_or(|o| world.owner_of(e.actor) == o)
                    && object.is_none_or(|o| e.actor == o)
            })
            .collect();
        totals.push(format!("{kind}...{}/{}", wanted.len(), entries.len()));
        if mode == PsMode::Summary || wanted.is_empty() {
            continue;
        }
        lines.push(format!("----- {kind} Queue -----"));
        for entry in wanted {
            lines.push(ps_line(world, entry, ctx.now));
            if mode == PsMode::Long {
                lines.push(ps_long_line(entry));
            }
        }
    }
    lines.push(format!("Totals: {}", totals.join("  ")));
    Ok(lines)
}

fn kick(
    scheduler: &mut Scheduler,
    ctx: CommandContext<'_>,
    count: &str,
    interpreter: &mut dyn CommandInterpreter,
) -> Result<Vec<String>, QueueError> {
    if !scheduler.world().is_wizard(ctx.player) {
        return Err(QueueError::PermissionDenied);
    }
    let count = parse_int_strict(count).ok_or(QueueError::InvalidCommandCount)?;
    let mut lines = vec![];
    if !scheduler.dequeue_enabled() {
        lines.push("Warning: automatic dequeueing is disabled.".to_string());
    }
    let processed = scheduler.run_batch(usize::try_from(count).unwrap_or(0), interpreter);
    lines.push(format!("{processed} commands processed."));
    Ok(lines)
}

fn warp(
    scheduler: &mut Scheduler,
    ctx: CommandContext<'_>,
    seconds: &str,
) -> Result<Vec<String>, QueueError> {
    if !scheduler.world().is_wizard(ctx.player) {
        return Err(QueueError::PermissionDenied);
    }
    let seconds = parse_int_strict(seconds).ok_or(QueueError::InvalidTimeValue)?;
    let mut lines = vec![];
    if !scheduler.dequeue_enabled() {
        lines.push("Warning: automatic dequeueing is disabled.".to_string());
    }
    scheduler.warp(i64::from(seconds), ctx.now);
    lines.push(match seconds {
        s if s > 0 => format!("WaitQ timer advanced {s} seconds."),
        s if s < 0 => format!("WaitQ timer set back {} seconds.", -i64::from(s)),
        _ => "Object queue appended to player queue.".to_string(),
    });
    Ok(lines)
}
