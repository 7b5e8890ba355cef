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

use crate::args::Args;
use crate::console::ConsoleInterpreter;
use ::tracing::{debug, info};
use clap::Parser;
use eyre::{Report, eyre};
use mushq_common::model::MemoryWorld;
use mushq_common::tracing;
use mushq_kernel::{Scheduler, Timestamp};
use std::io::{Stdout, stdout};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};

mod args;
mod console;

/// The world the daemon starts with: a wizard (#0), a player (#1), a thing the player owns (#2)
/// and a second player (#3).
pub fn seed_world(pennies: i64) -> MemoryWorld {
    let mut world = MemoryWorld::new();
    let wizard = world.create_player(0);
    world.set_wizard(wizard, true);
    let player = world.create_player(pennies);
    world.create_thing(player);
    world.create_player(pennies);
    world
}

/// With input closed, whether the queue can still make progress on its own: something is ready,
/// or something is waiting on a clock (a timed wait, or a semaphore wait with a timeout).
fn queue_run_out(scheduler: &Scheduler) -> bool {
    !scheduler.dequeue_enabled()
        || (scheduler.queue_depths().ready() == 0 && !scheduler.has_pending_timeouts())
}

/// Feed stdin to the console and run the queue until input closes and nothing runnable is left.
async fn event_loop(
    mut scheduler: Scheduler,
    mut console: ConsoleInterpreter<Stdout>,
) -> Result<(), Report> {
    let (queue_chunk, active_queue_chunk, max_wakeup) = {
        let config = scheduler.config();
        (
            config.queue_chunk,
            config.active_queue_chunk,
            config.max_wakeup(),
        )
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;
    let mut last_second = Timestamp::now();

    loop {
        // With dequeueing off nothing becomes runnable on its own, so only input can wake us.
        let wait = if scheduler.dequeue_enabled() {
            scheduler.next_wakeup(Timestamp::now())
        } else {
            max_wakeup
        };

        let mut active = false;
        if input_open {
            match tokio::time::timeout(wait, lines.next_line()).await {
                Ok(Ok(Some(line))) => {
                    console.handle_input(&mut scheduler, &line);
                    active = true;
                }
                Ok(Ok(None)) => {
                    info!("Input closed; running out the queue");
                    input_open = false;
                }
                Ok(Err(e)) => return Err(eyre!("Unable to read input: {e}")),
                Err(_) => {}
            }
        } else {
            if queue_run_out(&scheduler) {
                info!(
                    semaphore = scheduler.queue_depths().semaphore,
                    "Nothing left to run, stopping"
                );
                return Ok(());
            }
            tokio::time::sleep(wait.max(Duration::from_millis(10))).await;
        }

        let now = Timestamp::now();
        if now.seconds_since(last_second) >= 1 {
            let promoted = scheduler.promote_and_sweep(now);
            if promoted > 0 {
                debug!(promoted, "timed entries due");
            }
            last_second = now;
        }
        let chunk = if active {
            active_queue_chunk
        } else {
            queue_chunk
        };
        scheduler.run_ready(chunk, &mut console);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Report> {
    color_eyre::install()?;
    let args = Args::parse();

    tracing::init_tracing(args.debug).map_err(|e| eyre!("Unable to configure logging: {}", e))?;

    let config = args.load_config()?;
    info!(
        max_qpid = config.max_qpid,
        wait_cost = config.wait_cost,
        queue_max = config.queue_max,
        dequeue_enabled = config.dequeue_enabled,
        "Configuration loaded"
    );

    let scheduler = Scheduler::new(config, Box::new(seed_world(args.pennies)));
    let console = ConsoleInterpreter::new(stdout());

    let mut hup_signal = signal(SignalKind::hangup())?;
    let mut stop_signal = signal(SignalKind::interrupt())?;

    info!("Queue started, reading `#actor command` lines from stdin...");
    select! {
        result = event_loop(scheduler, console) => {
            result?;
        }
        _ = hup_signal.recv() => {
            info!("HUP received, stopping...");
        },
        _ = stop_signal.recv() => {
            info!("STOP received, stopping...");
        }
    }
    info!("Done.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mushq_common::{AttrId, Obj};
    use mushq_kernel::config::Config;
    use mushq_kernel::tasks::Semaphore;
    use mushq_kernel::Continuation;
    use std::sync::Arc;

    fn scheduler(config: Config) -> Scheduler {
        Scheduler::new(Arc::new(config), Box::new(seed_world(1000)))
    }

    #[test]
    fn test_timed_semaphore_wait_keeps_loop_alive() {
        let mut scheduler = scheduler(Config::default());
        let (player, thing) = (Obj::mk_id(1), Obj::mk_id(2));
        let now = Timestamp::now();
        assert!(queue_run_out(&scheduler));

        let pid = scheduler
            .semaphore_wait(
                Continuation::new(player, player, "gated"),
                Semaphore::new(thing, AttrId::SEMAPHORE),
                Some(5),
                now,
            )
            .unwrap();
        assert!(!queue_run_out(&scheduler));

        // Without a timeout only a notify could release it.
        scheduler.halt_pid(pid).unwrap();
        scheduler
            .semaphore_wait(
                Continuation::new(player, player, "gated"),
                Semaphore::new(thing, AttrId::SEMAPHORE),
                None,
                now,
            )
            .unwrap();
        assert!(queue_run_out(&scheduler));
    }

    #[test]
    fn test_disabled_dequeue_runs_out() {
        let mut scheduler = scheduler(Config {
            dequeue_enabled: false,
            ..Config::default()
        });
        let player = Obj::mk_id(1);
        scheduler
            .wait(Continuation::new(player, player, "later"), 10, Timestamp::now())
            .unwrap();
        assert!(queue_run_out(&scheduler));
    }
}
