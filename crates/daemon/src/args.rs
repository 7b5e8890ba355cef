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

use clap::builder::ValueHint;
use clap_derive::Parser;
use eyre::eyre;
use figment::Figment;
use figment::providers::{Format, Serialized, Yaml};
use mushq_kernel::config::Config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug, Serialize, Deserialize)]
#[command(about = "Run the command queue against an in-memory world, reading `#actor command` lines from stdin")]
pub struct Args {
    #[arg(
        long,
        value_name = "config",
        help = "Path to configuration (YAML) file to use, if any. If not specified, defaults are used.\
                Configuration file values can be overridden by command line arguments.",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub queue_args: QueueArgs,

    #[arg(
        long,
        value_name = "pennies",
        help = "Starting purse for each seeded player",
        default_value = "1000"
    )]
    pub pennies: i64,

    #[arg(long, help = "Enable debug logging", default_value = "false")]
    pub debug: bool,
}

#[derive(Parser, Debug, Default, Serialize, Deserialize)]
pub struct QueueArgs {
    #[arg(long, value_name = "max-qpid", help = "Highest PID issued before wrapping to 1")]
    pub max_qpid: Option<usize>,

    #[arg(
        long,
        value_name = "wait-cost",
        help = "Deposit charged for each queued command, refunded when it runs or is halted"
    )]
    pub wait_cost: Option<i64>,

    #[arg(
        long,
        value_name = "machine-cost",
        help = "One queued command in this many costs an extra penny (0 disables)"
    )]
    pub machine_cost: Option<i64>,

    #[arg(
        long,
        value_name = "queue-max",
        help = "Most commands one owner may have queued before being halted"
    )]
    pub queue_max: Option<usize>,

    #[arg(
        long,
        value_name = "queue-chunk",
        help = "Commands run per loop iteration when no input arrived"
    )]
    pub queue_chunk: Option<usize>,

    #[arg(
        long,
        value_name = "active-queue-chunk",
        help = "Commands run per loop iteration after input arrived"
    )]
    pub active_queue_chunk: Option<usize>,

    #[arg(
        long,
        value_name = "max-wakeup-seconds",
        help = "Longest the loop sleeps when nothing is scheduled"
    )]
    pub max_wakeup_seconds: Option<u64>,

    #[arg(
        long,
        help = "Start with automatic dequeueing disabled (`@queue kick` and `@queue warp` still work)"
    )]
    pub disable_dequeue: bool,
}

impl QueueArgs {
    pub fn merge_config(&self, config: &mut Config) -> Result<(), eyre::Report> {
        if let Some(max_qpid) = self.max_qpid {
            if max_qpid == 0 {
                return Err(eyre!("max-qpid must be at least 1"));
            }
            config.max_qpid = max_qpid;
        }
        if let Some(wait_cost) = self.wait_cost {
            config.wait_cost = wait_cost;
        }
        if let Some(machine_cost) = self.machine_cost {
            config.machine_cost = machine_cost;
        }
        if let Some(queue_max) = self.queue_max {
            config.queue_max = queue_max;
        }
        if let Some(queue_chunk) = self.queue_chunk {
            config.queue_chunk = queue_chunk;
        }
        if let Some(active_queue_chunk) = self.active_queue_chunk {
            config.active_queue_chunk = active_queue_chunk;
        }
        if let Some(max_wakeup_seconds) = self.max_wakeup_seconds {
            config.max_wakeup_seconds = max_wakeup_seconds;
        }
        if self.disable_dequeue {
            config.dequeue_enabled = false;
        }
        Ok(())
    }
}

impl Args {
    /// Load the configuration file if we have it, and then merge the arguments into it.
    pub fn load_config(&self) -> Result<Arc<Config>, eyre::Report> {
        // Figment can't merge clap's flattened optionals, so overrides are applied by hand.
        let mut config = match &self.config_file {
            Some(config_path) => Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Yaml::file(config_path))
                .extract::<Config>()
                .map_err(|e| {
                    eyre!(
                        "Failed to parse configuration from {:?}: {}",
                        config_path,
                        e
                    )
                })?,
            None => Config::default(),
        };
        self.queue_args.merge_config(&mut config)?;
        Ok(Arc::new(config))
    }
}
