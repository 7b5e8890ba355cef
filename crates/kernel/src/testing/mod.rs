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

//! Testing utilities for the kernel crate: a scheduler over a small seeded world, and an
//! interpreter which just records what it was asked to run.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use mushq_common::model::{AttributeStore, MemoryWorld, WorldState};
use mushq_common::{AttrId, Obj};

use crate::config::Config;
use crate::tasks::Timestamp;
use crate::tasks::interpreter::{CommandInterpreter, Invocation};
use crate::tasks::scheduler::Scheduler;

/// Records every invocation instead of running it.
#[derive(Default, Debug)]
pub struct RecordingInterpreter {
    invocations: Vec<Invocation>,
}

impl RecordingInterpreter {
    pub fn invocations(&self) -> &[Invocation] {
        &self.invocations
    }

    /// Command texts, in the order they ran.
    pub fn commands(&self) -> Vec<String> {
        self.invocations.iter().map(|i| i.command.clone()).collect()
    }
}

impl CommandInterpreter for RecordingInterpreter {
    fn execute(&mut self, _scheduler: &mut Scheduler, invocation: Invocation) {
        self.invocations.push(invocation);
    }
}

/// A scheduler over a world holding a wizard (#0), a player (#1), a thing the player owns (#2),
/// a second player (#3) and a player too poor to queue anything (#4).
pub struct SchedulerFixture {
    pub scheduler: Scheduler,
    pub wizard: Obj,
    pub player: Obj,
    pub thing: Obj,
    pub stranger: Obj,
    pub pauper: Obj,
    pub now: Timestamp,
}

impl Default for SchedulerFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerFixture {
    /// Default configuration, except that queueing has no random surcharge so balances are
    /// predictable.
    pub fn new() -> Self {
        Self::with_config(Config {
            machine_cost: 0,
            ..Config::default()
        })
    }

    pub fn with_config(config: Config) -> Self {
        let mut world = MemoryWorld::new();
        let wizard = world.create_player(0);
        world.set_wizard(wizard, true);
        let player = world.create_player(1000);
        let thing = world.create_thing(player);
        let stranger = world.create_player(1000);
        let pauper = world.create_player(5);

        Self {
            scheduler: Scheduler::new(Arc::new(config), Box::new(world)),
            wizard,
            player,
            thing,
            stranger,
            pauper,
            now: Timestamp(1_700_000_000),
        }
    }

    pub fn pennies(&self, who: Obj) -> i64 {
        self.scheduler.world().pennies(who)
    }

    pub fn counter(&self, obj: Obj, attr: AttrId) -> Option<String> {
        self.scheduler.world().attribute(obj, attr)
    }

    pub fn set_counter(&mut self, obj: Obj, attr: AttrId, value: Option<&str>) {
        let owner = self.player;
        self.scheduler
            .world_mut()
            .set_attribute(obj, attr, value.map(str::to_string), owner);
    }
}

/// A world that stays reachable after it has been handed to a scheduler, so a test can destroy
/// objects out from under entries that are already queued.
#[derive(Clone, Default)]
pub struct SharedWorld(Rc<RefCell<MemoryWorld>>);

impl SharedWorld {
    pub fn new(world: MemoryWorld) -> Self {
        Self(Rc::new(RefCell::new(world)))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MemoryWorld) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

impl AttributeStore for SharedWorld {
    fn attribute(&self, obj: Obj, attr: AttrId) -> Option<String> {
        self.0.borrow().attribute(obj, attr)
    }

    fn set_attribute(&mut self, obj: Obj, attr: AttrId, value: Option<String>, owner: Obj) {
        self.0.borrow_mut().set_attribute(obj, attr, value, owner)
    }

    fn attr_named(&self, name: &str) -> Option<AttrId> {
        self.0.borrow().attr_named(name)
    }

    fn define_attr(&mut self, name: &str) -> Option<AttrId> {
        self.0.borrow_mut().define_attr(name)
    }

    fn attr_name(&self, attr: AttrId) -> Option<String> {
        self.0.borrow().attr_name(attr)
    }
}

impl WorldState for SharedWorld {
    fn valid(&self, obj: Obj) -> bool {
        self.0.borrow().valid(obj)
    }

    fn is_player(&self, obj: Obj) -> bool {
        self.0.borrow().is_player(obj)
    }

    fn is_wizard(&self, obj: Obj) -> bool {
        self.0.borrow().is_wizard(obj)
    }

    fn owner_of(&self, obj: Obj) -> Obj {
        self.0.borrow().owner_of(obj)
    }

    fn controls(&self, who: Obj, what: Obj) -> bool {
        self.0.borrow().controls(who, what)
    }

    fn is_halted(&self, obj: Obj) -> bool {
        self.0.borrow().is_halted(obj)
    }

    fn set_halted(&mut self, obj: Obj, halted: bool) {
        self.0.borrow_mut().set_halted(obj, halted)
    }

    fn pennies(&self, who: Obj) -> i64 {
        self.0.borrow().pennies(who)
    }

    fn pay(&mut self, who: Obj, amount: i64) -> bool {
        self.0.borrow_mut().pay(who, amount)
    }

    fn give(&mut self, who: Obj, amount: i64) {
        self.0.borrow_mut().give(who, amount)
    }
}
