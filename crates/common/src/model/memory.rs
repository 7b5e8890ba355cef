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

//! A small in-memory object database. Backs the daemon's standalone mode and the scheduler tests.

use crate::model::{AttrId, AttributeStore, NOTHING, Obj, WorldState};
use ahash::AHasher;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use strum::Display;

type FastMap<K, V> = HashMap<K, V, BuildHasherDefault<AHasher>>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Display)]
pub enum ObjectKind {
    Player,
    Thing,
    Room,
    Exit,
}

#[derive(Debug, Clone)]
struct ObjectRecord {
    kind: ObjectKind,
    owner: Obj,
    wizard: bool,
    halted: bool,
    pennies: i64,
    attributes: FastMap<AttrId, (String, Obj)>,
}

#[derive(Debug)]
pub struct MemoryWorld {
    objects: Vec<Option<ObjectRecord>>,
    attr_ids: FastMap<String, AttrId>,
    attr_names: FastMap<AttrId, String>,
    next_attr: u32,
}

impl Default for MemoryWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorld {
    pub fn new() -> Self {
        let mut world = Self {
            objects: vec![],
            attr_ids: FastMap::default(),
            attr_names: FastMap::default(),
            next_attr: AttrId::FIRST_USER.0,
        };
        world.register_attr("SEMAPHORE", AttrId::SEMAPHORE);
        world
    }

    fn register_attr(&mut self, name: &str, attr: AttrId) {
        self.attr_ids.insert(name.to_uppercase(), attr);
        self.attr_names.insert(attr, name.to_uppercase());
    }

    fn record(&self, obj: Obj) -> Option<&ObjectRecord> {
        usize::try_from(obj.id())
            .ok()
            .and_then(|idx| self.objects.get(idx))
            .and_then(Option::as_ref)
    }

    fn record_mut(&mut self, obj: Obj) -> Option<&mut ObjectRecord> {
        usize::try_from(obj.id())
            .ok()
            .and_then(|idx| self.objects.get_mut(idx))
            .and_then(Option::as_mut)
    }

    /// Create a new object of the given kind. Players own themselves; anything else must be given
    /// an owner.
    pub fn create_object(&mut self, kind: ObjectKind, owner: Option<Obj>, pennies: i64) -> Obj {
        let obj = Obj::mk_id(self.objects.len() as i32);
        let owner = match kind {
            ObjectKind::Player => obj,
            _ => owner.unwrap_or(NOTHING),
        };
        self.objects.push(Some(ObjectRecord {
            kind,
            owner,
            wizard: false,
            halted: false,
            pennies,
            attributes: FastMap::default(),
        }));
        obj
    }

    pub fn create_player(&mut self, pennies: i64) -> Obj {
        self.create_object(ObjectKind::Player, None, pennies)
    }

    pub fn create_thing(&mut self, owner: Obj) -> Obj {
        self.create_object(ObjectKind::Thing, Some(owner), 0)
    }

    pub fn set_wizard(&mut self, obj: Obj, wizard: bool) {
        if let Some(record) = self.record_mut(obj) {
            record.wizard = wizard;
        }
    }

    /// Destroy an object; its number stays allocated but no longer refers to anything valid.
    pub fn recycle(&mut self, obj: Obj) {
        if let Some(slot) = usize::try_from(obj.id())
            .ok()
            .and_then(|idx| self.objects.get_mut(idx))
        {
            *slot = None;
        }
    }

    pub fn kind_of(&self, obj: Obj) -> Option<ObjectKind> {
        self.record(obj).map(|r| r.kind)
    }
}

impl AttributeStore for MemoryWorld {
    fn attribute(&self, obj: Obj, attr: AttrId) -> Option<String> {
        self.record(obj)
            .and_then(|r| r.attributes.get(&attr))
            .map(|(value, _)| value.clone())
    }

    fn set_attribute(&mut self, obj: Obj, attr: AttrId, value: Option<String>, owner: Obj) {
        let Some(record) = self.record_mut(obj) else {
            return;
        };
        match value {
            Some(value) if !value.is_empty() => {
                record.attributes.insert(attr, (value, owner));
            }
            _ => {
                record.attributes.remove(&attr);
            }
        }
    }

    fn attr_named(&self, name: &str) -> Option<AttrId> {
        self.attr_ids.get(&name.to_uppercase()).copied()
    }

    fn define_attr(&mut self, name: &str) -> Option<AttrId> {
        if let Some(attr) = self.attr_named(name) {
            return Some(attr);
        }
        let legal = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '~'));
        if !legal {
            return None;
        }
        let attr = AttrId(self.next_attr);
        self.next_attr += 1;
        self.register_attr(name, attr);
        Some(attr)
    }

    fn attr_name(&self, attr: AttrId) -> Option<String> {
        self.attr_names.get(&attr).cloned()
    }
}

impl WorldState for MemoryWorld {
    fn valid(&self, obj: Obj) -> bool {
        self.record(obj).is_some()
    }

    fn is_player(&self, obj: Obj) -> bool {
        self.kind_of(obj) == Some(ObjectKind::Player)
    }

    fn is_wizard(&self, obj: Obj) -> bool {
        let owner = self.owner_of(obj);
        self.record(owner).is_some_and(|r| r.wizard)
    }

    fn owner_of(&self, obj: Obj) -> Obj {
        self.record(obj).map(|r| r.owner).unwrap_or(NOTHING)
    }

    fn controls(&self, who: Obj, what: Obj) -> bool {
        if !self.valid(who) || !self.valid(what) {
            return false;
        }
        who == what || self.is_wizard(who) || self.owner_of(who) == self.owner_of(what)
    }

    fn is_halted(&self, obj: Obj) -> bool {
        self.record(obj).is_some_and(|r| r.halted)
    }

    fn set_halted(&mut self, obj: Obj, halted: bool) {
        if let Some(record) = self.record_mut(obj) {
            record.halted = halted;
        }
    }

    fn pennies(&self, who: Obj) -> i64 {
        let owner = self.owner_of(who);
        self.record(owner).map(|r| r.pennies).unwrap_or(0)
    }

    fn pay(&mut self, who: Obj, amount: i64) -> bool {
        let owner = self.owner_of(who);
        let wizard = self.is_wizard(owner);
        let Some(record) = self.record_mut(owner) else {
            return false;
        };
        // Wizards never run out of money.
        if wizard {
            return true;
        }
        if record.pennies < amount {
            return false;
        }
        record.pennies -= amount;
        true
    }

    fn give(&mut self, who: Obj, amount: i64) {
        let owner = self.owner_of(who);
        if let Some(record) = self.record_mut(owner) {
            record.pennies = record.pennies.saturating_add(amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purse_is_owners() {
        let mut world = MemoryWorld::new();
        let player = world.create_player(100);
        let thing = world.create_thing(player);

        assert!(world.pay(thing, 30));
        assert_eq!(world.pennies(player), 70);
        assert!(!world.pay(thing, 71));
        assert_eq!(world.pennies(player), 70);
        world.give(thing, 5);
        assert_eq!(world.pennies(player), 75);
    }

    #[test]
    fn test_attributes_clear_on_empty() {
        let mut world = MemoryWorld::new();
        let player = world.create_player(0);
        world.set_attribute(player, AttrId::SEMAPHORE, Some("3".into()), player);
        assert_eq!(world.attribute(player, AttrId::SEMAPHORE), Some("3".into()));
        world.set_attribute(player, AttrId::SEMAPHORE, Some(String::new()), player);
        assert_eq!(world.attribute(player, AttrId::SEMAPHORE), None);
    }

    #[test]
    fn test_define_attr() {
        let mut world = MemoryWorld::new();
        assert_eq!(world.attr_named("semaphore"), Some(AttrId::SEMAPHORE));
        let gate = world.define_attr("gate").unwrap();
        assert_eq!(world.define_attr("GATE"), Some(gate));
        assert_eq!(world.attr_name(gate), Some("GATE".into()));
        assert_eq!(world.define_attr("no spaces"), None);
    }

    #[test]
    fn test_control() {
        let mut world = MemoryWorld::new();
        let wizard = world.create_player(0);
        world.set_wizard(wizard, true);
        let alice = world.create_player(0);
        let bob = world.create_player(0);
        let widget = world.create_thing(alice);

        assert!(world.controls(alice, widget));
        assert!(world.controls(widget, alice));
        assert!(!world.controls(bob, widget));
        assert!(world.controls(wizard, widget));

        world.recycle(widget);
        assert!(!world.valid(widget));
        assert!(!world.controls(alice, widget));
    }
}
