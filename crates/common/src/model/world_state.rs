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

use crate::model::{AttrId, Obj};

/// Raw attribute storage on objects. Values are untyped strings; any numeric interpretation
/// (e.g. semaphore counters) is up to the caller.
pub trait AttributeStore {
    /// Read the value of `attr` on `obj`, if set.
    fn attribute(&self, obj: Obj, attr: AttrId) -> Option<String>;

    /// Set (or with `None`, clear) the value of `attr` on `obj`, recording `owner` as the owner of
    /// the attribute value.
    fn set_attribute(&mut self, obj: Obj, attr: AttrId, value: Option<String>, owner: Obj);

    /// Look up an attribute by name. Names are case-insensitive.
    fn attr_named(&self, name: &str) -> Option<AttrId>;

    /// Look up, or define if missing, an attribute by name. Returns `None` if the name is not a
    /// legal attribute name.
    fn define_attr(&mut self, name: &str) -> Option<AttrId>;

    fn attr_name(&self, attr: AttrId) -> Option<String>;
}

/// The slice of the object database that the command queue consults: object validity and type,
/// ownership and control, the halted flag, and the currency purse used for queue deposits.
pub trait WorldState: AttributeStore {
    fn valid(&self, obj: Obj) -> bool;

    fn is_player(&self, obj: Obj) -> bool;

    fn is_wizard(&self, obj: Obj) -> bool;

    /// The owner of `obj`. Players own themselves.
    fn owner_of(&self, obj: Obj) -> Obj;

    /// Whether `who` is allowed to manipulate `what`.
    fn controls(&self, who: Obj, what: Obj) -> bool;

    fn is_halted(&self, obj: Obj) -> bool;

    fn set_halted(&mut self, obj: Obj, halted: bool);

    /// Current balance of the purse `who` draws from (its owner's).
    fn pennies(&self, who: Obj) -> i64;

    /// Charge `amount` to `who`'s owner. Returns false, without charging, if they can't afford it.
    fn pay(&mut self, who: Obj, amount: i64) -> bool;

    /// Credit `amount` to `who`'s owner.
    fn give(&mut self, who: Obj, amount: i64);
}
