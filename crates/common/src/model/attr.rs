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

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Numeric identifier of an attribute slot on an object.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct AttrId(pub u32);

impl AttrId {
    /// No attribute named.
    ///
    /// When a semaphore waiter carries this, its counter lives on [`AttrId::SEMAPHORE`]. When a
    /// release carries it, it matches waiters on every attribute of the target.
    pub const UNSPECIFIED: AttrId = AttrId(0);

    /// The built-in semaphore counter attribute.
    pub const SEMAPHORE: AttrId = AttrId(47);

    /// First id handed out to attributes defined at runtime.
    pub const FIRST_USER: AttrId = AttrId(256);

    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }

    /// The attribute that actually holds a counter for this id.
    pub fn or_semaphore(self) -> AttrId {
        if self.is_unspecified() {
            Self::SEMAPHORE
        } else {
            self
        }
    }
}

impl Display for AttrId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "attr:{}", self.0)
    }
}
