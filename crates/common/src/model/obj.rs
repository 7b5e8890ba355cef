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

/// The "system" object; the first object in every database.
pub const SYSTEM_OBJECT: Obj = Obj::mk_id(0);

/// Used throughout to refer to a missing object value.
pub const NOTHING: Obj = Obj::mk_id(-1);

/// A reference to an object in the world database, by its database number.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Obj(i32);

impl Obj {
    pub const fn mk_id(id: i32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> i32 {
        self.0
    }

    pub fn is_nothing(&self) -> bool {
        self.0 == -1
    }

    #[must_use]
    pub fn to_literal(&self) -> String {
        format!("#{}", self.0)
    }

    /// Parse a `#123` style object literal. Anything else (names, `me`, etc.) is left to the
    /// caller's matcher.
    pub fn parse_literal(literal: &str) -> Option<Self> {
        let digits = literal.trim().strip_prefix('#')?;
        digits.parse::<i32>().ok().map(Self)
    }
}

impl Display for Obj {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("#{}", self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal() {
        assert_eq!(Obj::parse_literal("#7"), Some(Obj::mk_id(7)));
        assert_eq!(Obj::parse_literal(" #-1 "), Some(NOTHING));
        assert_eq!(Obj::parse_literal("7"), None);
        assert_eq!(Obj::parse_literal("#"), None);
        assert_eq!(Obj::parse_literal("#seven"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Obj::mk_id(42).to_string(), "#42");
        assert_eq!(SYSTEM_OBJECT.to_literal(), "#0");
        assert!(NOTHING.is_nothing());
    }
}
