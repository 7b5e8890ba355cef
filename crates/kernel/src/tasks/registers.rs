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

//! Local registers (`%q0`-`%qz` and named `%q<name>`) captured alongside a queued command.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Numbered registers are addressed by a single character, `0`-`9` then `a`-`z`.
pub const NUMBERED_REGISTERS: u8 = 36;

/// Longest accepted register name.
pub const MAX_REGISTER_NAME: usize = 32;

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RegisterKey {
    Numbered(u8),
    Named(String),
}

impl RegisterKey {
    /// Resolve a register name. A single `0`-`9` / `a`-`z` character is a numbered register;
    /// anything else is a named one, case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphanumeric() => {
                let slot = c.to_digit(36)? as u8;
                Some(Self::Numbered(slot))
            }
            (Some(_), _) => {
                let valid = name.len() <= MAX_REGISTER_NAME
                    && name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
                valid.then(|| Self::Named(name.to_ascii_lowercase()))
            }
            (None, _) => None,
        }
    }

    pub fn numbered(slot: u8) -> Option<Self> {
        (slot < NUMBERED_REGISTERS).then_some(Self::Numbered(slot))
    }
}

impl Display for RegisterKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterKey::Numbered(slot) => {
                let c = char::from_digit(u32::from(*slot), 36).unwrap_or('?');
                write!(f, "{c}")
            }
            RegisterKey::Named(name) => write!(f, "{name}"),
        }
    }
}

/// A register's contents. Values are arbitrary bytes and carry their own length.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct RegisterValue(Vec<u8>);

impl RegisterValue {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl From<&str> for RegisterValue {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for RegisterValue {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

/// The register environment of a running command.
///
/// Numbered and named registers share one map, so there is no way for the two halves to be
/// partially present. An empty value is the same as an unset register.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RegisterContext {
    registers: BTreeMap<RegisterKey, RegisterValue>,
}

impl RegisterContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a register. Setting it to an empty value clears it.
    pub fn set(&mut self, key: RegisterKey, value: impl Into<RegisterValue>) {
        let value = value.into();
        if value.is_empty() {
            self.registers.remove(&key);
        } else {
            self.registers.insert(key, value);
        }
    }

    pub fn get(&self, key: &RegisterKey) -> Option<&RegisterValue> {
        self.registers.get(key)
    }

    /// Look a register up by its name as written in softcode (`0`, `z`, `foo`).
    pub fn get_by_name(&self, name: &str) -> Option<&RegisterValue> {
        RegisterKey::parse(name).and_then(|key| self.registers.get(&key))
    }

    pub fn remove(&mut self, key: &RegisterKey) -> Option<RegisterValue> {
        self.registers.remove(key)
    }

    pub fn numbered_count(&self) -> usize {
        self.registers
            .keys()
            .filter(|k| matches!(k, RegisterKey::Numbered(_)))
            .count()
    }

    pub fn named_count(&self) -> usize {
        self.registers
            .keys()
            .filter(|k| matches!(k, RegisterKey::Named(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RegisterKey, &RegisterValue)> {
        self.registers.iter()
    }

    /// A deep copy to store with a continuation, or `None` if there is nothing worth keeping.
    pub fn capture(&self) -> Option<RegisterContext> {
        (!self.is_empty()).then(|| self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("0", Some(RegisterKey::Numbered(0)); "digit")]
    #[test_case("z", Some(RegisterKey::Numbered(35)); "last letter")]
    #[test_case("A", Some(RegisterKey::Numbered(10)); "upper case letter")]
    #[test_case("Foo", Some(RegisterKey::Named("foo".into())); "named lowercased")]
    #[test_case("", None; "empty")]
    #[test_case("no spaces", None; "bad character")]
    fn test_parse_register_key(name: &str, expected: Option<RegisterKey>) {
        assert_eq!(RegisterKey::parse(name), expected);
    }

    #[test]
    fn test_counts_track_contents() {
        let mut regs = RegisterContext::new();
        assert!(regs.capture().is_none());

        regs.set(RegisterKey::Numbered(0), "x");
        regs.set(RegisterKey::Named("foo".into()), "y");
        regs.set(RegisterKey::Named("bar".into()), "z");
        assert_eq!((regs.numbered_count(), regs.named_count()), (1, 2));

        // Clearing by empty value.
        regs.set(RegisterKey::Numbered(0), "");
        assert_eq!((regs.numbered_count(), regs.named_count()), (0, 2));
        assert_eq!(regs.get_by_name("FOO").map(|v| v.len()), Some(1));
    }

    #[test]
    fn test_capture_is_independent() {
        let mut live = RegisterContext::new();
        live.set(RegisterKey::Numbered(0), RegisterValue::new(vec![b'a', 0, b'b']));
        let captured = live.capture().unwrap();

        live.set(RegisterKey::Numbered(0), "changed");
        assert_eq!(
            captured.get(&RegisterKey::Numbered(0)).unwrap().as_bytes(),
            &[b'a', 0, b'b']
        );
    }
}
