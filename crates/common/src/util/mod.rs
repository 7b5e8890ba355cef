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

/// Split an optionally signed decimal integer into (negative, digits), after trimming leading
/// whitespace. Returns `None` if what follows the sign isn't a non-empty run of ASCII digits.
fn split_sign(s: &str) -> Option<(bool, &str)> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some((negative, digits))
}

/// Strictly parse an `i32` the way user-supplied counts, PIDs and times are parsed: optional
/// leading whitespace and sign, then digits to the end of the string. Empty strings, trailing
/// garbage and values outside the `i32` range are all rejected.
pub fn parse_int_strict(s: &str) -> Option<i32> {
    let (negative, digits) = split_sign(s)?;
    let magnitude: i64 = digits.parse().ok()?;
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).ok()
}

/// Whether `s` is a strictly-formed integer (of any magnitude).
pub fn is_integer(s: &str) -> bool {
    split_sign(s).is_some()
}

/// Read a stored counter value.
///
/// Contract: surrounding whitespace is ignored; a missing, empty or non-numeric value reads as 0;
/// a numeric value beyond the `i32` range saturates to `i32::MIN` / `i32::MAX` instead of
/// wrapping or being discarded.
pub fn saturating_parse_i32(s: &str) -> i32 {
    let Some((negative, digits)) = split_sign(s.trim_end()) else {
        return 0;
    };
    let limit = i64::from(i32::MAX) + 1;
    let mut magnitude: i64 = 0;
    for b in digits.bytes() {
        magnitude = magnitude * 10 + i64::from(b - b'0');
        if magnitude > limit {
            magnitude = limit;
            break;
        }
    }
    let value = if negative { -magnitude } else { magnitude };
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("5", Some(5); "plain")]
    #[test_case("  -12", Some(-12); "leading space and sign")]
    #[test_case("+3", Some(3); "explicit plus")]
    #[test_case("", None; "empty")]
    #[test_case("-", None; "bare sign")]
    #[test_case("12abc", None; "trailing garbage")]
    #[test_case("12 ", None; "trailing space")]
    #[test_case("2147483648", None; "just past max")]
    #[test_case("-2147483648", Some(i32::MIN); "min")]
    #[test_case("99999999999999999999999", None; "huge")]
    fn test_parse_int_strict(input: &str, expected: Option<i32>) {
        assert_eq!(parse_int_strict(input), expected);
    }

    #[test_case("", 0; "empty")]
    #[test_case("banana", 0; "non numeric")]
    #[test_case(" 7 ", 7; "padded")]
    #[test_case("-4", -4; "negative")]
    #[test_case("99999999999999999999999", i32::MAX; "saturates high")]
    #[test_case("-99999999999999999999999", i32::MIN; "saturates low")]
    fn test_saturating_parse(input: &str, expected: i32) {
        assert_eq!(saturating_parse_i32(input), expected);
    }

    #[test]
    fn test_is_integer() {
        assert!(is_integer("-400000000000"));
        assert!(!is_integer("#5"));
        assert!(!is_integer("5/gate"));
    }
}
